pub mod custody_transfer;
pub mod incident;
pub mod item;

pub use custody_transfer::{Entity as CustodyTransfer, Model as CustodyTransferModel};
pub use incident::{Entity as Incident, Model as IncidentModel};
pub use item::{Entity as Item, Model as ItemModel};
