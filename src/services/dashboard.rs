use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Capabilities,
    entities::item::{self, ItemState, OwnershipType},
    errors::ServiceError,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DashboardCounts {
    /// Item records in the activity.
    pub total: u64,
    /// Borrowed equipment that still has to go back to its lender.
    pub pending_return: u64,
    /// Items currently handed out to someone.
    pub on_loan: u64,
    pub damaged: u64,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(activity_id = %activity_id))]
    pub async fn counts(
        &self,
        caps: &Capabilities,
        activity_id: Uuid,
    ) -> Result<DashboardCounts, ServiceError> {
        Capabilities::require(caps.can_read, "view the dashboard")?;

        let db = self.db.as_ref();
        let in_activity = || item::Entity::find().filter(item::Column::ActivityId.eq(activity_id));

        let total = in_activity().count(db).await?;
        let pending_return = in_activity()
            .filter(item::Column::OwnershipType.eq(OwnershipType::Borrowed))
            .filter(item::Column::Returned.eq(false))
            .filter(item::Column::State.ne(ItemState::WrittenOff))
            .count(db)
            .await?;
        let on_loan = in_activity()
            .filter(item::Column::State.eq(ItemState::InUse))
            .count(db)
            .await?;
        let damaged = in_activity()
            .filter(item::Column::State.eq(ItemState::Damaged))
            .count(db)
            .await?;

        Ok(DashboardCounts {
            total,
            pending_return,
            on_loan,
            damaged,
        })
    }
}
