use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{append_transfer, find_item, lifecycle::LifecycleEvent, non_blank, write_projection};
use crate::{
    auth::Capabilities,
    db::DatabaseAccess,
    entities::{custody_transfer, item},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Outcome of a hand-over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// `None` when the item came from the owning organization.
    pub previous_holder: Option<String>,
    pub new_holder: String,
    pub item: item::Model,
}

/// Append-only custody chain of each item.
#[derive(Clone)]
pub struct CustodyService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CustodyService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Hands an item to `new_holder`, recording who had it before.
    #[instrument(skip(self, note), fields(item_id = %item_id))]
    pub async fn transfer(
        &self,
        caps: &Capabilities,
        item_id: Uuid,
        new_holder: &str,
        note: Option<String>,
    ) -> Result<TransferOutcome, ServiceError> {
        Capabilities::require(caps.can_transfer, "transfer items")?;

        let new_holder = new_holder.trim().to_string();
        if new_holder.is_empty() {
            return Err(ServiceError::ValidationError(
                "new_holder: must not be empty".to_string(),
            ));
        }
        let note = non_blank(note);

        let outcome = DatabaseAccess::new(self.db.clone())
            .transaction(move |txn| {
                Box::pin(async move {
                    let current = find_item(txn, item_id).await?;
                    let next_state = current
                        .state
                        .apply(LifecycleEvent::Transfer, current.ownership_type)
                        .map_err(|e| {
                            warn!(item_id = %item_id, error = %e, "transfer rejected");
                            ServiceError::from(e)
                        })?;

                    let previous_holder = current.effective_holder();
                    append_transfer(
                        txn,
                        item_id,
                        previous_holder.clone(),
                        new_holder.clone(),
                        note,
                        Utc::now(),
                    )
                    .await?;

                    let item = write_projection(
                        txn,
                        &current,
                        item::ActiveModel {
                            current_holder: Set(Some(new_holder.clone())),
                            state: Set(next_state),
                            ..Default::default()
                        },
                    )
                    .await?;

                    Ok::<_, ServiceError>(TransferOutcome {
                        previous_holder,
                        new_holder,
                        item,
                    })
                })
            })
            .await?;

        counter!("custody.transfer.recorded", 1);
        info!(
            item_id = %item_id,
            new_holder = %outcome.new_holder,
            "custody transferred"
        );

        self.event_sender
            .send_or_log(Event::CustodyTransferred {
                item_id,
                previous_holder: outcome.previous_holder.clone(),
                new_holder: outcome.new_holder.clone(),
            })
            .await;

        Ok(outcome)
    }

    /// Full custody chain of an item, oldest first.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn history(
        &self,
        caps: &Capabilities,
        item_id: Uuid,
    ) -> Result<Vec<custody_transfer::Model>, ServiceError> {
        Capabilities::require(caps.can_read, "view custody history")?;

        let db = self.db.as_ref();
        find_item(db, item_id).await?;

        let entries = custody_transfer::Entity::find()
            .filter(custody_transfer::Column::ItemId.eq(item_id))
            .order_by_asc(custody_transfer::Column::Timestamp)
            .order_by_asc(custody_transfer::Column::Sequence)
            .all(db)
            .await?;

        Ok(entries)
    }
}
