use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{ActiveValue::Set, DatabaseConnection};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{append_transfer, find_item, lifecycle::LifecycleEvent, non_blank, write_projection};
use crate::{
    auth::Capabilities,
    db::DatabaseAccess,
    entities::item::{self, ItemCondition},
    errors::ServiceError,
    events::{Event, EventSender},
};

const RETURN_NOTE: &str = "returned to lender";

/// Adds a dated return line to existing observations.
pub fn append_return_note(
    observations: Option<&str>,
    returned_at: DateTime<Utc>,
    notes: &str,
) -> String {
    let line = format!("Returned {}: {}", returned_at.format("%Y-%m-%d"), notes);
    match observations.map(str::trim_end).filter(|o| !o.is_empty()) {
        Some(existing) => format!("{}\n{}", existing, line),
        None => line,
    }
}

/// Closes the loan of borrowed equipment.
#[derive(Clone)]
pub struct ReturnService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ReturnService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Gives a borrowed item back to its lender in `condition`.
    ///
    /// The current holder of a returned item is always the lender. If someone
    /// else still has it, the custody chain is closed with a final entry to the
    /// lender dated `returned_at`.
    #[instrument(skip(self, notes), fields(item_id = %item_id, condition = condition.as_ref()))]
    pub async fn return_item(
        &self,
        caps: &Capabilities,
        item_id: Uuid,
        condition: ItemCondition,
        notes: Option<String>,
        returned_at: Option<DateTime<Utc>>,
    ) -> Result<item::Model, ServiceError> {
        Capabilities::require(caps.can_return, "return items")?;

        let notes = non_blank(notes);
        let returned_at = returned_at.unwrap_or_else(Utc::now);

        let returned = DatabaseAccess::new(self.db.clone())
            .transaction(move |txn| {
                Box::pin(async move {
                    let current = find_item(txn, item_id).await?;
                    let next_state = current
                        .state
                        .apply(LifecycleEvent::Return, current.ownership_type)
                        .map_err(|e| {
                            warn!(item_id = %item_id, error = %e, "return rejected");
                            ServiceError::from(e)
                        })?;

                    let lender = current.lender_name.clone().ok_or_else(|| {
                        ServiceError::ValidationError(
                            "lender_name: borrowed item has no lender to return to".to_string(),
                        )
                    })?;

                    let holder = current.effective_holder();
                    if holder.as_deref() != Some(lender.as_str()) {
                        append_transfer(
                            txn,
                            item_id,
                            holder,
                            lender.clone(),
                            Some(RETURN_NOTE.to_string()),
                            returned_at,
                        )
                        .await?;
                    }

                    let mut changes = item::ActiveModel {
                        state: Set(next_state),
                        condition: Set(condition),
                        returned: Set(true),
                        returned_at: Set(Some(returned_at)),
                        current_holder: Set(Some(lender)),
                        ..Default::default()
                    };
                    if let Some(notes) = notes {
                        changes.observations = Set(Some(append_return_note(
                            current.observations.as_deref(),
                            returned_at,
                            &notes,
                        )));
                    }

                    write_projection(txn, &current, changes).await
                })
            })
            .await?;

        counter!("custody.item.returned", 1);
        info!(item_id = %item_id, "item returned to lender");

        self.event_sender
            .send_or_log(Event::ItemReturned { item_id, condition })
            .await;

        Ok(returned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn return_note_is_appended_on_its_own_line() {
        let at = Utc.with_ymd_and_hms(2026, 7, 28, 17, 0, 0).unwrap();
        assert_eq!(
            append_return_note(None, at, "one peg missing"),
            "Returned 2026-07-28: one peg missing"
        );
        assert_eq!(
            append_return_note(Some("Green flysheet\n"), at, "dry"),
            "Green flysheet\nReturned 2026-07-28: dry"
        );
    }
}
