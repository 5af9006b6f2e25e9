use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{find_item, lifecycle::LifecycleEvent, write_projection};
use crate::{
    auth::Capabilities,
    db::DatabaseAccess,
    entities::{
        incident::{self, IncidentType},
        item::{self, ItemCondition},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

impl IncidentType {
    pub fn lifecycle_event(self) -> LifecycleEvent {
        match self {
            IncidentType::Damage => LifecycleEvent::Damage,
            IncidentType::WriteOff => LifecycleEvent::WriteOff,
        }
    }

    /// Condition an item is left in after this incident.
    pub fn resulting_condition(self, current: ItemCondition) -> ItemCondition {
        match self {
            IncidentType::Damage if current.is_degraded() => current,
            IncidentType::Damage => ItemCondition::Poor,
            IncidentType::WriteOff => ItemCondition::WriteOff,
        }
    }
}

#[derive(Clone)]
pub struct IncidentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl IncidentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records damage or a write-off and moves the item to the matching state.
    #[instrument(skip(self, description), fields(item_id = %item_id, kind = kind.as_ref()))]
    pub async fn record(
        &self,
        caps: &Capabilities,
        item_id: Uuid,
        kind: IncidentType,
        description: &str,
    ) -> Result<incident::Model, ServiceError> {
        Capabilities::require(caps.can_record_incident, "record incidents")?;

        let description = description.trim().to_string();
        if description.is_empty() {
            return Err(ServiceError::ValidationError(
                "description: must not be empty".to_string(),
            ));
        }

        let recorded = DatabaseAccess::new(self.db.clone())
            .transaction(move |txn| {
                Box::pin(async move {
                    let current = find_item(txn, item_id).await?;
                    let next_state = current
                        .state
                        .apply(kind.lifecycle_event(), current.ownership_type)
                        .map_err(|e| {
                            warn!(item_id = %item_id, error = %e, "incident rejected");
                            ServiceError::from(e)
                        })?;

                    let incident = incident::Model {
                        id: Uuid::new_v4(),
                        item_id,
                        kind,
                        description,
                        timestamp: Utc::now(),
                    };
                    incident::Entity::insert(incident::ActiveModel::from(incident.clone()))
                        .exec(txn)
                        .await?;

                    write_projection(
                        txn,
                        &current,
                        item::ActiveModel {
                            state: Set(next_state),
                            condition: Set(kind.resulting_condition(current.condition)),
                            ..Default::default()
                        },
                    )
                    .await?;

                    Ok::<_, ServiceError>(incident)
                })
            })
            .await?;

        counter!("custody.incident.recorded", 1, "kind" => kind.as_ref().to_string());
        info!(item_id = %item_id, incident_id = %recorded.id, "incident recorded");

        self.event_sender
            .send_or_log(Event::IncidentRecorded {
                item_id,
                incident_id: recorded.id,
                kind,
            })
            .await;

        Ok(recorded)
    }

    /// Incidents of an item, oldest first.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn list(
        &self,
        caps: &Capabilities,
        item_id: Uuid,
    ) -> Result<Vec<incident::Model>, ServiceError> {
        Capabilities::require(caps.can_read, "view incidents")?;

        let db = self.db.as_ref();
        find_item(db, item_id).await?;

        let incidents = incident::Entity::find()
            .filter(incident::Column::ItemId.eq(item_id))
            .order_by_asc(incident::Column::Timestamp)
            .order_by_asc(incident::Column::Id)
            .all(db)
            .await?;

        Ok(incidents)
    }
}
