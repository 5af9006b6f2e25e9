use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{incident::IncidentType, item::ItemCondition};

/// Domain events published after a mutation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ItemsCreated {
        activity_id: Uuid,
        item_ids: Vec<Uuid>,
    },
    ItemUpdated(Uuid),
    ItemDeleted(Uuid),
    CustodyTransferred {
        item_id: Uuid,
        previous_holder: Option<String>,
        new_holder: String,
    },
    IncidentRecorded {
        item_id: Uuid,
        incident_id: Uuid,
        kind: IncidentType,
    },
    ItemReturned {
        item_id: Uuid,
        condition: ItemCondition,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ItemsCreated { .. } => "items_created",
            Event::ItemUpdated(_) => "item_updated",
            Event::ItemDeleted(_) => "item_deleted",
            Event::CustodyTransferred { .. } => "custody_transferred",
            Event::IncidentRecorded { .. } => "incident_recorded",
            Event::ItemReturned { .. } => "item_returned",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishes an event whose mutation has already committed; failures are logged only.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.sender.send(event).await {
            metrics::counter!("custody.events.dropped", 1);
            warn!(event = name, error = %e, "domain event dropped");
        }
    }
}

/// Drains the event channel until every sender is gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("custody.events.processed", 1, "event" => event.name());
        match &event {
            Event::ItemsCreated {
                activity_id,
                item_ids,
            } => info!(%activity_id, count = item_ids.len(), "items registered"),
            Event::ItemUpdated(id) => info!(item_id = %id, "item updated"),
            Event::ItemDeleted(id) => info!(item_id = %id, "item deleted"),
            Event::CustodyTransferred {
                item_id,
                previous_holder,
                new_holder,
            } => info!(
                %item_id,
                previous_holder = previous_holder.as_deref().unwrap_or("<organization>"),
                new_holder = %new_holder,
                "custody transferred"
            ),
            Event::IncidentRecorded {
                item_id,
                incident_id,
                kind,
            } => warn!(%item_id, %incident_id, kind = kind.as_ref(), "incident recorded"),
            Event::ItemReturned { item_id, condition } => {
                info!(%item_id, condition = condition.as_ref(), "item returned to lender")
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender.send_or_log(Event::ItemDeleted(Uuid::new_v4())).await;
        sender.send_or_log(Event::ItemUpdated(Uuid::new_v4())).await;
        assert!(sender.sender.is_closed());
    }

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();
        sender.send_or_log(Event::ItemUpdated(id)).await;
        sender.send_or_log(Event::ItemDeleted(id)).await;

        assert_eq!(rx.recv().await, Some(Event::ItemUpdated(id)));
        assert_eq!(rx.recv().await, Some(Event::ItemDeleted(id)));
    }
}
