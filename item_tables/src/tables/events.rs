//! Table change notifications.
//!
//! The controller emits one [`TableEvent`] per completed operation. Subscribers
//! receive events over bounded channels; a slow subscriber drops events rather
//! than stalling the writer, and a dropped receiver is pruned on the next emit.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::models::CategoryId;

/// Notification emitted after a table operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableEvent {
    Created {
        name: String,
        items_created: usize,
        category_id: CategoryId,
    },
    Updated {
        name: String,
        category_id: Option<CategoryId>,
    },
    Deleted {
        name: String,
        category_id: Option<CategoryId>,
    },
    Renamed {
        old_name: String,
        new_name: String,
        category_id: Option<CategoryId>,
    },
    Error {
        message: String,
    },
}

impl TableEvent {
    /// Name of the table the event concerns, if any
    pub fn table_name(&self) -> Option<&str> {
        match self {
            TableEvent::Created { name, .. }
            | TableEvent::Updated { name, .. }
            | TableEvent::Deleted { name, .. } => Some(name),
            TableEvent::Renamed { new_name, .. } => Some(new_name),
            TableEvent::Error { .. } => None,
        }
    }
}

/// Fan-out of table events to any number of subscribers
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::Sender<TableEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with a channel holding up to `buffer` events
    pub fn subscribe(&self, buffer: usize) -> mpsc::Receiver<TableEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.senders().push(tx);
        rx
    }

    /// Deliver `event` to every subscriber without waiting
    pub fn emit(&self, event: TableEvent) {
        self.senders()
            .retain(|sender| match sender.try_send(event.clone()) {
                Ok(_) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!(
                        "Event subscriber channel full, dropping event for {}",
                        event.table_name().unwrap_or("<no table>")
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Event subscriber disconnected, removing");
                    false
                }
            });
    }

    fn senders(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<TableEvent>>> {
        // The list stays consistent even if a holder panicked mid-emit.
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(name: &str) -> TableEvent {
        TableEvent::Created {
            name: name.to_string(),
            items_created: 3,
            category_id: 1,
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe(4);
        let mut b = bus.subscribe(4);

        bus.emit(created("INVENTORY"));

        assert_eq!(a.recv().await, Some(created("INVENTORY")));
        assert_eq!(b.recv().await, Some(created("INVENTORY")));
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(4);
        let _kept = bus.subscribe(4);
        drop(rx);

        bus.emit(created("A"));
        assert_eq!(bus.senders().len(), 1);
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_event_but_stays() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(1);

        bus.emit(created("first"));
        bus.emit(created("second"));

        assert_eq!(bus.senders().len(), 1);
        assert_eq!(rx.recv().await, Some(created("first")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        EventBus::new().emit(TableEvent::Error {
            message: "boom".to_string(),
        });
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(created("INVENTORY")).unwrap();
        assert_eq!(json["type"], "created");
        assert_eq!(json["name"], "INVENTORY");
    }

    #[test]
    fn test_renamed_reports_new_name() {
        let event = TableEvent::Renamed {
            old_name: "A".into(),
            new_name: "B".into(),
            category_id: None,
        };
        assert_eq!(event.table_name(), Some("B"));
    }
}
