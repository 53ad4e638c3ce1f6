//! Broadcast of state-change events to observers.

use crate::metrics::DeskMetrics;
use repairdesk_core::events::RepairEvent;
use tokio::sync::broadcast;

/// Fan-out of [`RepairEvent`]s to every subscriber.
///
/// Publishing never fails: events sent while nobody listens are dropped, and a
/// subscriber that falls more than `capacity` events behind skips ahead.
#[derive(Clone, Debug)]
pub struct EventPublisher {
    sender: broadcast::Sender<RepairEvent>,
}

impl EventPublisher {
    /// Create a publisher buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RepairEvent> {
        self.sender.subscribe()
    }

    /// Publish an event and count it
    pub fn publish(&self, event: RepairEvent) {
        DeskMetrics::record_event(&event);
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(receivers, "Event broadcast");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use repairdesk_core::types::OrderId;

    fn event() -> RepairEvent {
        RepairEvent::OrderRestored {
            order_id: OrderId::new(),
            restored_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let publisher = EventPublisher::new(4);
        publisher.publish(event());
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let publisher = EventPublisher::new(4);
        let mut rx = publisher.subscribe();
        let sent = event();
        publisher.publish(sent.clone());
        assert_eq!(rx.recv().await.unwrap(), sent);
    }
}
