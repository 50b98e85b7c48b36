//! Broadcast channel for data-change notifications.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Data sources
//! publish a [`DataChange`] whenever the records behind a publication move,
//! and the publication runner re-scans the affected subscriptions.

use tokio::sync::broadcast;

use super::DataChange;

/// Broadcast bus for [`DataChange`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest notifications
/// are dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DataChange>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a notification to all receivers.
    ///
    /// Returns the number of receivers that got it. With no active
    /// receivers the notification is silently dropped.
    pub fn publish(&self, change: DataChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }

    /// Shorthand for publishing a change of the named publication.
    pub fn notify(&self, publication: &str) -> usize {
        self.publish(DataChange::new(publication))
    }

    /// Creates a new receiver that will receive all future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DataChange> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.notify("tasks"), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_change() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.notify("tasks");

        let Ok(change) = rx.recv().await else {
            panic!("expected to receive change");
        };
        assert_eq!(change.publication, "tasks");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_change() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.notify("notes"), 2);

        let Ok(c1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(c2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(c1, c2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = EventBus::new(0);
        let _rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
    }
}
