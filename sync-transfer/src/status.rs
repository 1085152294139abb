//! Transfer status broadcasting.
//!
//! Two views of the same updates:
//! - a last-value slot (`watch`) for displays that only care about "now";
//!   slow readers may skip intermediate values
//! - an ordered event stream (`broadcast`) where every update carries its
//!   [`TransferId`], so concurrent transfers stay distinguishable

use std::sync::Arc;
use sync_types::{TransferEvent, TransferId, TransferStatus};
use tokio::sync::{broadcast, watch};

/// Default capacity of the ordered event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Publishes transfer status to any number of observers.
///
/// Cloning is cheap; all clones share the same channels.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    latest: Arc<watch::Sender<TransferStatus>>,
    events: broadcast::Sender<TransferEvent>,
}

impl StatusPublisher {
    /// Create a publisher starting at [`TransferStatus::Idle`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a publisher whose event channel buffers `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (latest, _) = watch::channel(TransferStatus::Idle);
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            latest: Arc::new(latest),
            events,
        }
    }

    /// Record a new status for transfer `id`.
    pub fn publish(&self, id: TransferId, status: TransferStatus) {
        tracing::trace!("Transfer {}: {}", id, status);
        self.latest.send_replace(status.clone());
        // No subscribers is fine
        let _ = self.events.send(TransferEvent { id, status });
    }

    /// The most recent status.
    pub fn latest(&self) -> TransferStatus {
        self.latest.borrow().clone()
    }

    /// Watch the last-value slot.
    pub fn subscribe(&self) -> watch::Receiver<TransferStatus> {
        self.latest.subscribe()
    }

    /// Receive every update from now on, in publish order.
    pub fn events(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let publisher = StatusPublisher::new();
        assert_eq!(publisher.latest(), TransferStatus::Idle);
    }

    #[test]
    fn last_value_wins() {
        let publisher = StatusPublisher::new();
        let id = TransferId::new();
        publisher.publish(
            id,
            TransferStatus::Sending {
                name: "a".into(),
                progress: 50,
            },
        );
        publisher.publish(id, TransferStatus::Success);
        assert_eq!(publisher.latest(), TransferStatus::Success);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let publisher = StatusPublisher::new();
        publisher.publish(TransferId::new(), TransferStatus::Success);
    }

    #[tokio::test]
    async fn events_keep_order_and_identity() {
        let publisher = StatusPublisher::new();
        let mut events = publisher.events();

        let a = TransferId::new();
        let b = TransferId::new();
        publisher.publish(
            a,
            TransferStatus::Receiving {
                name: "a".into(),
                progress: 10,
            },
        );
        publisher.publish(
            b,
            TransferStatus::Sending {
                name: "b".into(),
                progress: 90,
            },
        );
        publisher.publish(a, TransferStatus::Success);

        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        let third = events.recv().await.unwrap();
        assert_eq!(first.id, a);
        assert_eq!(second.id, b);
        assert_eq!(third.id, a);
        assert_eq!(third.status, TransferStatus::Success);
    }

    #[tokio::test]
    async fn clones_share_channels() {
        let publisher = StatusPublisher::new();
        let mut watcher = publisher.subscribe();
        let clone = publisher.clone();

        clone.publish(TransferId::new(), TransferStatus::Success);
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow(), TransferStatus::Success);
    }
}
