//! Event publishing.
//!
//! The monitor reports what it did through an injected [`EventPublisher`].
//! [`BroadcastPublisher`] fans events out to any number of in-process
//! subscribers, such as a WebSocket layer.

use safe_wander_monitor_models::MonitorEvent;
use tokio::sync::broadcast;

/// Receives monitor events.
///
/// Publishing never fails from the monitor's point of view; an
/// implementation that cannot deliver an event drops it.
pub trait EventPublisher: Send + Sync {
    /// Publishes one event.
    fn publish(&self, event: MonitorEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: MonitorEvent) {}
}

/// Publishes over a [`tokio::sync::broadcast`] channel.
///
/// Subscribers that fall more than `capacity` events behind skip the
/// oldest ones.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<MonitorEvent>,
}

impl BroadcastPublisher {
    /// Creates a publisher buffering up to `capacity` events per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new subscriber. It only sees events published after
    /// this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: MonitorEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("No subscribers for monitor event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn exited() -> MonitorEvent {
        MonitorEvent::SafeZoneExited {
            subject_id: "p1".to_string(),
            timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let publisher = BroadcastPublisher::new(8);
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();
        assert_eq!(publisher.sender.receiver_count(), 2);

        publisher.publish(exited());

        assert_eq!(first.recv().await.unwrap(), exited());
        assert_eq!(second.recv().await.unwrap(), exited());
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let publisher = BroadcastPublisher::default();
        publisher.publish(exited());
        NullPublisher.publish(exited());
    }
}
