//! Decoupled event bus for job lifecycle notifications.
//!
//! The dispatcher and reconciler emit via [`EventBus::emit`]; the console
//! and tests subscribe via [`EventBus::subscribe`]. Built on
//! [`tokio::sync::broadcast`] so multiple listeners can react independently.

use tokio::sync::broadcast;

use crate::job::Origin;

/// Events that flow through the system.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A prompt was sent to the node and the job registered.
    JobDispatched { job_id: String, origin: Origin },
    /// An answer was posted and the job evicted.
    AnswerDelivered {
        job_id: String,
        origin: Origin,
        latency_ms: i64,
    },
    /// An answer was found but posting it failed; it will be retried.
    DeliveryFailed { job_id: String, reason: String },
}

/// A broadcast channel that any component can emit to or subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events. Returns a receiver that yields all
    /// future events (does not replay past ones).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatched(job_id: &str) -> Event {
        Event::JobDispatched {
            job_id: job_id.to_string(),
            origin: Origin::new("C1", "T1"),
        }
    }

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(dispatched("J1"));

        assert_eq!(rx.recv().await.unwrap(), dispatched("J1"));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(Event::DeliveryFailed {
            job_id: "J1".to_string(),
            reason: "channel_not_found".to_string(),
        });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1, e2);
    }

    #[test]
    fn emit_without_subscribers_returns_zero() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(dispatched("J1")), 0);
    }

    #[test]
    fn emit_with_subscriber_returns_count() {
        let bus = EventBus::default();
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();

        assert_eq!(bus.emit(dispatched("J1")), 2);
    }
}
