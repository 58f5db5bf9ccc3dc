//! Single-topic "event created" pub/sub.
//!
//! Grounded on `pkg/new/adapters/pubsub/event_created_pubsub.go`
//! (`PublishNewEventCreated`/`Subscribe`); the underlying `GoChannelPubSub`
//! implementation did not survive source filtering, so the bounded,
//! drop-newest-on-overflow channel semantics come straight from SPEC_FULL
//! §4.7 rather than a ported Go type. `try_send` on a bounded
//! `tokio::sync::mpsc` channel gives exactly that: a full channel fails the
//! newest send and leaves already-queued events alone, never blocking the
//! publisher.

use nostr::Event;
use tokio::sync::mpsc;
use tracing::debug;

const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

#[derive(Default)]
pub struct EventBus {
    subscribers: tokio::sync::RwLock<Vec<mpsc::Sender<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and returns its receiving end. The
    /// subscriber is unregistered automatically once the receiver (and any
    /// clones) drop.
    pub async fn subscribe(&self) -> mpsc::Receiver<Event> {
        self.subscribe_with_buffer(DEFAULT_SUBSCRIBER_BUFFER).await
    }

    pub async fn subscribe_with_buffer(&self, buffer: usize) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(buffer);
        self.subscribers.write().await.push(tx);
        rx
    }

    /// Pushes `event` to every live subscriber. Never blocks: a subscriber
    /// whose buffer is full simply misses this event.
    pub async fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|tx| {
            match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("subscriber buffer full, dropping newest event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn sample_event() -> Event {
        let keys = Identity::derive("secret", "https://example.com").unwrap().keys().clone();
        nostr::EventBuilder::new(nostr::Kind::TextNote, "hi").sign_with_keys(&keys).unwrap()
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe().await;
        bus.publish(sample_event()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.content, "hi");
    }

    #[tokio::test]
    async fn full_buffer_drops_newest_without_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_with_buffer(1).await;
        bus.publish(sample_event()).await;
        bus.publish(sample_event()).await; // dropped, buffer full

        let first = rx.try_recv();
        assert!(first.is_ok());
        let second = rx.try_recv();
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_is_unregistered_on_next_publish() {
        let bus = EventBus::new();
        let rx = bus.subscribe().await;
        drop(rx);
        bus.publish(sample_event()).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_the_event() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe().await;
        let mut rx_b = bus.subscribe().await;
        bus.publish(sample_event()).await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }
}
