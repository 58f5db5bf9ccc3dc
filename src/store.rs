//! In-process event store: one author's full event set, replaced atomically
//! on each update pass.
//!
//! Grounded on `pkg/new/adapters/event_storage.go` (`map[string][]Event` +
//! `sync.RWMutex`, author-mismatch rejection, linear scan + filter match).

use crate::event::Filter;
use nostr::{Event, PublicKey};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("one or more events weren't created by this author")]
    AuthorMismatch,
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Default)]
pub struct EventStore {
    events: RwLock<HashMap<PublicKey, Vec<Event>>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `author`'s whole event set atomically. Rejects the batch
    /// (leaving prior state untouched) if any event was signed by someone
    /// else.
    pub async fn put_events(&self, author: PublicKey, events: Vec<Event>) -> Result<()> {
        if events.iter().any(|e| e.pubkey != author) {
            return Err(StoreError::AuthorMismatch);
        }

        info!(author = %author, count = events.len(), "saving events for feed");
        self.events.write().await.insert(author, events);
        Ok(())
    }

    /// Linear scan over every author's events. Filters with a non-empty
    /// `ids` or `tags` always yield zero matches (see [`Filter::is_unindexable`]).
    pub async fn get_events(&self, filter: &Filter) -> Vec<Event> {
        if filter.is_unindexable() {
            return Vec::new();
        }

        let events = self.events.read().await;
        events
            .values()
            .flat_map(|author_events| author_events.iter())
            .filter(|event| filter.matches(event))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn keys(address: &str) -> nostr::Keys {
        Identity::derive("secret", address).unwrap().keys().clone()
    }

    fn note(keys: &nostr::Keys, content: &str) -> Event {
        nostr::EventBuilder::new(nostr::Kind::TextNote, content)
            .sign_with_keys(keys)
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = EventStore::new();
        let k = keys("https://example.com/a");
        let event = note(&k, "hello");
        store.put_events(k.public_key(), vec![event.clone()]).await.unwrap();

        let found = store.get_events(&Filter::new()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, event.id);
    }

    #[tokio::test]
    async fn mismatched_author_is_rejected() {
        let store = EventStore::new();
        let author = keys("https://example.com/a");
        let other = keys("https://example.com/b");
        let event = note(&other, "hello");

        let result = store.put_events(author.public_key(), vec![event]).await;
        assert!(matches!(result, Err(StoreError::AuthorMismatch)));
    }

    #[tokio::test]
    async fn second_put_replaces_first() {
        let store = EventStore::new();
        let k = keys("https://example.com/a");
        store.put_events(k.public_key(), vec![note(&k, "first")]).await.unwrap();
        store.put_events(k.public_key(), vec![note(&k, "second")]).await.unwrap();

        let found = store.get_events(&Filter::new()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "second");
    }

    #[tokio::test]
    async fn filter_with_ids_yields_nothing() {
        let store = EventStore::new();
        let k = keys("https://example.com/a");
        store.put_events(k.public_key(), vec![note(&k, "hello")]).await.unwrap();

        let mut filter = Filter::new();
        filter.ids.push("deadbeef".to_string());
        assert!(store.get_events(&filter).await.is_empty());
    }

    #[tokio::test]
    async fn filter_by_author_scopes_results() {
        let store = EventStore::new();
        let a = keys("https://example.com/a");
        let b = keys("https://example.com/b");
        store.put_events(a.public_key(), vec![note(&a, "a")]).await.unwrap();
        store.put_events(b.public_key(), vec![note(&b, "b")]).await.unwrap();

        let mut filter = Filter::new();
        filter.authors.push(a.public_key());
        let found = store.get_events(&filter).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "a");
    }
}
