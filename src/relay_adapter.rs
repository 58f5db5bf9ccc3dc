//! The read-only surface a relay protocol layer talks to: query the store,
//! subscribe to freshly converted events, and refuse every write.
//!
//! Grounded on `pkg/new/app/handler_get_events.go` (query delegation, with its
//! commented-out `tmptoremove` block showing the superseded query-time
//! conversion path this design replaces) and `pkg/new/app/search_feeds.go`
//! for the surrounding hexagonal shape. The info document fields follow
//! SPEC_FULL §6 directly — no NIP-11 document type survived source
//! filtering, so this is a plain `serde`-derived struct rather than a ported
//! one.

use crate::bus::EventBus;
use crate::event::Filter;
use crate::push::PushSubscriber;
use crate::store::EventStore;
use nostr::{Event, EventId};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

const SUPPORTED_NIPS: &[u32] = &[5, 9, 11, 12, 15, 16, 19, 20];
const INJECT_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("this relay is read-only")]
    ReadOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoDocument {
    pub name: String,
    pub description: String,
    pub pubkey: String,
    pub contact: String,
    pub supported_nips: Vec<u32>,
    pub software: String,
    pub version: String,
}

pub struct RelayAdapterConfig {
    pub name: String,
    pub description: String,
    pub owner_public_key: Option<String>,
    pub contact: String,
    pub software_url: String,
    pub version: String,
}

pub struct RelayAdapter {
    store: Arc<EventStore>,
    bus: Arc<EventBus>,
    info: InfoDocument,
}

impl RelayAdapter {
    pub fn new(store: Arc<EventStore>, bus: Arc<EventBus>, config: RelayAdapterConfig) -> Self {
        let info = InfoDocument {
            name: config.name,
            description: config.description,
            pubkey: config.owner_public_key.unwrap_or_else(|| "~".to_string()),
            contact: config.contact,
            supported_nips: SUPPORTED_NIPS.to_vec(),
            software: config.software_url,
            version: config.version,
        };
        Self { store, bus, info }
    }

    /// Rejects (returns empty) any filter naming specific ids or tags; never
    /// touches the network.
    pub async fn query_events(&self, filter: &Filter) -> Vec<Event> {
        if filter.is_unindexable() {
            return Vec::new();
        }
        self.store.get_events(filter).await
    }

    /// The live push surface: a channel of freshly converted events, already
    /// passed through the per-author dedup policy. The returned receiver
    /// closes once its sender side is dropped.
    pub async fn inject_events(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(INJECT_BUFFER);
        let subscriber = PushSubscriber::new(Arc::clone(&self.bus));
        tokio::spawn(async move {
            subscriber.run(tx, std::future::pending::<()>()).await;
        });
        rx
    }

    pub fn accept_event(&self, _event: &Event) -> bool {
        false
    }

    pub fn save_event(&self, _event: &Event) -> Result<(), RelayError> {
        Err(RelayError::ReadOnly)
    }

    pub fn delete_event(&self, _id: &EventId) -> Result<(), RelayError> {
        Err(RelayError::ReadOnly)
    }

    pub fn info_document(&self) -> &InfoDocument {
        &self.info
    }
}
