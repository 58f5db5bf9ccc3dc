//! Push-to-client subscriber: the sole place per-author "have we already
//! emitted this or newer" bookkeeping lives.
//!
//! Grounded on `pkg/new/app/handler_on_new_event_created.go`
//! (`lastEventTime map[string]time.Time`, forward only if strictly newer
//! than the last-seen createdAt for that author) — the canonical path, not
//! the commented-out `relayInstance.lastEmitted sync.Map` duplicate (see
//! DESIGN.md Open Question resolutions).

use crate::bus::EventBus;
use nostr::{Event, PublicKey, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct PushSubscriber {
    bus: Arc<EventBus>,
}

impl PushSubscriber {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Runs until `cancelled` resolves, forwarding each bus event to `out`
    /// only when it is strictly newer than the last event forwarded for its
    /// author.
    pub async fn run(&self, out: mpsc::Sender<Event>, cancelled: impl std::future::Future<Output = ()>) {
        let mut rx = self.bus.subscribe().await;
        let mut last_emitted: HashMap<PublicKey, Timestamp> = HashMap::new();

        tokio::pin!(cancelled);
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { return };
                    if should_emit(&mut last_emitted, &event) && out.send(event).await.is_err() {
                        return;
                    }
                }
                _ = &mut cancelled => return,
            }
        }
    }
}

fn should_emit(last_emitted: &mut HashMap<PublicKey, Timestamp>, event: &Event) -> bool {
    match last_emitted.get(&event.pubkey) {
        Some(last) if *last >= event.created_at => false,
        _ => {
            last_emitted.insert(event.pubkey, event.created_at);
            true
        }
    }
}
