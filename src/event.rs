//! Event construction and the read-only filter used to query the store.
//!
//! Grounded on `pkg/new/domain/nostr/nostr.go` for the wrapper shape and on
//! `pkg/new/app/handler_update_feeds.go`/`events.go` for how callers build and
//! sign events. Canonical id/signature computation is delegated entirely to
//! the `nostr` crate's `EventBuilder`, not hand-rolled.

use nostr::event::builder::Error as BuilderError;
use nostr::key::Keys;
use nostr::{Event, EventBuilder, Kind, PublicKey, Tag, TagKind, Timestamp};
use thiserror::Error;

/// NIP-42 authentication. `nostr` has no named variant for it in the version
/// this crate pins, so it is addressed by its raw kind number.
pub const AUTH_KIND: Kind = Kind::Custom(22242);

#[derive(Debug, Error)]
pub enum SignError {
    #[error("failed to build or sign event: {0}")]
    Builder(#[from] BuilderError),
}

pub type Result<T> = std::result::Result<T, SignError>;

/// Builds and signs a `SetMetadata` (kind 0) event.
pub fn set_metadata(keys: &Keys, content: &str, feed_link: &str) -> Result<Event> {
    let tags = vec![proxy_tag(feed_link, "rss")];
    Ok(EventBuilder::new(Kind::Metadata, content)
        .tags(tags)
        .sign_with_keys(keys)?)
}

/// Builds and signs a `TextNote` (kind 1) event for one feed item.
pub fn text_note(keys: &Keys, content: &str, feed_link: &str, guid: &str, created_at: Timestamp) -> Result<Event> {
    let tags = vec![proxy_tag(&format!("{feed_link}#{}", escape_guid(guid)), "rss")];
    Ok(EventBuilder::new(Kind::TextNote, content)
        .tags(tags)
        .custom_created_at(created_at)
        .sign_with_keys(keys)?)
}

/// Builds and signs a `LongFormTextNote` (kind 30023) event for one feed item.
pub fn long_form(
    keys: &Keys,
    content: &str,
    feed_link: &str,
    guid: Option<&str>,
    title: Option<&str>,
    created_at: Timestamp,
) -> Result<Event> {
    let mut tags = vec![Tag::custom(
        TagKind::custom("published_at"),
        vec![created_at.as_u64().to_string()],
    )];
    if let Some(guid) = guid {
        tags.push(Tag::identifier(guid));
    }
    if let Some(title) = title {
        tags.push(Tag::custom(TagKind::custom("title"), vec![title.to_string()]));
    }
    tags.push(proxy_tag(feed_link, "rss"));

    Ok(EventBuilder::new(Kind::LongFormTextNote, content)
        .tags(tags)
        .custom_created_at(created_at)
        .sign_with_keys(keys)?)
}

/// Builds and signs a NIP-42 auth response for a single peer-relay challenge.
pub fn auth_response(keys: &Keys, relay_url: &str, challenge: &str) -> Result<Event> {
    let tags = vec![
        Tag::custom(TagKind::custom("relay"), vec![relay_url.to_string()]),
        Tag::custom(TagKind::custom("challenge"), vec![challenge.to_string()]),
    ];
    Ok(EventBuilder::new(AUTH_KIND, "").tags(tags).sign_with_keys(keys)?)
}

fn proxy_tag(value: &str, protocol: &str) -> Tag {
    Tag::custom(TagKind::custom("proxy"), vec![value.to_string(), protocol.to_string()])
}

/// `<comments>` and other tag values land verbatim in `proxy`'s guid half; this
/// only neutralizes the `#` separator itself so the fragment stays unambiguous.
fn escape_guid(guid: &str) -> String {
    guid.replace('#', "%23")
}

/// Selector over the event store: which authors/kinds/window to return.
///
/// Per §3: a non-empty `ids` or `tags` always yields zero matches — the store
/// indexes only by author and time, never by id or tag.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub ids: Vec<String>,
    pub authors: Vec<PublicKey>,
    pub kinds: Vec<Kind>,
    pub tags: Vec<(String, Vec<String>)>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unindexable(&self) -> bool {
        !self.ids.is_empty() || !self.tags.is_empty()
    }

    /// Whether `event` satisfies every predicate this filter sets, ignoring
    /// the `ids`/`tags` short-circuit (callers check [`is_unindexable`] first).
    pub fn matches(&self, event: &Event) -> bool {
        if !self.authors.is_empty() && !self.authors.contains(&event.pubkey) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at > until {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn keys() -> Keys {
        Identity::derive("secret", "https://example.com/feed").unwrap().keys().clone()
    }

    #[test]
    fn text_note_id_is_reproducible_from_its_fields() {
        let event = text_note(&keys(), "hello", "https://example.com/feed", "guid-1", Timestamp::from(1_700_000_000))
            .unwrap();
        let recomputed = EventBuilder::new(Kind::TextNote, "hello")
            .tags(event.tags.clone())
            .custom_created_at(event.created_at)
            .sign_with_keys(&keys())
            .unwrap();
        assert_eq!(event.id, recomputed.id);
    }

    #[test]
    fn filter_with_ids_is_unindexable() {
        let mut filter = Filter::new();
        filter.ids.push("deadbeef".to_string());
        assert!(filter.is_unindexable());
    }

    #[test]
    fn filter_with_tags_is_unindexable() {
        let mut filter = Filter::new();
        filter.tags.push(("e".to_string(), vec!["deadbeef".to_string()]));
        assert!(filter.is_unindexable());
    }

    #[test]
    fn empty_filter_matches_everything() {
        let event = text_note(&keys(), "hi", "https://example.com/feed", "g", Timestamp::from(1_700_000_000)).unwrap();
        assert!(Filter::new().matches(&event));
    }

    #[test]
    fn filter_excludes_other_authors() {
        let event = text_note(&keys(), "hi", "https://example.com/feed", "g", Timestamp::from(1_700_000_000)).unwrap();
        let other = Identity::derive("secret", "https://example.com/other").unwrap();
        let mut filter = Filter::new();
        filter.authors.push(other.public_key());
        assert!(!filter.matches(&event));
    }

    #[test]
    fn filter_time_window_is_inclusive() {
        let event = text_note(&keys(), "hi", "https://example.com/feed", "g", Timestamp::from(1_700_000_000)).unwrap();
        let mut filter = Filter::new();
        filter.since = Some(Timestamp::from(1_700_000_000));
        filter.until = Some(Timestamp::from(1_700_000_000));
        assert!(filter.matches(&event));

        filter.until = Some(Timestamp::from(1_699_999_999));
        assert!(!filter.matches(&event));
    }
}
