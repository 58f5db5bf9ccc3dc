//! Selects a converter per feed and turns one item (or a whole feed) into a
//! signed Nostr event.
//!
//! Grounded on `pkg/feed/converter.go` (`ConverterSelector`, `NoteConverter`,
//! `LongFormConverter`) and `pkg/feed/feed.go::EntryFeedToSetMetadata`.

pub mod content;
pub mod metadata;

use crate::event::{self, SignError};
use crate::feed::{ParsedFeed, ParsedItem};
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use nostr::Event;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("failed to sign event: {0}")]
    Sign(#[from] SignError),
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Which shape an item converts to. Chosen once per feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Note,
    LongForm,
}

/// Picks `LongForm` for known long-form publishers, `Note` otherwise.
/// Pluggable: swap in a different heuristic by calling `select_with`.
pub fn select(feed: &ParsedFeed) -> Variant {
    select_with(feed, |link| link.contains("substack.com"))
}

pub fn select_with(feed: &ParsedFeed, is_long_form: impl Fn(&str) -> bool) -> Variant {
    if is_long_form(&feed.link) {
        Variant::LongForm
    } else {
        Variant::Note
    }
}

/// A nitter mirror self-describes its feed description with this marker.
/// Shared by the content/metadata shaping and by the updater's one-time
/// catalog flag update.
pub fn is_twitter_feed(feed: &ParsedFeed) -> bool {
    feed.description.as_deref().unwrap_or("").contains("Twitter feed")
}

/// Extracts `<sub>` from a reddit feed link of the form `.../r/<sub>/...`.
/// Shared by the content and metadata shaping.
pub fn subreddit(link: &str) -> Option<String> {
    if !link.contains("reddit.com") {
        return None;
    }
    let after = link.split("/r/").nth(1)?;
    let sub = after.split('/').next()?;
    if sub.is_empty() {
        None
    } else {
        Some(sub.to_string())
    }
}

/// `item.updated` → `item.published` → `now` (caller must drop the item
/// when the fallback fires, per §4.4's no-floating-timestamps rule).
fn resolve_created_at(item: &ParsedItem) -> (DateTime<Utc>, bool) {
    match item.created_at() {
        Some(dt) => (dt, false),
        None => (Utc::now(), true),
    }
}

/// Converts one item into a signed event under `variant`, or `None` if no
/// real timestamp was available (the item must be skipped, not emitted with
/// a synthetic "now").
pub fn convert_item(
    identity: &Identity,
    item: &ParsedItem,
    feed: &ParsedFeed,
    original_url: &str,
    max_content_length: usize,
    variant: Variant,
) -> Result<Option<Event>> {
    let (created_at, used_fallback) = resolve_created_at(item);
    if used_fallback {
        return Ok(None);
    }
    let created_at = nostr::Timestamp::from(created_at.timestamp() as u64);

    let event = match variant {
        Variant::Note => {
            let body = content::build_content(item, feed, original_url, max_content_length, true);
            event::text_note(
                identity.keys(),
                &body,
                &feed.link,
                item.guid.as_deref().unwrap_or(&item.link),
                created_at,
            )?
        }
        Variant::LongForm => {
            let body = content::build_content(item, feed, original_url, 0, false);
            event::long_form(
                identity.keys(),
                &body,
                &feed.link,
                item.guid.as_deref(),
                (!item.title.is_empty()).then_some(item.title.as_str()),
                created_at,
            )?
        }
    };

    Ok(Some(event))
}

pub struct MetadataOptions<'a> {
    pub original_url: &'a str,
    pub enable_auto_nip05: bool,
    pub default_profile_picture_url: Option<&'a str>,
    pub nip05_domain: &'a str,
}

/// Builds and signs the feed's `SetMetadata` event.
pub fn convert_metadata(identity: &Identity, feed: &ParsedFeed, options: MetadataOptions<'_>) -> Result<Event> {
    let metadata = metadata::build_metadata(metadata::MetadataParams {
        feed,
        original_url: options.original_url,
        enable_auto_nip05: options.enable_auto_nip05,
        default_profile_picture_url: options.default_profile_picture_url,
        nip05_domain: options.nip05_domain,
    });
    let content = serde_json::to_string(&metadata).unwrap_or_default();
    Ok(event::set_metadata(identity.keys(), &content, &feed.link)?)
}
