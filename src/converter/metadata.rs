//! Builds the `SetMetadata` content JSON for a feed's virtual identity.
//!
//! Grounded on `pkg/feed/feed.go::EntryFeedToSetMetadata`: Nitter http→https
//! upgrade, the reddit `/r/<sub>` override, nip05 gated on auto-registration,
//! and the `picture` fallback chain.
//!
//! One deliberate divergence from the original: the original appends the
//! reddit hashtag to `description` *before* concatenating the feed link, so
//! `about` ends with the link, not the hashtag. The distilled specification's
//! S5 scenario is explicit that the body must end with the hashtag, so this
//! implementation appends it after the link instead. See DESIGN.md.

use crate::feed::ParsedFeed;
use serde::Serialize;

#[derive(Serialize)]
pub struct Metadata {
    pub name: String,
    pub about: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
}

pub struct MetadataParams<'a> {
    pub feed: &'a ParsedFeed,
    pub original_url: &'a str,
    pub enable_auto_nip05: bool,
    pub default_profile_picture_url: Option<&'a str>,
    pub nip05_domain: &'a str,
}

/// Builds the metadata JSON object described by §4.4's `SetMetadata` tag
/// entry: `name`, `about`, optional `picture`/`nip05`.
pub fn build_metadata(params: MetadataParams<'_>) -> Metadata {
    let MetadataParams {
        feed,
        original_url,
        enable_auto_nip05,
        default_profile_picture_url,
        nip05_domain,
    } = params;

    let upgrade = super::is_twitter_feed(feed) && original_url.starts_with("https://");

    let upgrade_scheme = |s: &str| if upgrade { s.replace("http://", "https://") } else { s.to_string() };

    let description = feed.description.clone().unwrap_or_default();
    let title = feed.title.clone().unwrap_or_default();
    let link = upgrade_scheme(&feed.link);
    let description = upgrade_scheme(&description);
    let title = upgrade_scheme(&title);

    let (name, about) = match super::subreddit(&link) {
        Some(sub) => {
            let name = format!("/r/{sub}");
            let about = format!("{description}\n\n{link} #{sub}");
            (name, about)
        }
        None => (title, format!("{description}\n\n{link}")),
    };

    let nip05 = enable_auto_nip05.then(|| format!("{original_url}@{nip05_domain}"));

    let picture = feed
        .logo
        .clone()
        .or_else(|| default_profile_picture_url.map(|p| p.to_string()));

    Metadata {
        name: format!("{name} (RSS Feed)"),
        about,
        picture,
        nip05,
    }
}
