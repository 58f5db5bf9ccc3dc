//! Step 1 of fetching: turn a site URL into a feed URL.
//!
//! Grounded on `other_examples/0b89033c_dhofheinz-skim__src-feed-discovery.rs.rs`
//! (string-scan `<link>` discovery, SSRF-validated GET) and
//! `pkg/feed/feed.go::GetFeedURL` (content-type sniff, 2-redirect client,
//! 5s timeout, `type` attribute alone selects the link — no `rel` check).

use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

const FEED_CONTENT_TYPES: &[&str] = &[
    "rss+xml",
    "atom+xml",
    "feed+json",
    "text/xml",
    "application/xml",
];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("no feed found at this address")]
    NotAFeed,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("discovery request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Rejects targets resolving to loopback, link-local, or other non-public
/// ranges — a redirect chain or HTML-discovered link must not be allowed to
/// pivot into the operator's private network.
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| DiscoveryError::InvalidUrl(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(DiscoveryError::InvalidUrl(format!("unsupported scheme {}", url.scheme())));
    }

    let host = url
        .host_str()
        .ok_or_else(|| DiscoveryError::InvalidUrl("missing host".into()))?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_disallowed_ip(ip) {
            return Err(DiscoveryError::InvalidUrl(format!("{ip} is not a public address")));
        }
    } else if host.eq_ignore_ascii_case("localhost") {
        return Err(DiscoveryError::InvalidUrl("localhost is not allowed".into()));
    }

    Ok(url)
}

fn is_disallowed_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_link_local() || v4.is_private() || v4.is_unspecified() || v4.is_broadcast()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// Resolves `addr` to a feed URL: itself if already a feed, or the first
/// `<link type="…feed-mime…" href="…">` discovered in its HTML. Keyed on the
/// `type` attribute alone — `rel` is not checked.
pub async fn resolve(client: &reqwest::Client, addr: &str) -> Result<String> {
    let url = validate_url(addr)?;
    let url_str = url.to_string();

    let response = tokio::time::timeout(DISCOVERY_TIMEOUT, client.get(&url_str).send())
        .await
        .map_err(|_| DiscoveryError::Timeout)?
        .map_err(DiscoveryError::Network)?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if FEED_CONTENT_TYPES.iter().any(|mime| content_type.contains(mime)) {
        return Ok(url_str);
    }

    if content_type.contains("text/html") || content_type.contains("application/xhtml") {
        let body = response.text().await.map_err(DiscoveryError::Network)?;
        return find_feed_link_in_html(&body, &url_str).ok_or(DiscoveryError::NotAFeed);
    }

    Err(DiscoveryError::NotAFeed)
}

fn find_feed_link_in_html(html: &str, base_url: &str) -> Option<String> {
    let html_lower = html.to_lowercase();
    let mut search_from = 0;

    while let Some(link_start) = html_lower[search_from..].find("<link") {
        let abs_start = search_from + link_start;
        let remaining = &html_lower[abs_start..];

        let tag_end = match remaining.find('>') {
            Some(pos) => pos,
            None => break,
        };

        let tag = &remaining[..=tag_end];

        if is_feed_type(tag) {
            let original_tag = &html[abs_start..abs_start + tag_end + 1];
            if let Some(href) = extract_attr_value(original_tag, "href") {
                return Some(resolve_href(href, base_url));
            }
        }

        search_from = abs_start + tag_end + 1;
    }

    None
}

fn is_feed_type(tag: &str) -> bool {
    FEED_CONTENT_TYPES.iter().any(|mime| tag.contains(mime))
}

fn extract_attr_value<'a>(tag: &'a str, attr_name: &str) -> Option<&'a str> {
    let tag_lower = tag.to_lowercase();
    let attr_prefix = format!("{attr_name}=");

    let attr_start = tag_lower.find(&attr_prefix)?;
    let value_start = attr_start + attr_prefix.len();
    if value_start >= tag.len() {
        return None;
    }

    let rest = &tag[value_start..];
    let quote = *rest.as_bytes().first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let inner = &rest[1..];
    let end = inner.find(quote as char)?;
    Some(&inner[..end])
}

fn resolve_href(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }
    if let Ok(base) = Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }
    href.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_loopback() {
        assert!(matches!(validate_url("http://127.0.0.1/feed"), Err(DiscoveryError::InvalidUrl(_))));
    }

    #[test]
    fn rejects_private_range() {
        assert!(matches!(validate_url("http://192.168.1.1/feed"), Err(DiscoveryError::InvalidUrl(_))));
    }

    #[test]
    fn rejects_localhost_hostname() {
        assert!(matches!(validate_url("http://localhost/feed"), Err(DiscoveryError::InvalidUrl(_))));
    }

    #[test]
    fn accepts_public_https() {
        assert!(validate_url("https://golangweekly.com/").is_ok());
    }

    // S3: GET of an HTML page with <link type="application/rss+xml" href="/rss">
    // at https://golangweekly.com/ discovers https://golangweekly.com/rss.
    #[test]
    fn s3_finds_rss_link_in_html() {
        let html = r#"<html><head>
            <link type="application/rss+xml" href="/rss">
        </head><body></body></html>"#;
        let found = find_feed_link_in_html(html, "https://golangweekly.com/");
        assert_eq!(found, Some("https://golangweekly.com/rss".to_string()));
    }

    #[test]
    fn no_feed_link_returns_none() {
        let html = r#"<html><head><link rel="stylesheet" href="/s.css"></head></html>"#;
        assert_eq!(find_feed_link_in_html(html, "https://example.com"), None);
    }

    #[test]
    fn absolute_href_is_preserved() {
        let html = r#"<link rel="alternate" type="application/atom+xml" href="https://feeds.example.com/atom">"#;
        assert_eq!(
            find_feed_link_in_html(html, "https://example.com"),
            Some("https://feeds.example.com/atom".to_string())
        );
    }
}
