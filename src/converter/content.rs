//! HTML-to-Markdown rule engine and the item content-building pipeline.
//!
//! Grounded on `pkg/converter/rules.go` (heading/img/a rule shapes) and
//! `pkg/feed/converter.go::buildContent` (the full per-item pipeline: title
//! bolding, Nitter/stacker.news shaping, truncation, comments sidecar,
//! trailing link). The reddit `#<subreddit>` hashtag append is grounded on
//! `pkg/feed/feed.go::ItemToTextNote` instead (`buildContent` has no reddit
//! branch at all). The rule engine itself walks a `scraper` document tree
//! directly rather than wrapping a vendored Markdown-conversion crate (out of
//! scope per SPEC_FULL §1); tag-stripping fallback uses `ammonia`.

use crate::feed::{ParsedFeed, ParsedItem};
use scraper::{Html, Node};

/// Converts one fragment of item/description HTML to Markdown. `keep_images`
/// mirrors the Go rule set difference between notes (bare image URL line)
/// and long-form (image rule left unregistered, so images vanish).
pub fn convert(html: &str, keep_images: bool) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let rendered = render(html, keep_images);
    if !rendered.trim().is_empty() {
        return rendered;
    }

    sanitize(html)
}

fn render(html: &str, keep_images: bool) -> String {
    let fragment = Html::parse_fragment(html);
    let mut buf = String::new();
    for child in fragment.tree.root().children() {
        render_node(child, keep_images, &mut buf);
    }
    buf.trim().to_string()
}

fn render_node(node: ego_tree::NodeRef<'_, Node>, keep_images: bool, buf: &mut String) {
    match node.value() {
        Node::Text(text) => buf.push_str(text),
        Node::Element(element) => match element.name() {
            "script" | "style" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let mut inner = String::new();
                for child in node.children() {
                    render_node(child, keep_images, &mut inner);
                }
                buf.push_str(inner.trim());
            }
            "img" => {
                if keep_images {
                    let src = element.attr("src").unwrap_or("").trim();
                    if !src.is_empty() {
                        buf.push('\n');
                        buf.push_str(src);
                        buf.push('\n');
                    }
                }
            }
            "a" => render_anchor(node, element, keep_images, buf),
            "br" => buf.push('\n'),
            _ => {
                for child in node.children() {
                    render_node(child, keep_images, buf);
                }
            }
        },
        _ => {}
    }
}

fn render_anchor(
    node: ego_tree::NodeRef<'_, Node>,
    element: &scraper::node::Element,
    keep_images: bool,
    buf: &mut String,
) {
    let mut inner = String::new();
    for child in node.children() {
        render_node(child, keep_images, &mut inner);
    }
    let inner = inner.replace(['\n', '\r'], " ");

    let href = element.attr("href").unwrap_or("").trim();
    if href.is_empty() || href == "#" {
        buf.push_str(inner.trim());
        return;
    }

    let mut content = inner.trim().to_string();
    if content.is_empty() {
        content = element
            .attr("title")
            .or_else(|| element.attr("aria-label"))
            .unwrap_or("")
            .to_string();
    }
    if content.is_empty() {
        return;
    }

    buf.push_str(&format!("{content} ({href})"));
}

/// Fallback when the DOM walk yields nothing usable: strip every tag,
/// neutralizing script/style content rather than passing raw markup through.
fn sanitize(html: &str) -> String {
    ammonia::Builder::new()
        .tags(std::collections::HashSet::new())
        .clean(html)
        .to_string()
}

fn unescape_entities(s: &str) -> String {
    quick_xml::escape::unescape(s)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Builds the full item content per §4.4's common pipeline plus
/// source-specific shaping. `max_content_length == 0` means long-form (no
/// truncation, content branch always wins when non-empty); any positive
/// value selects note-kind truncation.
pub fn build_content(item: &ParsedItem, feed: &ParsedFeed, original_url: &str, max_content_length: usize, keep_images: bool) -> String {
    let mut content = if item.title.is_empty() {
        String::new()
    } else {
        format!("**{}**", item.title)
    };

    let item_description = item.description.as_deref().map(|d| convert(d, keep_images)).unwrap_or_default();
    let item_content = item.content.as_deref().map(|c| convert(c, keep_images)).unwrap_or_default();

    if max_content_length == 0 && !item_content.is_empty() {
        content.push_str("\n\n");
        content.push_str(&item_content);
    } else if !item.title.eq_ignore_ascii_case(&item_description) && !feed.link.contains("stacker.news") {
        content.push_str("\n\n");
        content.push_str(&item_description);
    }

    let mut should_upgrade_schema = false;

    if super::is_twitter_feed(feed) {
        content.clear();
        should_upgrade_schema = true;

        let mut description = item_description;
        if original_url.starts_with("https://") {
            description = description.replace("http://", "https://");
        }

        if item.title.contains("RT by @") {
            if let Some(creator) = item.creator.as_deref().filter(|c| !c.is_empty()) {
                content = format!("**RT {creator}:**\n\n");
            }
        } else if item.title.contains("R to @") {
            if let Some(handle) = item.title.split_whitespace().nth(2) {
                content = format!("**Response to {handle}**\n\n");
            }
        }
        content.push_str(&description);
    }

    if let Some(sub) = super::subreddit(&feed.link) {
        content.push_str(&format!("\n\n #{sub}"));
    }

    content = unescape_entities(&content);

    if max_content_length > 0 && content.chars().count() > max_content_length {
        let truncated: String = content.chars().take(max_content_length.saturating_sub(1)).collect();
        content = format!("{truncated}…");
    }

    let item_link = if should_upgrade_schema {
        item.link.replace("http://", "https://")
    } else {
        item.link.clone()
    };

    if let Some(comments) = &item.comments {
        content.push_str(&format!("\n\nComments: {comments}"));
    }

    content.push_str("\n\n");
    content.push_str(&item_link);

    content.chars().filter(|c| *c != '\u{0}').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ParsedFeed;

    fn feed(link: &str, description: &str) -> ParsedFeed {
        ParsedFeed {
            title: Some("Example".into()),
            link: link.to_string(),
            description: Some(description.to_string()),
            items: Vec::new(),
            logo: None,
        }
    }

    fn item(title: &str, description: Option<&str>) -> ParsedItem {
        ParsedItem {
            guid: Some("g1".into()),
            link: "https://example.com/1".into(),
            title: title.to_string(),
            description: description.map(|d| d.to_string()),
            content: None,
            published: None,
            updated: None,
            comments: None,
            creator: None,
        }
    }

    #[test]
    fn heading_whitespace_is_trimmed() {
        assert_eq!(render("<h1>  Hello  </h1>", true), "Hello");
    }

    #[test]
    fn image_becomes_bare_url_line_when_kept() {
        let out = render(r#"<img src="https://x.test/a.png">"#, true);
        assert_eq!(out, "https://x.test/a.png");
    }

    #[test]
    fn image_is_dropped_when_not_kept() {
        let out = render(r#"<p><img src="https://x.test/a.png">word</p>"#, false);
        assert_eq!(out, "word");
    }

    #[test]
    fn anchor_renders_text_and_absolute_url() {
        let out = render(r#"<a href="https://x.test/">click here</a>"#, true);
        assert_eq!(out, "click here (https://x.test/)");
    }

    #[test]
    fn anchor_falls_back_to_title_when_empty() {
        let out = render(r#"<a href="https://x.test/" title="Link title"></a>"#, true);
        assert_eq!(out, "Link title (https://x.test/)");
    }

    #[test]
    fn empty_anchor_without_href_is_dropped() {
        let out = render(r#"<a>no link</a>"#, true);
        assert_eq!(out, "no link");
    }

    #[test]
    fn stacker_news_skips_description_body() {
        let f = feed("https://stacker.news/items/1", "irrelevant");
        let i = item("Some title", Some("<p>body</p>"));
        let content = build_content(&i, &f, "https://stacker.news/items/1", 500, true);
        assert!(!content.contains("body"));
    }

    #[test]
    fn reddit_feed_appends_subreddit_hashtag() {
        let f = feed("https://www.reddit.com/r/golang/.rss", "Go news");
        let i = item("Hello", Some("<p>body</p>"));
        let content = build_content(&i, &f, "https://www.reddit.com/r/golang/.rss", 500, true);
        assert!(content.contains(" #golang"));
    }

    #[test]
    fn note_truncates_with_ellipsis() {
        let f = feed("https://example.com", "");
        let i = item(&"x".repeat(600), None);
        let content = build_content(&i, &f, "https://example.com", 500, true);
        assert!(content.chars().count() <= 500);
        assert!(content.ends_with('…'));
    }

    #[test]
    fn comments_sidecar_is_appended() {
        let f = feed("https://example.com", "");
        let mut i = item("Title", None);
        i.comments = Some("https://example.com/comments/1".into());
        let content = build_content(&i, &f, "https://example.com", 500, true);
        assert!(content.contains("Comments: https://example.com/comments/1"));
    }

    #[test]
    fn item_link_is_always_appended() {
        let f = feed("https://example.com", "");
        let i = item("Title", None);
        let content = build_content(&i, &f, "https://example.com", 500, true);
        assert!(content.ends_with("https://example.com/1"));
    }
}
