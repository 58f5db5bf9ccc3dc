//! Extracts the RSS `<comments>` element as a per-item side-channel.
//!
//! `feed_rs` (like the standard parsers in the original implementation) has
//! no hook for arbitrary per-item elements, so this walks the raw XML once
//! with `quick-xml` and hands back one optional comments URL per `<item>`,
//! in document order, to be zipped onto the parsed items by index.
//!
//! Grounded on `pkg/feed/translator_test.go` (S4): an item with a
//! `<comments>` element exposes it verbatim; an item without one exposes
//! nothing.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Returns one entry per `<item>` encountered, in order. `None` where the
/// item carries no `<comments>` element.
pub fn extract_comments(xml: &[u8]) -> Vec<Option<String>> {
    let text = String::from_utf8_lossy(xml);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut results = Vec::new();
    let mut in_item = false;
    let mut in_comments = false;
    let mut current: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"item" || e.name().as_ref() == b"entry" => {
                in_item = true;
                current = None;
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"comments" && in_item => {
                in_comments = true;
            }
            Ok(Event::Text(ref t)) if in_comments => {
                if let Ok(unescaped) = t.unescape() {
                    current = Some(unescaped.trim().to_string());
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"comments" => {
                in_comments = false;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"item" || e.name().as_ref() == b"entry" => {
                results.push(current.take());
                in_item = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_WITH_COMMENTS: &str = r#"<rss version="2.0"><channel>
<item>
<guid>https://stacker.news/items/138518</guid>
<title>What is your favourite Linux distribution, and why?</title>
<link>https://stacker.news/items/138518</link>
<comments>https://stacker.news/items/138518</comments>
<description><![CDATA[ <a href="https://stacker.news/items/138518">Comments</a> ]]></description>
</item>
</channel></rss>"#;

    const FEED_WITHOUT_COMMENTS: &str = r#"<rss version="2.0"><channel>
<item>
<guid>https://stacker.news/items/138518</guid>
<title>What is your favourite Linux distribution, and why?</title>
<link>https://stacker.news/items/138518</link>
<description><![CDATA[ <a href="https://stacker.news/items/138518">Comments</a> ]]></description>
</item>
</channel></rss>"#;

    #[test]
    fn s4_item_with_comments_element() {
        let comments = extract_comments(FEED_WITH_COMMENTS.as_bytes());
        assert_eq!(comments, vec![Some("https://stacker.news/items/138518".to_string())]);
    }

    #[test]
    fn s4_item_without_comments_element() {
        let comments = extract_comments(FEED_WITHOUT_COMMENTS.as_bytes());
        assert_eq!(comments, vec![None]);
    }

    #[test]
    fn multiple_items_align_by_position() {
        let xml = format!(
            "<rss><channel>{}{}</channel></rss>",
            "<item><guid>a</guid><comments>http://x/a</comments></item>",
            "<item><guid>b</guid></item>"
        );
        let comments = extract_comments(xml.as_bytes());
        assert_eq!(comments, vec![Some("http://x/a".to_string()), None]);
    }
}
