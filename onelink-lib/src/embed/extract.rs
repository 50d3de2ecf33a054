//! Pulls the `src` of the first `<iframe>` out of pasted embed code.
//!
//! The markup is only parsed into a tree; nothing in it is executed or kept.
//! Pasted snippets are often cut short (`<iframe src="...">` with no closing
//! tag), so when the tree parse fails or has no iframe the first `<iframe`
//! start tag is scanned directly.

use std::sync::OnceLock;

use html_parser::{Dom, Element, Node};
use regex::Regex;

static IFRAME_START_TAG: OnceLock<Regex> = OnceLock::new();
static COMMENT: OnceLock<Regex> = OnceLock::new();

/// Return the trimmed, entity-decoded `src` of the first iframe in document
/// order, or `None` when there is no iframe or it has no usable `src`.
pub(crate) fn extract_iframe_src(html: &str) -> Option<String> {
    let src = match Dom::parse(html) {
        Ok(dom) => match find_iframe(&dom.children) {
            Some(iframe) => attribute(iframe, "src").map(str::to_string),
            None => scan_start_tag(html),
        },
        Err(err) => {
            tracing::debug!(error = %err, "embed code is not well-formed, scanning start tags");
            scan_start_tag(html)
        }
    }?;

    let src = html_escape::decode_html_entities(src.trim());
    let src = src.trim();
    if src.is_empty() {
        None
    } else {
        Some(src.to_string())
    }
}

/// Raw `src` of the first `<iframe ...` start tag outside comments
fn scan_start_tag(html: &str) -> Option<String> {
    let comment = COMMENT
        .get_or_init(|| Regex::new(r"(?s)<!--.*?(-->|$)").expect("comment pattern is valid"));
    let start_tag = IFRAME_START_TAG.get_or_init(|| {
        Regex::new(r#"(?is)<iframe\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("iframe pattern is valid")
    });

    let html = comment.replace_all(html, "");
    let captures = start_tag.captures(&html)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))
        .map(|value| value.as_str().to_string())
}

fn find_iframe(nodes: &[Node]) -> Option<&Element> {
    for node in nodes {
        if let Node::Element(element) = node {
            if element.name.eq_ignore_ascii_case("iframe") {
                return Some(element);
            }
            if let Some(found) = find_iframe(&element.children) {
                return Some(found);
            }
        }
    }
    None
}

fn attribute<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element
        .attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_youtube_embed_code() {
        let html = r#"<iframe width="560" height="315" src="https://www.youtube.com/embed/abc" title="YouTube video player" frameborder="0" allowfullscreen></iframe>"#;
        assert_eq!(
            extract_iframe_src(html),
            Some("https://www.youtube.com/embed/abc".to_string())
        );
    }

    #[test]
    fn test_finds_nested_iframe() {
        let html = r#"<div class="wrapper"><p>Watch:</p><div><iframe src="https://player.vimeo.com/video/42"></iframe></div></div>"#;
        assert_eq!(
            extract_iframe_src(html),
            Some("https://player.vimeo.com/video/42".to_string())
        );
    }

    #[test]
    fn test_first_iframe_wins() {
        let html = r#"<iframe src="https://codepen.io/a/embed/1"></iframe><iframe src="https://evil.example.com/"></iframe>"#;
        assert_eq!(
            extract_iframe_src(html),
            Some("https://codepen.io/a/embed/1".to_string())
        );
    }

    #[test]
    fn test_missing_iframe_or_src() {
        assert_eq!(extract_iframe_src(r#"<iframe width="560"></iframe>"#), None);
        assert_eq!(extract_iframe_src(r#"<iframe src="  "></iframe>"#), None);
        assert_eq!(extract_iframe_src(r#"<div><img src="x.png"></div>"#), None);
    }

    #[test]
    fn test_decodes_ampersands_in_src() {
        let html = r#"<iframe src="https://www.google.com/maps/embed?pb=1&amp;hl=en"></iframe>"#;
        assert_eq!(
            extract_iframe_src(html),
            Some("https://www.google.com/maps/embed?pb=1&hl=en".to_string())
        );
    }

    #[test]
    fn test_decodes_numeric_entities_in_src() {
        let decimal = r#"<iframe src="https://www.google.com/maps/embed?pb=1&#38;hl=en"></iframe>"#;
        let hex = r#"<iframe src="https://www.google.com/maps/embed?pb=1&#x26;hl=en"></iframe>"#;
        for html in [decimal, hex] {
            assert_eq!(
                extract_iframe_src(html),
                Some("https://www.google.com/maps/embed?pb=1&hl=en".to_string())
            );
        }
    }

    #[test]
    fn test_unclosed_iframe_is_scanned() {
        assert_eq!(
            extract_iframe_src(r#"<iframe src="https://www.youtube.com/embed/abc">"#),
            Some("https://www.youtube.com/embed/abc".to_string())
        );
        assert_eq!(
            extract_iframe_src(r#"<iframe width="560" src='https://player.vimeo.com/video/42'"#),
            Some("https://player.vimeo.com/video/42".to_string())
        );
        assert_eq!(
            extract_iframe_src("<IFRAME SRC=https://codepen.io/a/embed/b allowfullscreen>"),
            Some("https://codepen.io/a/embed/b".to_string())
        );
    }

    #[test]
    fn test_scan_skips_comments_and_data_attributes() {
        assert_eq!(
            extract_iframe_src(
                r#"<!-- <iframe src="https://evil.example.com/"> --><iframe src="https://www.youtube.com/embed/abc">"#
            ),
            Some("https://www.youtube.com/embed/abc".to_string())
        );
        assert_eq!(
            extract_iframe_src(r#"<iframe data-src="https://evil.example.com/">"#),
            None
        );
    }
}
