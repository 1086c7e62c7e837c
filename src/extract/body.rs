//! Body selection: plain text first, HTML converted to text second.

use crate::model::part::{ParsedMessage, Part};
use crate::parser::mime::{html_to_text, MAX_DEPTH};

/// Body used when a message has neither a `text/plain` nor a `text/html` part.
pub const NO_TEXT_CONTENT: &str = "No plaintext or HTML content found.";

/// Pick the readable body of a message.
///
/// The first `text/plain` leaf (depth-first, document order) wins, trimmed.
/// Failing that, the first `text/html` leaf is converted to text. Failing
/// that, [`NO_TEXT_CONTENT`]. Leaves carrying a filename are skipped.
pub fn select_body(parsed: &ParsedMessage) -> String {
    if let Some(plain) = find_leaf(&parsed.root, "text/plain", 0) {
        return String::from_utf8_lossy(plain).trim().to_string();
    }
    if let Some(html) = find_leaf(&parsed.root, "text/html", 0) {
        return html_to_text(&String::from_utf8_lossy(html));
    }
    NO_TEXT_CONTENT.to_string()
}

/// First unnamed leaf of the given MIME type, in pre-order.
///
/// Leaves with a filename are attached files, not the message text.
fn find_leaf<'a>(part: &'a Part, mime_type: &str, depth: usize) -> Option<&'a [u8]> {
    match part {
        Part::Leaf {
            mime_type: found,
            content,
            ..
        } => (found == mime_type && part.filename().is_none()).then_some(content.as_slice()),
        Part::Composite { children, .. } if depth < MAX_DEPTH => children
            .iter()
            .find_map(|child| find_leaf(child, mime_type, depth + 1)),
        Part::Composite { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::headers::HeaderMap;

    fn message(root: Part) -> ParsedMessage {
        ParsedMessage {
            headers: HeaderMap::new(),
            root,
        }
    }

    #[test]
    fn test_plain_preferred_over_html() {
        let parsed = message(Part::multipart(
            "multipart/alternative",
            vec![
                Part::text("text/html", "<p>html version</p>"),
                Part::text("text/plain", "  plain version \n"),
            ],
        ));
        assert_eq!(select_body(&parsed), "plain version");
    }

    #[test]
    fn test_html_fallback_keeps_link() {
        let parsed = message(Part::text(
            "text/html",
            r#"<p>Hello <a href="http://x">link</a></p>"#,
        ));
        let body = select_body(&parsed);
        assert!(body.contains("Hello"));
        assert!(body.contains("http://x"));
        assert_eq!(body.lines().count(), 1);
    }

    #[test]
    fn test_nested_plain_found() {
        let parsed = message(Part::multipart(
            "multipart/mixed",
            vec![
                Part::multipart(
                    "multipart/alternative",
                    vec![Part::text("text/plain", "deep text")],
                ),
                Part::attachment("image/png", "photo.png", b"\x89PNG"),
            ],
        ));
        assert_eq!(select_body(&parsed), "deep text");
    }

    #[test]
    fn test_attached_text_file_is_not_the_body() {
        let parsed = message(Part::multipart(
            "multipart/mixed",
            vec![
                Part::attachment("text/plain", "notes.txt", b"attached notes"),
                Part::text("text/html", "<p>The real message</p>"),
            ],
        ));
        assert_eq!(select_body(&parsed), "The real message");

        let only_attached = message(Part::multipart(
            "multipart/mixed",
            vec![Part::attachment("text/plain", "notes.txt", b"attached notes")],
        ));
        assert_eq!(select_body(&only_attached), NO_TEXT_CONTENT);
    }

    #[test]
    fn test_sentinel_without_text_parts() {
        let parsed = message(Part::multipart(
            "multipart/mixed",
            vec![Part::attachment("application/pdf", "a.pdf", b"%PDF")],
        ));
        assert_eq!(select_body(&parsed), NO_TEXT_CONTENT);
    }
}
