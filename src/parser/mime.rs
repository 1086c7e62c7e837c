//! MIME message parsing: raw bytes to a [`ParsedMessage`] part tree, and HTML-to-text conversion.

use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::model::part::{ParsedMessage, Part};
use crate::parser::header;

/// Maximum nesting depth converted from the parser's flat part list.
///
/// Deeper subtrees are cut off; their content is simply not visible to the pipeline.
pub const MAX_DEPTH: usize = 32;

/// Parse a complete raw message (headers + body) into headers and a part tree.
///
/// Never fails: input `mail-parser` cannot handle becomes a single
/// `text/plain` leaf holding everything after the header block.
pub fn parse_message(raw_message: &[u8]) -> ParsedMessage {
    let message_bytes = skip_from_line(raw_message);
    let headers = header::parse_headers(message_bytes);

    let root = match MessageParser::default().parse(message_bytes) {
        Some(msg) => convert_message(&msg, 0),
        None => {
            warn!("mail-parser rejected message, using raw body as plain text");
            Part::Leaf {
                mime_type: "text/plain".to_string(),
                filename: None,
                content: body_fallback(message_bytes).to_vec(),
            }
        }
    };

    ParsedMessage { headers, root }
}

fn convert_message(msg: &mail_parser::Message<'_>, depth: usize) -> Part {
    match msg.parts.first() {
        Some(_) => convert_part(msg, 0, depth),
        None => Part::multipart("multipart/mixed", Vec::new()),
    }
}

/// Convert `msg.parts[id]` and its descendants.
fn convert_part(msg: &mail_parser::Message<'_>, id: usize, depth: usize) -> Part {
    let Some(part) = msg.parts.get(id) else {
        return Part::multipart("multipart/mixed", Vec::new());
    };

    let filename = part.attachment_name().map(str::to_string);
    let declared = part.content_type().map(|ct| match ct.subtype() {
        Some(sub) => format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase(),
        None => ct.ctype().to_ascii_lowercase(),
    });

    match &part.body {
        PartType::Text(text) => Part::Leaf {
            mime_type: declared.unwrap_or_else(|| "text/plain".to_string()),
            filename,
            content: text.as_bytes().to_vec(),
        },
        PartType::Html(html) => Part::Leaf {
            mime_type: declared.unwrap_or_else(|| "text/html".to_string()),
            filename,
            content: html.as_bytes().to_vec(),
        },
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => Part::Leaf {
            mime_type: declared.unwrap_or_else(|| "application/octet-stream".to_string()),
            filename,
            content: bytes.to_vec(),
        },
        PartType::Message(inner) => {
            let children = if depth + 1 >= MAX_DEPTH {
                debug!(depth, "Embedded message exceeds depth bound, skipping");
                Vec::new()
            } else {
                vec![convert_message(inner, depth + 1)]
            };
            Part::Composite {
                mime_type: declared.unwrap_or_else(|| "message/rfc822".to_string()),
                filename,
                children,
            }
        }
        PartType::Multipart(ids) => {
            let children = if depth + 1 >= MAX_DEPTH {
                debug!(depth, "Multipart exceeds depth bound, skipping children");
                Vec::new()
            } else {
                ids.iter()
                    // A part never contains itself; guards against malformed id lists.
                    .filter(|&&child| child != id)
                    .map(|&child| convert_part(msg, child, depth + 1))
                    .collect()
            };
            Part::Composite {
                mime_type: declared.unwrap_or_else(|| "multipart/mixed".to_string()),
                filename,
                children,
            }
        }
    }
}

/// Skip a leading BOM and MBOX `From ` separator line.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Everything after the first blank line.
fn body_fallback(data: &[u8]) -> &[u8] {
    match header::find_header_end(data) {
        Some(end) => {
            let rest = &data[end..];
            let skip = if rest.starts_with(b"\r\n") { 2 } else { 1 };
            rest.get(skip..).unwrap_or_default()
        }
        None => &[],
    }
}

/// Tags that start a new line in the text rendering.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "tr", "table", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol",
    "pre", "hr", "section", "article", "header", "footer",
];

/// Convert HTML to linear plain text.
///
/// - Line breaks from `<br>` and block elements (`<p>`, `<div>`, `<tr>`, headings, ...)
/// - `<a href="url">text</a>` becomes `text [url]`, or just `url` when the text is the URL
/// - `<li>` becomes `- item`
/// - Lines inside `<blockquote>` get one `> ` per nesting level
/// - `<script>`, `<style>`, `<head>` and comments are removed
/// - Named and numeric entities are decoded
/// - Lines are never wrapped
pub fn html_to_text(html: &str) -> String {
    let mut cleaned = remove_comments(html);
    for tag in ["script", "style", "head"] {
        cleaned = remove_tag_block(&cleaned, tag);
    }

    let mut out = String::with_capacity(cleaned.len());
    let mut text_run = String::new();
    let mut link: Option<(String, usize)> = None;
    let mut quote_depth: usize = 0;
    let mut rest = cleaned.as_str();

    while let Some(open) = rest.find('<') {
        text_run.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            // Unterminated tag: treat the remainder as text.
            text_run.push_str(&rest[open..]);
            rest = "";
            break;
        };
        flush_text(&mut out, &mut text_run, quote_depth);

        let tag = &after[..close];
        let (closing, name) = tag_name(tag);
        match name.as_str() {
            "br" => out.push('\n'),
            "blockquote" => {
                out.push('\n');
                quote_depth = if closing {
                    quote_depth.saturating_sub(1)
                } else {
                    (quote_depth + 1).min(MAX_DEPTH)
                };
            }
            "li" if !closing => {
                out.push('\n');
                push_quote_prefix(&mut out, quote_depth);
                out.push_str("- ");
            }
            "a" if !closing => {
                link = href(tag).map(|url| {
                    // Prefix first so it never becomes part of the label.
                    if out.is_empty() || out.ends_with('\n') {
                        push_quote_prefix(&mut out, quote_depth);
                    }
                    (url, out.len())
                })
            }
            "a" => {
                if let Some((url, start)) = link.take() {
                    let label = out[start..].trim().to_string();
                    if label.is_empty() || label == url {
                        out.truncate(start);
                        if !out.ends_with([' ', '\n']) && !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(&url);
                    } else {
                        out.push_str(" [");
                        out.push_str(&url);
                        out.push(']');
                    }
                }
            }
            other if BLOCK_TAGS.contains(&other) => out.push('\n'),
            _ => {}
        }
        rest = &after[close + 1..];
    }
    text_run.push_str(rest);
    flush_text(&mut out, &mut text_run, quote_depth);

    let mut lines = Vec::new();
    let mut prev_blank = false;
    for line in out.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !prev_blank {
                lines.push(line);
            }
            prev_blank = true;
        } else {
            lines.push(line);
            prev_blank = false;
        }
    }
    lines.join("\n").trim().to_string()
}

/// Append a run of text, collapsing whitespace and decoding entities.
///
/// Text starting a fresh line inside a blockquote gets the quote prefix.
fn flush_text(out: &mut String, run: &mut String, quote_depth: usize) {
    if run.is_empty() {
        return;
    }
    let decoded = decode_entities(run);
    let mut last_space = out.ends_with([' ', '\n']) || out.is_empty();
    for ch in decoded.chars() {
        if ch.is_whitespace() && ch != '\u{a0}' {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            if out.is_empty() || out.ends_with('\n') {
                push_quote_prefix(out, quote_depth);
            }
            out.push(if ch == '\u{a0}' { ' ' } else { ch });
            last_space = false;
        }
    }
    run.clear();
}

fn push_quote_prefix(out: &mut String, quote_depth: usize) {
    for _ in 0..quote_depth {
        out.push_str("> ");
    }
}

/// Split a raw tag body (`/a`, `a href="x"`, `br/`) into (is_closing, lowercase name).
fn tag_name(tag: &str) -> (bool, String) {
    let tag = tag.trim();
    let (closing, tag) = match tag.strip_prefix('/') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, tag),
    };
    let name: String = tag
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (closing, name)
}

/// Extract the `href` attribute value from an anchor tag body.
fn href(tag: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let pos = lower.find("href")?;
    let after = tag[pos + 4..].trim_start().strip_prefix('=')?.trim_start();
    let value = match after.chars().next()? {
        q @ ('"' | '\'') => {
            let inner = &after[1..];
            &inner[..inner.find(q).unwrap_or(inner.len())]
        }
        _ => &after[..after.find(char::is_whitespace).unwrap_or(after.len())],
    };
    let value = decode_entities(value.trim());
    (!value.is_empty() && !value.starts_with('#')).then_some(value)
}

/// Decode common named entities and all numeric ones.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&after[..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "rsquo" => '’',
        "lsquo" => '‘',
        "rdquo" => '”',
        "ldquo" => '“',
        "zwnj" => '\u{200c}',
        _ => return None,
    })
}

/// Remove `<!-- ... -->` comments.
fn remove_comments(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    while let Some(start) = remaining.find("<!--") {
        result.push_str(&remaining[..start]);
        match remaining[start..].find("-->") {
            Some(end) => remaining = &remaining[start + end + 3..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let lower = html.to_ascii_lowercase();

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        // `<header>` must not match `<head`.
        let boundary = lower[start + open.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric());
        if !boundary {
            result.push_str(&html[pos..start + open.len()]);
            pos = start + open.len();
            continue;
        }
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_html_to_text_basic() {
        let text = html_to_text("<p>Hello <b>world</b></p><p>Second paragraph</p>");
        assert_eq!(text, "Hello world\n\nSecond paragraph");
    }

    #[test]
    fn test_html_to_text_keeps_links() {
        let text = html_to_text(r#"<p>Hello <a href="http://x">link</a></p>"#);
        assert_eq!(text, "Hello link [http://x]");
    }

    #[test]
    fn test_html_to_text_bare_url_link() {
        let text = html_to_text(r#"See <a href='https://example.com'>https://example.com</a>"#);
        assert_eq!(text, "See https://example.com");
    }

    #[test]
    fn test_html_to_text_does_not_wrap() {
        let long = "word ".repeat(60);
        let text = html_to_text(&format!("<div>{long}</div>"));
        assert_eq!(text.lines().count(), 1);
        assert!(text.len() > 250);
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt; &#233;&#x41;"), "Tom & Jerry <3> éA");
        assert_eq!(html_to_text("AT&T rocks"), "AT&T rocks");
    }

    #[test]
    fn test_html_to_text_removes_scripts_styles_comments() {
        let html = "<html><head><title>t</title><style>p{}</style></head><body>Before<script>alert('x')</script>After<!-- hidden --></body></html>";
        assert_eq!(html_to_text(html), "BeforeAfter");
    }

    #[test]
    fn test_html_to_text_lists() {
        let text = html_to_text("<ul><li>one</li><li>two</li></ul>");
        assert_eq!(text, "- one\n- two");
    }

    #[test]
    fn test_html_to_text_blockquote_prefixes_lines() {
        let html = "<p>Reply</p><blockquote>old<br>older<blockquote>oldest</blockquote></blockquote><p>After</p>";
        assert_eq!(
            html_to_text(html),
            "Reply\n\n> old\n> older\n> > oldest\n\nAfter"
        );
    }

    #[test]
    fn test_html_to_text_blockquote_list_and_bare_link() {
        let html = r#"<blockquote><ul><li>item</li></ul><a href="http://x">http://x</a></blockquote>"#;
        assert_eq!(html_to_text(html), "> - item\n> http://x");
    }

    #[test]
    fn test_parse_message_multipart_tree() {
        let raw = b"From: a@example.com\r\n\
Subject: Report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
See attached.\r\n\
--XX\r\n\
Content-Type: application/pdf; name=\"invoice.pdf\"\r\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--XX--\r\n";
        let parsed = parse_message(raw);
        assert_eq!(parsed.headers.get("subject"), Some("Report"));
        assert_eq!(parsed.root.mime_type(), "multipart/mixed");
        let children = parsed.root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].mime_type(), "text/plain");
        assert_eq!(children[1].mime_type(), "application/pdf");
        assert_eq!(children[1].filename(), Some("invoice.pdf"));
    }

    #[test]
    fn test_parse_message_without_content_type_is_plain() {
        let parsed = parse_message(b"Subject: Hi\n\nJust text\n");
        assert_eq!(parsed.root.mime_type(), "text/plain");
        match &parsed.root {
            Part::Leaf { content, .. } => {
                assert_eq!(String::from_utf8_lossy(content).trim(), "Just text")
            }
            Part::Composite { .. } => panic!("expected a leaf"),
        }
    }
}
