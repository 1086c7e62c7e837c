//! The extraction pipeline: raw message to [`MessageRecord`].
//!
//! ```text
//! raw bytes ─▶ parse ─▶ select_body ─▶ strip_noise ─▶ normalize_whitespace ─▶ body
//!                  └──▶ count_attachments ─────────────────────────────────▶ attachment_count
//! ```
//!
//! Every function here is pure: no I/O, no shared state, no failure modes.

pub mod attachments;
pub mod body;
pub mod noise;
pub mod whitespace;

pub use attachments::count_attachments;
pub use body::{select_body, NO_TEXT_CONTENT};
pub use noise::strip_noise;
pub use whitespace::normalize_whitespace;

use crate::model::headers::HeaderMap;
use crate::model::part::ParsedMessage;
use crate::model::record::{
    MessageRecord, NO_DATE, NO_SUBJECT, UNKNOWN_RECIPIENT, UNKNOWN_SENDER,
};
use crate::parser::mime;

/// Body used when a message had text, but all of it was quotes, signature or boilerplate.
pub const NO_NEW_CONTENT: &str = "No new content (quoted text only).";

/// Assemble the record for one parsed message.
///
/// Header fields come from `headers` (first match, case-insensitive) with
/// fixed defaults for missing ones.
pub fn build_record(parsed: &ParsedMessage, headers: &HeaderMap) -> MessageRecord {
    let field = |name: &str, default: &str| single_line(headers.get_or(name, default));

    let mut body = normalize_whitespace(&strip_noise(&select_body(parsed)));
    if body.is_empty() {
        body = NO_NEW_CONTENT.to_string();
    }

    MessageRecord {
        subject: field("Subject", NO_SUBJECT),
        date: field("Date", NO_DATE),
        sender: field("From", UNKNOWN_SENDER),
        recipient: field("To", UNKNOWN_RECIPIENT),
        body,
        attachment_count: count_attachments(&parsed.root),
    }
}

/// Parse `raw` and build its record.
///
/// `headers` overrides the message's own header block when the source
/// already supplied one (e.g. the mailbox API's metadata view).
pub fn extract_record(raw: &[u8], headers: Option<&HeaderMap>) -> MessageRecord {
    let parsed = mime::parse_message(raw);
    build_record(&parsed, headers.unwrap_or(&parsed.headers))
}

/// Header values end up on one report line; fold any embedded line breaks.
fn single_line(value: &str) -> String {
    if value.contains(['\r', '\n']) {
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        value.to_string()
    }
}
