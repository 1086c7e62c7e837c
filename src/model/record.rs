//! The per-message output unit.

use serde::{Deserialize, Serialize};

/// Default subject when the header is missing.
pub const NO_SUBJECT: &str = "No Subject";
/// Default date when the header is missing.
pub const NO_DATE: &str = "No Date";
/// Default sender when the `From` header is missing.
pub const UNKNOWN_SENDER: &str = "Unknown Sender";
/// Default recipient when the `To` header is missing.
pub const UNKNOWN_RECIPIENT: &str = "Unknown Recipient";

/// Extracted, normalized view of one message.
///
/// Built once by [`crate::extract::build_record`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub subject: String,
    pub date: String,
    pub sender: String,
    pub recipient: String,
    /// Never empty: falls back to a sentinel when there is nothing to show.
    pub body: String,
    pub attachment_count: usize,
}
