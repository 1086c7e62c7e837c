//! Message sources: where raw messages come from.
//!
//! A [`MessageSource`] lists the messages matching a set of [`Criteria`]
//! and fetches each one as raw bytes plus a header mapping. The export loop
//! only talks to this trait, so the extraction pipeline never depends on
//! where or in which order messages arrive.

pub mod auth;
pub mod eml;
pub mod gmail;
pub mod mbox;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ScribeError;
use crate::model::headers::HeaderMap;
use crate::parser::header;

/// Failure to list or fetch messages.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Missing, expired or rejected credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rate limit still in force after all retries.
    #[error("Quota exceeded, gave up after {attempts} attempt(s)")]
    Quota { attempts: u32 },

    /// Any other non-success HTTP status.
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// The response or stored data could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Unknown message reference.
    #[error("Message not found: {0}")]
    NotFound(String),

    /// Local file access failed.
    #[error(transparent)]
    Local(#[from] ScribeError),
}

/// Identifies one message within a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Conversation the message belongs to, when the source knows it.
    pub thread_id: Option<String>,
    pub message_id: String,
}

/// One fetched message, ready for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub raw: Vec<u8>,
    pub headers: HeaderMap,
}

/// A mailbox the export can pull messages from.
pub trait MessageSource {
    /// Human-readable description for logs and progress output.
    fn describe(&self) -> String;

    /// All matching messages, in export order, already paginated and capped.
    fn list(&mut self) -> Result<Vec<MessageRef>, FetchError>;

    /// Fetch one message listed earlier.
    fn fetch(&mut self, message: &MessageRef) -> Result<FetchedMessage, FetchError>;
}

/// Which side of the conversation the correspondent must be on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Messages sent by the correspondent.
    From,
    /// Messages sent to the correspondent.
    To,
    /// Both.
    #[default]
    Either,
}

/// Selection of messages to export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    /// Address or name fragment of the other party. `None` selects everything.
    pub correspondent: Option<String>,
    pub direction: Direction,
    /// Inclusive lower bound on the message date.
    pub after: Option<NaiveDate>,
    /// Exclusive upper bound on the message date.
    pub before: Option<NaiveDate>,
    /// Maximum number of messages to export.
    pub limit: Option<usize>,
}

impl Criteria {
    /// Gmail search syntax for these criteria.
    pub fn gmail_query(&self) -> String {
        let mut terms = Vec::new();
        if let Some(who) = self.correspondent.as_deref().filter(|w| !w.trim().is_empty()) {
            let who = who.trim();
            terms.push(match self.direction {
                Direction::From => format!("from:{who}"),
                Direction::To => format!("to:{who}"),
                Direction::Either => format!("(from:{who} OR to:{who})"),
            });
        }
        if let Some(after) = self.after {
            terms.push(format!("after:{}", after.format("%Y/%m/%d")));
        }
        if let Some(before) = self.before {
            terms.push(format!("before:{}", before.format("%Y/%m/%d")));
        }
        terms.join(" ")
    }

    /// Local equivalent of the Gmail query, applied to a message's own headers.
    ///
    /// The correspondent is a case-insensitive substring of `From` (and/or
    /// `To`/`Cc`). With date bounds set, messages whose date cannot be
    /// parsed are excluded.
    pub fn matches(&self, headers: &HeaderMap) -> bool {
        if let Some(who) = self.correspondent.as_deref().filter(|w| !w.trim().is_empty()) {
            let who = who.trim().to_lowercase();
            let mentions = |names: &[&str]| {
                names.iter().any(|name| {
                    headers
                        .get_all(name)
                        .any(|value| value.to_lowercase().contains(&who))
                })
            };
            let hit = match self.direction {
                Direction::From => mentions(&["From"]),
                Direction::To => mentions(&["To", "Cc"]),
                Direction::Either => mentions(&["From", "To", "Cc"]),
            };
            if !hit {
                return false;
            }
        }

        if self.after.is_none() && self.before.is_none() {
            return true;
        }
        let Some(date) = headers.get("Date").and_then(header::parse_date) else {
            return false;
        };
        let day = date.date_naive();
        self.after.is_none_or(|after| day >= after) && self.before.is_none_or(|before| day < before)
    }

    /// `true` once `count` messages reach the configured limit.
    pub fn is_full(&self, count: usize) -> bool {
        self.limit.is_some_and(|limit| count >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_gmail_query() {
        let criteria = Criteria {
            correspondent: Some("alice@example.com".into()),
            direction: Direction::From,
            after: Some(date(2024, 1, 1)),
            before: Some(date(2024, 2, 1)),
            limit: None,
        };
        assert_eq!(
            criteria.gmail_query(),
            "from:alice@example.com after:2024/01/01 before:2024/02/01"
        );

        let either = Criteria {
            correspondent: Some("bob@example.com".into()),
            ..Criteria::default()
        };
        assert_eq!(either.gmail_query(), "(from:bob@example.com OR to:bob@example.com)");
        assert_eq!(Criteria::default().gmail_query(), "");
    }

    #[test]
    fn test_matches_direction() {
        let headers: HeaderMap = [
            ("From", "Alice <ALICE@example.com>"),
            ("To", "me@example.com"),
            ("Date", "Mon, 15 Jan 2024 10:00:00 +0000"),
        ]
        .into_iter()
        .collect();

        let mut criteria = Criteria {
            correspondent: Some("alice@example.com".into()),
            direction: Direction::From,
            ..Criteria::default()
        };
        assert!(criteria.matches(&headers));
        criteria.direction = Direction::To;
        assert!(!criteria.matches(&headers));
        criteria.direction = Direction::Either;
        assert!(criteria.matches(&headers));
    }

    #[test]
    fn test_matches_date_bounds() {
        let headers: HeaderMap = [("Date", "Mon, 15 Jan 2024 10:00:00 +0000")]
            .into_iter()
            .collect();
        let mut criteria = Criteria {
            after: Some(date(2024, 1, 15)),
            before: Some(date(2024, 1, 16)),
            ..Criteria::default()
        };
        assert!(criteria.matches(&headers));
        criteria.before = Some(date(2024, 1, 15));
        assert!(!criteria.matches(&headers));

        let undated = HeaderMap::new();
        assert!(!criteria.matches(&undated));
        assert!(Criteria::default().matches(&undated));
    }

    #[test]
    fn test_is_full() {
        let capped = Criteria {
            limit: Some(2),
            ..Criteria::default()
        };
        assert!(!capped.is_full(1));
        assert!(capped.is_full(2));
        assert!(!Criteria::default().is_full(1_000_000));
    }
}
