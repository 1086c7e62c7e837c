//! Local MBOX file source.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use super::{Criteria, FetchError, FetchedMessage, MessageRef, MessageSource};
use crate::parser::header;
use crate::parser::mbox::MboxSplitter;

/// Reads messages from an MBOX file, filtered by [`Criteria`] on their own headers.
pub struct MboxSource {
    splitter: MboxSplitter,
    criteria: Criteria,
    /// `message_id` → (offset, length) of every listed message.
    positions: HashMap<String, (u64, u64)>,
}

impl MboxSource {
    pub fn open(path: impl AsRef<Path>, criteria: Criteria) -> Result<Self, FetchError> {
        Ok(Self {
            splitter: MboxSplitter::new(path)?,
            criteria,
            positions: HashMap::new(),
        })
    }
}

impl MessageSource for MboxSource {
    fn describe(&self) -> String {
        format!("MBOX {}", self.splitter.path().display())
    }

    fn list(&mut self) -> Result<Vec<MessageRef>, FetchError> {
        let criteria = &self.criteria;
        let mut refs = Vec::new();
        let mut positions = HashMap::new();
        let mut scanned: u64 = 0;

        self.splitter.for_each_message(&mut |offset, raw| {
            scanned += 1;
            let headers = header::parse_headers(raw);
            if criteria.matches(&headers) {
                let message_id = offset.to_string();
                positions.insert(message_id.clone(), (offset, raw.len() as u64));
                refs.push(MessageRef {
                    thread_id: None,
                    message_id,
                });
            }
            !criteria.is_full(refs.len())
        })?;

        info!(
            path = %self.splitter.path().display(),
            scanned,
            matched = refs.len(),
            "Scanned MBOX"
        );
        self.positions = positions;
        Ok(refs)
    }

    fn fetch(&mut self, message: &MessageRef) -> Result<FetchedMessage, FetchError> {
        let &(offset, length) = self
            .positions
            .get(&message.message_id)
            .ok_or_else(|| FetchError::NotFound(message.message_id.clone()))?;
        debug!(offset, length, "Reading MBOX message");
        let raw = self.splitter.read_at(offset, length)?;
        let headers = header::parse_headers(&raw);
        Ok(FetchedMessage { raw, headers })
    }
}
