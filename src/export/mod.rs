//! The export run: pull messages from a source, extract records, count outcomes.

pub mod text;

use tracing::{debug, info, warn};

use crate::extract;
use crate::model::record::MessageRecord;
use crate::source::{FetchError, MessageSource};

/// What an export run produced.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    /// Extracted records, in source order.
    pub records: Vec<MessageRecord>,
    pub summary: ExportSummary,
}

/// Running totals of an export, returned instead of kept in global state.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExportSummary {
    /// Messages the source listed.
    pub listed: usize,
    /// Messages fetched and extracted.
    pub exported: usize,
    /// Messages whose fetch failed and were skipped.
    pub failed: usize,
    /// Distinct threads among the exported messages (when the source knows threads).
    pub threads: usize,
    /// Sum of attachment counts over exported messages.
    pub attachments: usize,
}

/// Run the export against `source`.
///
/// Listing errors abort the run. A message whose fetch fails is logged,
/// counted in [`ExportSummary::failed`], and skipped. The progress callback
/// receives `(done, total)` after every message.
pub fn run_export(
    source: &mut dyn MessageSource,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Result<ExportOutcome, FetchError> {
    let refs = source.list()?;
    let total = refs.len();
    info!(source = %source.describe(), messages = total, "Listed messages");

    let mut outcome = ExportOutcome {
        records: Vec::with_capacity(total),
        summary: ExportSummary {
            listed: total,
            ..ExportSummary::default()
        },
    };
    let mut seen_threads = std::collections::HashSet::new();

    for (i, message) in refs.iter().enumerate() {
        match source.fetch(message) {
            Ok(fetched) => {
                let record = extract::extract_record(&fetched.raw, Some(&fetched.headers));
                debug!(
                    message_id = %message.message_id,
                    attachments = record.attachment_count,
                    body_len = record.body.len(),
                    "Extracted message"
                );
                if let Some(thread) = &message.thread_id {
                    seen_threads.insert(thread.clone());
                }
                outcome.summary.exported += 1;
                outcome.summary.attachments += record.attachment_count;
                outcome.records.push(record);
            }
            Err(e) => {
                warn!(message_id = %message.message_id, error = %e, "Fetch failed, skipping message");
                outcome.summary.failed += 1;
            }
        }
        if let Some(cb) = progress {
            cb(i + 1, total);
        }
    }

    outcome.summary.threads = seen_threads.len();
    info!(
        exported = outcome.summary.exported,
        failed = outcome.summary.failed,
        "Export finished"
    );
    Ok(outcome)
}
