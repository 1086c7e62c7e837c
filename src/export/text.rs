//! The plain-text report format.
//!
//! One block per message, in export order:
//!
//! ```text
//! Email 1 from alice@example.com:
//! Subject: Lunch
//! Date: Mon, 1 Jan 2024 10:00:00 +0000
//! Sender: Alice <alice@example.com>
//! Recipient: me@example.com
//! Attachments: 0
//! Body:
//! See you at noon.
//! --------------------------------------------------
//! ```

use std::io::Write;
use std::path::Path;

use crate::error::{Result, ScribeError};
use crate::model::record::MessageRecord;

/// The line closing every block: 50 hyphens.
pub const SEPARATOR: &str = "--------------------------------------------------";

/// Render all records as one report string.
pub fn render_report(records: &[MessageRecord], target: &str) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        render_block(&mut out, i + 1, record, target);
    }
    out
}

fn render_block(out: &mut String, index: usize, record: &MessageRecord, target: &str) {
    out.push_str(&format!("Email {index} from {target}:\n"));
    out.push_str(&format!("Subject: {}\n", record.subject));
    out.push_str(&format!("Date: {}\n", record.date));
    out.push_str(&format!("Sender: {}\n", record.sender));
    out.push_str(&format!("Recipient: {}\n", record.recipient));
    out.push_str(&format!("Attachments: {}\n", record.attachment_count));
    out.push_str(&format!("Body:\n{}\n", record.body));
    out.push_str(SEPARATOR);
    out.push('\n');
}

/// Write the report to `path`, replacing any existing file.
///
/// Returns the number of bytes written.
pub fn write_report(records: &[MessageRecord], target: &str, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ScribeError::io(parent, e))?;
    }
    let content = render_report(records, target);
    let mut file = std::fs::File::create(path).map_err(|e| ScribeError::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| ScribeError::io(path, e))?;
    Ok(content.len() as u64)
}

/// Split a report back into records.
///
/// Bodies never contain a line starting with `--` (the noise stripper cuts
/// there), so the separator is unambiguous.
pub fn parse_report(report: &str) -> Result<Vec<MessageRecord>> {
    let mut records = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in report.lines() {
        if line == SEPARATOR {
            records.push(parse_block(&block, records.len() + 1)?);
            block.clear();
        } else {
            block.push(line);
        }
    }
    if block.iter().any(|line| !line.trim().is_empty()) {
        return Err(ScribeError::MalformedReport {
            block: records.len() + 1,
            reason: "missing closing separator".into(),
        });
    }
    Ok(records)
}

fn parse_block(lines: &[&str], index: usize) -> Result<MessageRecord> {
    let malformed = |reason: String| ScribeError::MalformedReport {
        block: index,
        reason,
    };
    let field = |pos: usize, label: &str| -> Result<String> {
        lines
            .get(pos)
            .and_then(|line| line.strip_prefix(label))
            .map(str::to_string)
            .ok_or_else(|| malformed(format!("expected '{label}' on line {}", pos + 1)))
    };

    let heading = lines.first().copied().unwrap_or_default();
    if !heading.starts_with("Email ") || !heading.ends_with(':') {
        return Err(malformed(format!("bad heading '{heading}'")));
    }

    let attachments = field(5, "Attachments: ")?;
    let attachment_count = attachments
        .trim()
        .parse()
        .map_err(|_| malformed(format!("bad attachment count '{attachments}'")))?;
    if lines.get(6).copied() != Some("Body:") {
        return Err(malformed("expected 'Body:' on line 7".into()));
    }

    Ok(MessageRecord {
        subject: field(1, "Subject: ")?,
        date: field(2, "Date: ")?,
        sender: field(3, "Sender: ")?,
        recipient: field(4, "Recipient: ")?,
        body: lines[7..].join("\n"),
        attachment_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, body: &str, attachments: usize) -> MessageRecord {
        MessageRecord {
            subject: subject.to_string(),
            date: "Mon, 1 Jan 2024 10:00:00 +0000".to_string(),
            sender: "Alice <alice@example.com>".to_string(),
            recipient: "me@example.com".to_string(),
            body: body.to_string(),
            attachment_count: attachments,
        }
    }

    #[test]
    fn test_exact_block_layout() {
        let text = render_report(&[record("Lunch", "See you\n\nat noon.", 2)], "alice@example.com");
        let expected = "Email 1 from alice@example.com:\n\
Subject: Lunch\n\
Date: Mon, 1 Jan 2024 10:00:00 +0000\n\
Sender: Alice <alice@example.com>\n\
Recipient: me@example.com\n\
Attachments: 2\n\
Body:\n\
See you\n\
\n\
at noon.\n\
--------------------------------------------------\n";
        assert_eq!(text, expected);
        assert_eq!(SEPARATOR.len(), 50);
    }

    #[test]
    fn test_report_round_trip() {
        let records = vec![
            record("One", "first body", 0),
            record("Two: with colon", "multi\nline\n\nbody", 3),
            record("", "No plaintext or HTML content found.", 1),
        ];
        let text = render_report(&records, "alice@example.com");
        assert_eq!(text.matches(SEPARATOR).count(), 3);
        assert_eq!(parse_report(&text).unwrap(), records);
    }

    #[test]
    fn test_write_report_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("emails.txt");
        let records = vec![record("Hi", "body", 0)];
        let written = write_report(&records, "bob", &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, contents.len() as u64);
        assert!(contents.starts_with("Email 1 from bob:\n"));
    }

    #[test]
    fn test_parse_rejects_truncated_report() {
        let text = render_report(&[record("Hi", "body", 0)], "x");
        let truncated = text.trim_end_matches('\n').trim_end_matches(SEPARATOR);
        assert!(matches!(
            parse_report(truncated),
            Err(ScribeError::MalformedReport { block: 1, .. })
        ));
        assert!(parse_report("").unwrap().is_empty());
    }
}
