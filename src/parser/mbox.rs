//! Streaming MBOX splitter.
//!
//! Reads the file line by line through a large buffer and hands each
//! message to a callback. The whole file is never held in memory.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, ScribeError};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Messages larger than this are truncated (64 MB).
///
/// A truncated message is always a contiguous prefix of its bytes in the file.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Streaming MBOX splitter.
///
/// Tolerates mixed `\n`/`\r\n` line endings, a UTF-8 BOM, truncated final
/// messages, and `From ` separators that are not preceded by a blank line.
pub struct MboxSplitter {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxSplitter {
    /// Open an MBOX file. Does not validate its contents.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| ScribeError::open(&path, e))?;
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    /// Override the per-message size cap.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Walk every message, calling `on_message(offset, raw_bytes)`.
    ///
    /// `raw_bytes` starts with the `From ` separator line. Returning `false`
    /// from the callback stops the walk. Returns the number of messages visited.
    pub fn for_each_message(&self, on_message: &mut dyn FnMut(u64, &[u8]) -> bool) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| ScribeError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut offset: u64 = 0;
        let mut message_start: u64 = 0;
        let mut message: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut line: Vec<u8> = Vec::with_capacity(4096);
        let mut prev_blank = true;
        let mut truncated = false;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| ScribeError::io(&self.path, e))?;
            if read == 0 {
                break;
            }

            if is_mbox_separator(&line, offset == 0) {
                if !prev_blank {
                    warn!(offset, "'From ' separator without preceding blank line");
                }
                if !message.is_empty() {
                    count += 1;
                    if !on_message(message_start, &message) {
                        return Ok(count);
                    }
                }
                message.clear();
                message_start = offset;
                truncated = false;
                message.extend_from_slice(&line);
            } else if !truncated && message.len() + line.len() <= self.max_message_size {
                message.extend_from_slice(&line);
            } else if !truncated {
                warn!(offset = message_start, "Message exceeds maximum size, truncating");
                truncated = true;
            }

            prev_blank = is_blank_line(&line);
            offset += read as u64;
        }

        if !message.is_empty() {
            count += 1;
            on_message(message_start, &message);
        }

        Ok(count)
    }

    /// Read `length` bytes at `offset` without scanning the file.
    pub fn read_at(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path).map_err(|e| ScribeError::io(&self.path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ScribeError::io(&self.path, e))?;
        let mut buffer = vec![0u8; length as usize];
        file.read_exact(&mut buffer)
            .map_err(|e| ScribeError::io(&self.path, e))?;
        Ok(buffer)
    }
}

/// `From ` at the start of a line; a BOM is allowed only at the very start of the file.
fn is_mbox_separator(line: &[u8], at_file_start: bool) -> bool {
    let line = if at_file_start {
        line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line)
    } else {
        line
    };
    line.starts_with(b"From ")
}

/// Empty or only whitespace / CR / LF.
fn is_blank_line(line: &[u8]) -> bool {
    line.iter().all(|&b| matches!(b, b'\n' | b'\r' | b' ' | b'\t'))
}
