//! Directory-of-`.eml`-files source.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{Criteria, FetchError, FetchedMessage, MessageRef, MessageSource};
use crate::error::ScribeError;
use crate::parser::header;

/// Reads bare RFC 5322 messages (`*.eml`) from a directory, in file-name order.
pub struct EmlSource {
    dir: PathBuf,
    criteria: Criteria,
}

impl EmlSource {
    pub fn open(dir: impl AsRef<Path>, criteria: Criteria) -> Result<Self, FetchError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(ScribeError::FileNotFound(dir).into());
        }
        Ok(Self { dir, criteria })
    }

    fn eml_files(&self) -> Result<Vec<PathBuf>, FetchError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| ScribeError::io(&self.dir, e))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, FetchError> {
    std::fs::read(path).map_err(|e| ScribeError::open(path, e).into())
}

impl MessageSource for EmlSource {
    fn describe(&self) -> String {
        format!("EML directory {}", self.dir.display())
    }

    fn list(&mut self) -> Result<Vec<MessageRef>, FetchError> {
        let files = self.eml_files()?;
        let total = files.len();
        let mut refs = Vec::new();

        for path in files {
            if self.criteria.is_full(refs.len()) {
                break;
            }
            let raw = match read(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            if self.criteria.matches(&header::parse_headers(&raw)) {
                refs.push(MessageRef {
                    thread_id: None,
                    message_id: path.to_string_lossy().into_owned(),
                });
            }
        }

        info!(dir = %self.dir.display(), files = total, matched = refs.len(), "Scanned EML directory");
        Ok(refs)
    }

    fn fetch(&mut self, message: &MessageRef) -> Result<FetchedMessage, FetchError> {
        let raw = read(Path::new(&message.message_id))?;
        let headers = header::parse_headers(&raw);
        Ok(FetchedMessage { raw, headers })
    }
}
