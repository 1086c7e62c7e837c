//! Centralized error types for threadscribe.
//!
//! Mailbox access failures have their own type,
//! [`FetchError`](crate::source::FetchError), since they originate outside
//! the crate and are handled per message by the export loop.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by local file handling, configuration and reporting.
#[derive(Error, Debug)]
pub enum ScribeError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file or directory does not exist.
    #[error("Not found: {0}")]
    FileNotFound(PathBuf),

    /// A report file could not be read back.
    #[error("Malformed report block {block}: {reason}")]
    MalformedReport { block: usize, reason: String },

    /// A configuration value is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, ScribeError>`.
pub type Result<T> = std::result::Result<T, ScribeError>;

impl ScribeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Like [`ScribeError::io`], but maps `NotFound` to [`ScribeError::FileNotFound`].
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_maps_not_found() {
        let err = ScribeError::open(
            "missing.mbox",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ScribeError::FileNotFound(_)));

        let err = ScribeError::open(
            "locked.mbox",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, ScribeError::Io { .. }));
        assert!(err.to_string().contains("locked.mbox"));
    }
}
