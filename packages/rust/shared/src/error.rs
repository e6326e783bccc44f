//! Error types for bulkingest.
//!
//! Library crates use [`IngestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Fatal conditions (parse, transport) abort an import and are reported as
//! [`IngestError::Aborted`], which carries the count committed before the
//! failure. Recoverable conditions (invalid items, store-side rejections)
//! never surface as errors; they only reduce the returned counts.

use std::path::PathBuf;

/// Top-level error type for all bulkingest operations.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed source: missing required column, bad row, oversized field.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The store is unreachable or a bulk call failed as a whole.
    #[error("transport error: {0}")]
    Transport(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid argument or entity (used outside the import hot path).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An import stopped on a fatal error after committing `committed` items.
    #[error("import aborted after {committed} committed items: {source}")]
    Aborted {
        committed: usize,
        #[source]
        source: Box<IngestError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a fatal error, recording how much was committed before it.
    pub fn aborted(committed: usize, source: IngestError) -> Self {
        Self::Aborted {
            committed,
            source: Box::new(source),
        }
    }

    /// Items committed before the failure, if this is an aborted import.
    pub fn committed(&self) -> Option<usize> {
        match self {
            Self::Aborted { committed, .. } => Some(*committed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = IngestError::config("missing database path");
        assert_eq!(err.to_string(), "config error: missing database path");

        let err = IngestError::parse("missing column 'content'");
        assert!(err.to_string().contains("missing column 'content'"));
    }

    #[test]
    fn aborted_preserves_committed_count() {
        let err = IngestError::aborted(2000, IngestError::Transport("connection reset".into()));
        assert_eq!(err.committed(), Some(2000));
        assert!(err.to_string().contains("after 2000 committed items"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn non_aborted_has_no_committed_count() {
        let err = IngestError::validation("batch size must be positive");
        assert_eq!(err.committed(), None);
    }
}
