//! Error types for regsync.
//!
//! Library crates use [`RegSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all regsync operations.
#[derive(Debug, thiserror::Error)]
pub enum RegSyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure or non-success response from the corpus provider.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Malformed source markup, or no sections extracted from it.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error outside the assembly phase.
    #[error("storage error: {0}")]
    Storage(String),

    /// Constraint violation or write failure during manual assembly.
    #[error("upsert error: {0}")]
    Upsert(String),

    /// The assembly transaction exceeded its time bound.
    #[error("assembly transaction timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// A sync for this corpus key is already running.
    #[error(
        "sync already in progress for title {title} part {part}; \
         wait for it to finish or clear the stale SYNCING state"
    )]
    SyncInProgress { title: u32, part: u32 },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RegSyncError>;

impl RegSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error from any displayable message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create an upsert error from any displayable message.
    pub fn upsert(msg: impl Into<String>) -> Self {
        Self::Upsert(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RegSyncError::config("missing corpus section");
        assert_eq!(err.to_string(), "config error: missing corpus section");

        let err = RegSyncError::parse("unexpected closing tag at byte 42");
        assert!(err.to_string().contains("byte 42"));

        let err = RegSyncError::Timeout { seconds: 120 };
        assert_eq!(
            err.to_string(),
            "assembly transaction timed out after 120s"
        );
    }

    #[test]
    fn sync_in_progress_names_the_corpus_key() {
        let err = RegSyncError::SyncInProgress {
            title: 29,
            part: 1926,
        };
        let msg = err.to_string();
        assert!(msg.contains("title 29"));
        assert!(msg.contains("part 1926"));
    }
}
