//! Error types for shell-core operations.
//!
//! Most public operations never surface these: the session store and the
//! lifecycle manager degrade to defaults. They exist for storage backends and
//! configuration I/O, where callers may want the detail.

use std::path::PathBuf;

/// All errors that can occur in shell-core operations.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration invalid: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Atomic write failed: {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ShellError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ShellError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        ShellError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using ShellError.
pub type Result<T> = std::result::Result<T, ShellError>;

impl From<ShellError> for String {
    fn from(err: ShellError) -> String {
        err.to_string()
    }
}
