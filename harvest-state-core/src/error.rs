/*!
Error types for harvest state stores.
*/

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the harvest state crate.
pub type Result<T> = std::result::Result<T, HarvestStateError>;

/// Errors that can occur while loading or saving harvest state.
///
/// A missing key or namespace is never an error; lookups report it as `None`.
#[derive(Error, Debug)]
pub enum HarvestStateError {
    /// The backing state file exists but is not a valid snapshot
    #[error("Corrupt state file {}: {source}", .path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Directory creation, read, write or rename failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors outside of the store's own file handling
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid store configuration
    #[error("Validation error: {0}")]
    Validation(String),
}

impl HarvestStateError {
    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a corrupt state error for the file at `path`
    pub fn corrupt_state<P: Into<PathBuf>>(path: P, source: serde_json::Error) -> Self {
        Self::CorruptState {
            path: path.into(),
            source,
        }
    }

    /// True when the failure came from an unparseable state file
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, Self::CorruptState { .. })
    }

    /// True when the failure came from the filesystem
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}
