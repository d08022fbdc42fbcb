//! Error types for the run store

use blendomatic_core::PlanError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while reading or writing runs
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored document could not be (de)serialized
    #[error("invalid JSON in {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The object store rejected a request
    #[error("object store error: {0}")]
    Object(String),

    /// A key tried to escape its namespace
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("run {0} not found")]
    RunNotFound(String),

    /// Explicit run number at or below the allocation floor, or already present
    #[error("run {0} already exists or was used")]
    RunAlreadyExists(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Selection failed validation
    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn json(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            key: key.into(),
            source,
        }
    }

    /// Check if this error means the run does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RunNotFound(_))
    }
}
