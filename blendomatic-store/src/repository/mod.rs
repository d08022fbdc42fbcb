//! Repository Module
//!
//! Document-level access on top of a [`BlobStore`]. Each repository handles
//! the documents of one concern and is handed the backend it should use, the
//! same way every call site picks the backend explicitly.

pub mod heartbeat;
pub mod run;
pub mod state;

// Re-export for convenience
pub use heartbeat as heartbeat_repository;
pub use run as run_repository;
pub use state as state_repository;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::BlobStore;
use crate::error::{Result, StoreError};

pub const JSON: &str = "application/json";
pub const TEXT: &str = "text/plain; charset=utf-8";
pub const MARKDOWN: &str = "text/markdown; charset=utf-8";
pub const CSV: &str = "text/csv; charset=utf-8";

/// Read and decode a JSON document, `None` when absent
pub async fn read_json<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StoreError::json(key, e)),
        None => Ok(None),
    }
}

/// Encode and write a JSON document, pretty-printed with a trailing newline
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(key, e))?;
    body.push(b'\n');
    store.put(key, body, JSON).await
}
