//! Storage backends
//!
//! Every backend exposes a flat key namespace of `/`-separated keys. The run
//! tree, the side-state document and the heartbeat namespace are all laid out
//! on top of this one trait, so the local tree and the object store stay
//! interchangeable.

mod local;
mod memory;
mod mounted;
mod object;
mod s3;
mod url;

pub use local::LocalBlobStore;
pub use memory::MemoryObjectClient;
pub use mounted::MountedBucketClient;
pub use object::{ObjectBlobStore, ObjectClient, ObjectPage};
pub use s3::S3ObjectClient;
pub use url::RemoteUrl;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::Result;

/// Maximum number of keys sent in one delete request
pub const DELETE_BATCH_SIZE: usize = 1000;

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Continuation token for the next page, if any
    pub next: Option<String>,
}

/// Outcome of a recursive delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn merge(&mut self, other: DeleteReport) {
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// A flat namespace of byte blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Human-readable location, for logs and CLI output
    fn describe(&self) -> String;

    /// Reads a blob, `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a blob, replacing any existing content
    ///
    /// # Arguments
    /// * `key` - Key relative to the namespace root
    /// * `body` - Blob content
    /// * `content_type` - MIME type recorded by backends that keep one
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Lists one page of keys under `prefix`, in key order
    ///
    /// # Arguments
    /// * `prefix` - Key prefix; empty lists the whole namespace
    /// * `continuation` - Token returned by the previous page
    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage>;

    /// Deletes a batch of keys; keys that do not exist are ignored
    async fn delete_batch(&self, keys: &[String]) -> Result<()>;

    /// Lists every key under `prefix`, following continuation tokens
    async fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation = None;
        loop {
            let page = self.list_page(prefix, continuation).await?;
            keys.extend(page.keys);
            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }

    /// Whether at least one key exists under `prefix`
    async fn exists_prefix(&self, prefix: &str) -> Result<bool> {
        let page = self.list_page(prefix, None).await?;
        Ok(!page.keys.is_empty())
    }

    /// Distinct first segments of keys that have at least one more segment
    ///
    /// For the run namespace these are the run directories.
    async fn list_top_level(&self) -> Result<Vec<String>> {
        let keys = self.list_all("").await?;
        let names: BTreeSet<String> = keys
            .iter()
            .filter_map(|key| key.split_once('/'))
            .map(|(first, _)| first.to_string())
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Deletes every key under `prefix`
    ///
    /// Keys are listed first, then removed in batches of [`DELETE_BATCH_SIZE`].
    /// A failing batch is logged and counted; earlier batches stay deleted.
    async fn delete_prefix(&self, prefix: &str) -> Result<DeleteReport> {
        let keys = self.list_all(prefix).await?;
        let mut report = DeleteReport::default();

        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            match self.delete_batch(batch).await {
                Ok(()) => report.deleted += batch.len(),
                Err(e) => {
                    warn!(
                        "Failed to delete {} keys under {} in {}: {}",
                        batch.len(),
                        prefix,
                        self.describe(),
                        e
                    );
                    report.failed += batch.len();
                }
            }
        }

        debug!(
            "Deleted {} keys under {} in {} ({} failed)",
            report.deleted,
            prefix,
            self.describe(),
            report.failed
        );
        Ok(report)
    }
}

/// Join key segments, skipping empty ones
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject keys that could escape their namespace
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment == ".." || segment == ".")
    {
        return Err(crate::error::StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_join_key() {
        assert_eq!(join_key(&["", "runs", "0001/", "run.json"]), "runs/0001/run.json");
        assert_eq!(join_key(&["/studio/", "workers"]), "studio/workers");
        assert_eq!(join_key(&[]), "");
    }

    #[test]
    fn test_check_key() {
        assert!(check_key("0001/run.json").is_ok());
        assert!(check_key("../escape").is_err());
        assert!(check_key("/etc/passwd").is_err());
        assert!(check_key("a/./b").is_err());
    }

    #[tokio::test]
    async fn test_delete_prefix_spans_batches() {
        let client = Arc::new(MemoryObjectClient::new().with_page_size(250));
        let store = ObjectBlobStore::runs(client.clone(), "");
        for i in 0..(DELETE_BATCH_SIZE + 5) {
            store
                .put(&format!("0001/frames/{i:05}.png"), vec![0], "image/png")
                .await
                .unwrap();
        }
        store.put("0002/run.json", b"{}".to_vec(), "application/json").await.unwrap();

        let report = store.delete_prefix("0001/").await.unwrap();
        assert_eq!(report.deleted, DELETE_BATCH_SIZE + 5);
        assert!(report.is_clean());
        assert!(!store.exists_prefix("0001/").await.unwrap());
        assert_eq!(store.list_top_level().await.unwrap(), vec!["0002"]);
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_failures() {
        let client = Arc::new(MemoryObjectClient::new());
        let store = ObjectBlobStore::runs(client.clone(), "");
        store.put("0001/run.json", b"{}".to_vec(), "application/json").await.unwrap();

        client.fail_writes(true);
        let report = store.delete_prefix("0001/").await.unwrap();
        assert_eq!(report, DeleteReport { deleted: 0, failed: 1 });
    }
}
