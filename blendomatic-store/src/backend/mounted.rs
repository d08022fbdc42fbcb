//! Bucket mounted as a directory
//!
//! Serves `file://` URLs: object keys are paths below the mount point. Listing
//! is key-ordered and paginated with the last key as the continuation token,
//! the way a bucket listing behaves.

use async_trait::async_trait;
use std::path::PathBuf;

use super::local::LocalBlobStore;
use super::object::{ObjectClient, ObjectPage};
use super::BlobStore;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct MountedBucketClient {
    tree: LocalBlobStore,
}

impl MountedBucketClient {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            tree: LocalBlobStore::new(mount_point),
        }
    }
}

#[async_trait]
impl ObjectClient for MountedBucketClient {
    fn describe(&self) -> String {
        format!("file://{}", self.tree.describe())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.tree.get(key).await
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.tree.put(key, body, content_type).await
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ObjectPage> {
        let all = self.tree.list_page(prefix, None).await?.keys;
        let mut remaining = all
            .into_iter()
            .filter(|k| continuation.as_ref().is_none_or(|after| k > after));

        let keys: Vec<String> = remaining.by_ref().take(max_keys.max(1)).collect();
        let continuation = match (remaining.next(), keys.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(ObjectPage { keys, continuation })
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        self.tree.delete_batch(keys).await
    }
}
