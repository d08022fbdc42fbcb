//! Object store backend
//!
//! [`ObjectClient`] is the seam to a bucket: it speaks whole keys and knows
//! nothing about run layout. [`ObjectBlobStore`] scopes a client to one
//! namespace under the configured prefix.

use async_trait::async_trait;
use std::sync::Arc;

use super::{BlobStore, ListPage, check_key, join_key};
use crate::error::Result;

/// Default page size requested from the bucket
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// One page of a bucket listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub continuation: Option<String>,
}

/// Minimal bucket operations
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Bucket location, e.g. `memory://renders`
    fn describe(&self) -> String;

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Lists keys starting with `prefix` in key order
    ///
    /// # Arguments
    /// * `prefix` - Full key prefix
    /// * `continuation` - Token from the previous page
    /// * `max_keys` - Upper bound on keys in this page
    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ObjectPage>;

    async fn delete_objects(&self, keys: &[String]) -> Result<()>;
}

/// A [`BlobStore`] view of one namespace inside a bucket
#[derive(Clone)]
pub struct ObjectBlobStore {
    client: Arc<dyn ObjectClient>,
    /// Full key prefix of the namespace, without trailing slash
    base: String,
}

impl ObjectBlobStore {
    /// Namespace rooted at `base` inside the bucket
    pub fn new(client: Arc<dyn ObjectClient>, base: &str) -> Self {
        Self {
            client,
            base: join_key(&[base]),
        }
    }

    /// The run namespace, `{prefix}/runs`
    pub fn runs(client: Arc<dyn ObjectClient>, prefix: &str) -> Self {
        Self::new(client, &join_key(&[prefix, "runs"]))
    }

    /// The heartbeat namespace, `{prefix}/workers`
    pub fn workers(client: Arc<dyn ObjectClient>, prefix: &str) -> Self {
        Self::new(client, &join_key(&[prefix, "workers"]))
    }

    fn full_key(&self, key: &str) -> Result<String> {
        check_key(key)?;
        if self.base.is_empty() {
            Ok(key.to_string())
        } else {
            Ok(format!("{}/{}", self.base, key))
        }
    }

    fn relative_key<'a>(&self, full: &'a str) -> Option<&'a str> {
        if self.base.is_empty() {
            return Some(full);
        }
        full.strip_prefix(&self.base)?.strip_prefix('/')
    }
}

impl std::fmt::Debug for ObjectBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBlobStore")
            .field("location", &self.describe())
            .finish()
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    fn describe(&self) -> String {
        format!("{}/{}", self.client.describe().trim_end_matches('/'), self.base)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = self.full_key(key)?;
        self.client.get_object(&key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let key = self.full_key(key)?;
        self.client.put_object(&key, body, content_type).await
    }

    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage> {
        let full_prefix = self.full_key(prefix)?;
        let page = self
            .client
            .list_objects(&full_prefix, continuation, DEFAULT_MAX_KEYS)
            .await?;

        Ok(ListPage {
            keys: page
                .keys
                .iter()
                .filter_map(|k| self.relative_key(k))
                .map(str::to_string)
                .collect(),
            next: page.continuation,
        })
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<()> {
        let full: Vec<String> = keys
            .iter()
            .map(|k| self.full_key(k))
            .collect::<Result<_>>()?;
        self.client.delete_objects(&full).await
    }
}
