//! In-memory bucket
//!
//! Backs `memory://` URLs and stands in for a real bucket in tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::object::{DEFAULT_MAX_KEYS, ObjectClient, ObjectPage};
use crate::error::{Result, StoreError};

#[derive(Debug)]
pub struct MemoryObjectClient {
    bucket: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    page_size: usize,
    fail_writes: AtomicBool,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_MAX_KEYS,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Cap the number of keys returned per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every put and delete fail until switched off again
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every stored key, in order
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Object(format!(
                "bucket {} rejected the write",
                self.bucket
            )));
        }
        Ok(())
    }
}

impl Default for MemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    fn describe(&self) -> String {
        format!("memory://{}", self.bucket)
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        self.check_writable()?;
        self.objects.write().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ObjectPage> {
        let limit = max_keys.min(self.page_size).max(1);
        let objects = self.objects.read().await;

        // Continuation token is the last key of the previous page
        let mut matching = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| continuation.as_ref().is_none_or(|after| *k > after));

        let keys: Vec<String> = matching.by_ref().take(limit).cloned().collect();
        let continuation = match (matching.next(), keys.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(ObjectPage { keys, continuation })
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        self.check_writable()?;
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pagination_tokens() {
        let client = MemoryObjectClient::new().with_page_size(2);
        for key in ["a/1", "a/2", "a/3", "b/1"] {
            client.put_object(key, Vec::new(), "").await.unwrap();
        }

        let first = client.list_objects("a/", None, 100).await.unwrap();
        assert_eq!(first.keys, vec!["a/1", "a/2"]);
        assert_eq!(first.continuation.as_deref(), Some("a/2"));

        let second = client.list_objects("a/", first.continuation, 100).await.unwrap();
        assert_eq!(second.keys, vec!["a/3"]);
        assert!(second.continuation.is_none());
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let client = MemoryObjectClient::named("renders");
        client.fail_writes(true);
        assert!(client.put_object("k", Vec::new(), "").await.is_err());
        client.fail_writes(false);
        assert!(client.put_object("k", Vec::new(), "").await.is_ok());
        assert_eq!(client.describe(), "memory://renders");
    }
}
