//! Local directory tree backend

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{BlobStore, DeleteReport, ListPage, check_key};
use crate::error::{Result, StoreError};

/// Keys map to files relative to a root directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a key
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(key
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    /// Collect every file below `dir` as a key
    async fn walk(&self, dir: PathBuf) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![dir];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    continue;
                }
                Err(e) => return Err(StoreError::io(&dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::io(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(segments.join("/"))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(None)
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        fs::write(&path, body)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    async fn list_page(&self, prefix: &str, _continuation: Option<String>) -> Result<ListPage> {
        // Walk only the deepest directory the prefix names
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = self.path_for(dir_part)?;

        let mut keys: Vec<String> = self
            .walk(start)
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();

        Ok(ListPage { keys, next: None })
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.path_for(key)?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Ok(())
    }

    async fn list_top_level(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<DeleteReport> {
        let trimmed = prefix.trim_end_matches('/');
        let dir = self.path_for(trimmed)?;
        if trimmed.is_empty() || !fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            // Not a directory: remove matching files one by one
            let keys = self.list_page(prefix, None).await?.keys;
            return match self.delete_batch(&keys).await {
                Ok(()) => Ok(DeleteReport {
                    deleted: keys.len(),
                    failed: 0,
                }),
                Err(e) => {
                    warn!("Failed to delete {} in {}: {}", prefix, self.describe(), e);
                    Ok(DeleteReport {
                        deleted: 0,
                        failed: keys.len(),
                    })
                }
            };
        }

        let count = self.walk(dir.clone()).await?.len();
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Removed {} ({} files)", dir.display(), count);
                Ok(DeleteReport {
                    deleted: count,
                    failed: 0,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteReport::default()),
            Err(e) => {
                warn!("Failed to remove {}: {}", dir.display(), e);
                // Whatever is left on disk is what failed
                let remaining = self.walk(dir).await.map(|k| k.len()).unwrap_or(count);
                Ok(DeleteReport {
                    deleted: count.saturating_sub(remaining),
                    failed: remaining,
                })
            }
        }
    }
}
