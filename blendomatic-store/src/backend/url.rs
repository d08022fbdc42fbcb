//! Remote backend URLs

use std::path::PathBuf;
use std::sync::Arc;

use super::{MemoryObjectClient, MountedBucketClient, ObjectClient, S3ObjectClient, join_key};
use crate::error::{Result, StoreError};

/// A parsed `BLENDOMATIC_RUN_STORE` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteUrl {
    /// `s3://<bucket>[/<prefix>]`
    S3 { bucket: String, prefix: String },

    /// `memory://<bucket>`, process-local
    Memory(String),

    /// `file://<dir>`, a bucket mounted as a directory
    Mounted(PathBuf),
}

impl RemoteUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (scheme, rest) = raw.split_once("://").ok_or_else(|| {
            StoreError::Config(format!("remote store URL '{raw}' has no scheme"))
        })?;

        match scheme.to_ascii_lowercase().as_str() {
            "s3" => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(StoreError::Config(format!(
                        "s3 URL '{raw}' needs a bucket name"
                    )));
                }
                Ok(RemoteUrl::S3 {
                    bucket: bucket.to_string(),
                    prefix: join_key(&[prefix]),
                })
            }
            "memory" | "mem" => {
                let bucket = rest.trim_matches('/');
                Ok(RemoteUrl::Memory(if bucket.is_empty() {
                    "memory".to_string()
                } else {
                    bucket.to_string()
                }))
            }
            "file" => {
                if rest.is_empty() {
                    return Err(StoreError::Config(
                        "file:// URL needs a directory".to_string(),
                    ));
                }
                Ok(RemoteUrl::Mounted(PathBuf::from(rest)))
            }
            other => Err(StoreError::Config(format!(
                "unsupported remote store scheme '{other}'"
            ))),
        }
    }

    /// Key prefix carried in the URL itself, empty when there is none
    pub fn key_prefix(&self) -> &str {
        match self {
            RemoteUrl::S3 { prefix, .. } => prefix,
            RemoteUrl::Memory(_) | RemoteUrl::Mounted(_) => "",
        }
    }

    /// Builds the client for this URL
    pub fn connect(&self) -> Arc<dyn ObjectClient> {
        match self {
            RemoteUrl::S3 { bucket, .. } => Arc::new(S3ObjectClient::new(bucket.clone())),
            RemoteUrl::Memory(bucket) => Arc::new(MemoryObjectClient::named(bucket)),
            RemoteUrl::Mounted(dir) => Arc::new(MountedBucketClient::new(dir.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urls() {
        assert_eq!(
            RemoteUrl::parse("memory://renders").unwrap(),
            RemoteUrl::Memory("renders".to_string())
        );
        assert_eq!(
            RemoteUrl::parse("file:///mnt/bucket").unwrap(),
            RemoteUrl::Mounted(PathBuf::from("/mnt/bucket"))
        );
        assert!(RemoteUrl::parse("gs://renders").is_err());
        assert!(RemoteUrl::parse("renders").is_err());
        assert!(RemoteUrl::parse("file://").is_err());
    }

    #[test]
    fn test_parse_s3_urls() {
        assert_eq!(
            RemoteUrl::parse("s3://renders/farm").unwrap(),
            RemoteUrl::S3 {
                bucket: "renders".to_string(),
                prefix: "farm".to_string(),
            }
        );

        let nested = RemoteUrl::parse("S3://renders/studio/farm/").unwrap();
        assert_eq!(nested.key_prefix(), "studio/farm");

        let bare = RemoteUrl::parse("s3://renders").unwrap();
        assert_eq!(bare.key_prefix(), "");

        assert!(RemoteUrl::parse("s3://").is_err());
        assert!(RemoteUrl::parse("s3:///farm").is_err());
    }

    #[tokio::test]
    async fn test_connect_describes_location() {
        let client = RemoteUrl::parse("memory://renders").unwrap().connect();
        assert_eq!(client.describe(), "memory://renders");

        let s3 = RemoteUrl::parse("s3://renders/farm").unwrap().connect();
        assert_eq!(s3.describe(), "s3://renders");
    }
}
