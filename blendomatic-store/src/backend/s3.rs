//! S3 bucket client
//!
//! Credentials, region and endpoint come from the standard AWS environment
//! (`AWS_REGION`, `AWS_PROFILE`, `AWS_ENDPOINT_URL`, ...). The SDK client is
//! built on first use, so opening a store never touches the network.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{ObjectClient, ObjectPage};
use crate::error::{Result, StoreError};

/// An [`ObjectClient`] over one S3 bucket
pub struct S3ObjectClient {
    bucket: String,
    client: OnceCell<Client>,
}

impl S3ObjectClient {
    /// Client for `bucket`, configured from the environment on first request
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            client: OnceCell::new(),
        }
    }

    /// Use an SDK client configured by the caller
    pub fn with_client(bucket: impl Into<String>, client: Client) -> Self {
        Self {
            bucket: bucket.into(),
            client: OnceCell::new_with(Some(client)),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
                debug!(
                    "S3 client for bucket {} (region {:?})",
                    self.bucket,
                    config.region()
                );
                Client::new(&config)
            })
            .await
    }

    fn error(&self, action: &str, key: &str, err: impl std::error::Error) -> StoreError {
        StoreError::Object(format!(
            "{action} s3://{}/{key}: {}",
            self.bucket,
            DisplayErrorContext(err)
        ))
    }
}

impl std::fmt::Debug for S3ObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectClient")
            .field("bucket", &self.bucket)
            .field("connected", &self.client.initialized())
            .finish()
    }
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client()
            .await
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(self.error("get", key, err));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| self.error("read", key, e))?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let mut request = self
            .client()
            .await
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if !content_type.is_empty() {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| self.error("put", key, e))?;
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ObjectPage> {
        let output = self
            .client()
            .await
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| self.error("list", prefix, e))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(str::to_string)
            .collect();
        let continuation = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage { keys, continuation })
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| self.error("delete", key, e))
            })
            .collect::<Result<Vec<_>>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| self.error("delete", &keys[0], e))?;

        let output = self
            .client()
            .await
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| self.error("delete", &keys[0], e))?;

        let failures = output.errors();
        if failures.is_empty() {
            return Ok(());
        }
        for failure in failures {
            warn!(
                "Could not delete s3://{}/{}: {}",
                self.bucket,
                failure.key().unwrap_or("?"),
                failure.message().unwrap_or("unknown error")
            );
        }
        Err(StoreError::Object(format!(
            "{} of {} objects in s3://{} were not deleted",
            failures.len(),
            keys.len(),
            self.bucket
        )))
    }
}
