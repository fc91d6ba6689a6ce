//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Cloudflare R2, MinIO, and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration (`key_id` and
//! `key_secret`); the SDK's default credential chain is not consulted.
//!
//! # Retries
//!
//! The SDK's own retry policy is disabled. A failed request surfaces
//! immediately and the caller decides what to do with the item.

use crate::{
    ObjectInfo, StorageBackend,
    backend::ObjectInfoStream,
    error::{ErrorKind, Result},
    validate_key,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    primitives::{ByteStream, DateTime},
    types::Object,
};
use exn::ResultExt;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible storage backend.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any): listing strips it and
/// uploads prepend it.
///
/// # Examples
///
/// ```no_run
/// use imgsync_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "images",
///     "my-bucket",
///     Some("static/img".to_string()),
///     "auto",
///     Some("https://<account>.r2.cloudflarestorage.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in display/logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "auto" for R2)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "imgsync-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            .retry_config(RetryConfig::disabled())
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(name, Client::from_conf(config_builder.build()), bucket, prefix)
    }

    /// Wrap an already-configured SDK client.
    pub fn from_client(
        name: impl Into<String>,
        client: Client,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        // An empty prefix (`S3_PREFIX=`) means the bucket root.
        let prefix = prefix.filter(|p| !p.trim_matches('/').is_empty()).map(validate_key).transpose()?;
        Ok(Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &str) -> Result<String> {
        let validated = validate_key(key)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}/{validated}"),
            None => validated,
        })
    }

    /// Strip the configured prefix from a listed S3 key.
    ///
    /// The rest of the key is kept exactly as stored, so it only matches a
    /// derived key byte for byte. Returns `None` for keys outside the prefix.
    fn relative_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        let relative = match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str())?.strip_prefix('/')?,
            None => key,
        };
        (!relative.is_empty()).then_some(relative)
    }

    /// The `Prefix` parameter for a listing: the configured prefix, narrowed
    /// by the caller's prefix, always ending in `/` so that `gallery` doesn't
    /// match `gallery-old/...`.
    fn list_prefix(&self, prefix: Option<&str>) -> Result<Option<String>> {
        Ok(match prefix {
            Some(p) => Some(format!("{}/", self.full_key(p)?)),
            None => self.prefix.as_ref().map(|p| format!("{p}/")),
        })
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    ///
    /// The semaphore is never closed, so this only yields `None` in theory.
    async fn acquire_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.rate_limiter.clone().acquire_owned().await.ok()
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    /// Convert a listed object into [`ObjectInfo`]. Folder placeholder
    /// objects (keys ending in `/`) are skipped, as are keys that don't sit
    /// under the configured prefix.
    fn object_info(&self, object: &Object) -> Option<ObjectInfo> {
        let key = object.key()?;
        if key.ends_with('/') {
            return None;
        }
        let Some(relative) = self.relative_key(key) else {
            tracing::warn!(bucket = %self.bucket, key, "Skipping listed key outside the configured prefix");
            return None;
        };
        let size = object.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0);
        let info = ObjectInfo::new(relative, size);
        Some(match object.last_modified().map(Self::parse_datetime) {
            Some(Ok(modified)) => info.with_modified(modified),
            Some(Err(e)) => {
                tracing::warn!(bucket = %self.bucket, key, error = ?e, "Ignoring unreadable modification time");
                info
            },
            None => info,
        })
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        let list_prefix = match self.list_prefix(prefix) {
            Ok(p) => p,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            let mut continuation: Option<String> = None;
            loop {
                let mut request = self.client.list_objects_v2().bucket(&self.bucket);
                if let Some(p) = &list_prefix {
                    request = request.prefix(p);
                }
                if let Some(token) = &continuation {
                    request = request.continuation_token(token);
                }
                let result = {
                    let _permit = self.acquire_permit().await;
                    request.send().await
                };
                let output = match result.or_raise(|| {
                    ErrorKind::Network(format!("failed to list s3://{}/{}", self.bucket, list_prefix.as_deref().unwrap_or_default()))
                }) {
                    Ok(output) => output,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                for info in output.contents().iter().filter_map(|object| self.object_info(object)) {
                    yield Ok(info);
                }
                match (output.is_truncated(), output.next_continuation_token()) {
                    (Some(true), Some(token)) => continuation = Some(token.to_string()),
                    _ => break,
                }
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        match self.client.head_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => {
                Err(err).or_raise(|| ErrorKind::Network(format!("failed to head s3://{}/{}", self.bucket, full_key)))
            },
        }
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let full_key = self.full_key(key)?;
        let size = data.len();
        let _permit = self.acquire_permit().await;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to upload s3://{}/{}", self.bucket, full_key)))?;
        tracing::debug!(bucket = %self.bucket, key = %full_key, size, content_type, "Uploaded object");
        Ok(())
    }
}
