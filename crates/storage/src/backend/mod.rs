//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for the object store the pipeline uploads into (S3-compatible
//! services, a local directory, etc.).

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::ObjectInfo;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub(crate) type ObjectInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectInfo>> + Send + 'a>>;

/// Unified interface for object store backends.
///
/// All storage operations are asynchronous to efficiently handle network
/// operations. It's a deliberately small surface: list what's there, check a
/// single key, and put a whole object.
///
/// # Key Handling
/// All keys are relative to the backend's root (bucket prefix, directory)
/// and must be validated using [`validate_key`](crate::validate_key) before
/// use. Implementations should enforce this validation.
///
/// # Examples
///
/// ```
/// use imgsync_storage::{backend::StorageBackend, error::Result};
///
/// async fn upload_once(backend: &dyn StorageBackend, key: &str, data: Vec<u8>) -> Result<bool> {
///     if backend.exists(key).await? {
///         return Ok(false);
///     }
///     backend.put(key, data, "image/webp").await?;
///     Ok(true)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Whether [`put()`](Self::put) silently drops objects instead of
    /// storing them.
    fn is_read_only(&self) -> bool {
        false
    }

    /// List all objects matching an optional key prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream object metadata matching an optional key prefix.
    ///
    /// Returns metadata for all objects in the storage backend as a
    /// [`Stream`], yielding results incrementally (page by page for remote
    /// backends). If a prefix is provided, only objects whose keys start with
    /// the prefix's segments are returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use imgsync_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(Some("gallery"));
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.key, info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Store an object, overwriting any existing object under the same key.
    ///
    /// # Notes
    /// - The whole object is sent in a single request; there is no chunking
    ///   and no resumable upload.
    /// - Backends that have no notion of content type ignore it.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
}
