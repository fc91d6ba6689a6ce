//! Read-only storage backend.
//!
//! This module provides a storage backend implementation that wraps other
//! implementations and prevents uploads from executing, but indicating
//! success on return. Used for dry runs (`--no-upload`).

use async_trait::async_trait;

use crate::{BackendHandle, StorageBackend, backend::ObjectInfoStream, error::Result};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all uploads, logging an
/// [`info event`](tracing::Event). Listing and existence checks still hit
/// the wrapped backend, so deduplication behaves exactly as in a real run.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        tracing::info!(key, bytes = data.len(), content_type, "Skipping upload during read-only mode");
        Ok(())
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_is_dropped() {
        let inner = Arc::new(MockBackend::with_keys(["existing.webp"]));
        let backend = ReadOnlyBackend::new(inner.clone());
        backend.put("new.webp", b"data".to_vec(), "image/webp").await.unwrap();
        assert!(!inner.exists("new.webp").await.unwrap());
        assert_eq!(inner.puts(), 0);
        assert!(backend.is_read_only());
        assert!(!inner.is_read_only());
    }

    #[tokio::test]
    async fn test_reads_pass_through() {
        let inner = Arc::new(MockBackend::with_keys(["existing.webp"]).with_name("inner"));
        let backend = ReadOnlyBackend::new(inner);
        assert_eq!(backend.name(), "inner");
        assert!(backend.exists("existing.webp").await.unwrap());
        assert_eq!(backend.list(None).await.unwrap().len(), 1);
    }
}
