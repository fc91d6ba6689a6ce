//! Snapshot of the keys already present in the object store.

use crate::error::{ErrorKind, Result};
use crate::key::RemoteKey;
use exn::ResultExt;
use futures::TryStreamExt;
use imgsync_storage::BackendHandle;
use std::collections::HashSet;

/// Every key in the store at the moment it was fetched.
///
/// Fetched once per run and never refreshed: uploads made during the run are
/// not reflected in it.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    keys: HashSet<String>,
}

impl Inventory {
    /// List every key under the backend's root (page by page for remote
    /// stores).
    ///
    /// # Errors
    ///
    /// [`Inventory`](ErrorKind::Inventory) raised from the storage error if
    /// any part of the listing fails. A partial inventory is never returned.
    #[tracing::instrument(skip_all, fields(backend = backend.name()))]
    pub async fn fetch(backend: &BackendHandle) -> Result<Self> {
        let keys: HashSet<String> = backend
            .list_stream(None)
            .map_ok(|info| info.key)
            .try_collect()
            .await
            .or_raise(|| ErrorKind::Inventory)?;
        tracing::info!(count = keys.len(), "Fetched store inventory");
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &RemoteKey) -> bool {
        self.keys.contains(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Into<String>> FromIterator<K> for Inventory {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{REMOTE_SEPARATOR, derive_key};
    use imgsync_storage::backend::MockBackend;
    use std::ops::Deref;
    use std::path::Path;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fetch() {
        let backend: BackendHandle = Arc::new(MockBackend::with_keys(["photo.webp", "sub/img.webp"]));
        let inventory = Inventory::fetch(&backend).await.unwrap();
        assert_eq!(inventory.len(), 2);
        let key = derive_key(Path::new("/root/sub/img.jpg"), Path::new("/root"), REMOTE_SEPARATOR).unwrap();
        assert!(inventory.contains(&key));
        let key = derive_key(Path::new("/root/img.jpg"), Path::new("/root"), REMOTE_SEPARATOR).unwrap();
        assert!(!inventory.contains(&key));
    }

    #[tokio::test]
    async fn test_fetch_empty_store() {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        assert!(Inventory::fetch(&backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let backend: BackendHandle = Arc::new(MockBackend::with_keys(["photo.webp"]).failing_list());
        let err = Inventory::fetch(&backend).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Inventory));
    }
}
