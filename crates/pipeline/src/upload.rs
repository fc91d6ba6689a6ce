//! Pushing processed files into the object store.

use crate::error::{ErrorKind, Result};
use crate::key::RemoteKey;
use exn::ResultExt;
use imgsync_storage::{BackendHandle, content_type};
use std::path::Path;
use tokio::fs;

/// Read `local_path` into memory and put it under `key` in one request.
///
/// The content type comes from the local file's extension, falling back to
/// `application/octet-stream`.
///
/// # Errors
///
/// [`Upload`](ErrorKind::Upload) if the file can't be read or the store
/// rejects the request.
#[tracing::instrument(skip_all, fields(backend = backend.name(), %key))]
pub async fn upload(backend: &BackendHandle, local_path: &Path, key: &RemoteKey) -> Result<()> {
    let data = fs::read(local_path).await.or_raise(|| ErrorKind::Upload(key.to_string()))?;
    let content_type = content_type(local_path);
    let size = data.len();
    backend.put(key.as_str(), data, content_type).await.or_raise(|| ErrorKind::Upload(key.to_string()))?;
    tracing::info!(path = %local_path.display(), size, content_type, "Uploaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{REMOTE_SEPARATOR, derive_key};
    use imgsync_storage::backend::MockBackend;
    use std::ops::Deref;
    use std::sync::Arc;

    fn key(path: &Path, root: &Path) -> RemoteKey {
        derive_key(path, root, REMOTE_SEPARATOR).unwrap()
    }

    #[tokio::test]
    async fn test_upload_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.svg");
        std::fs::write(&path, b"<svg/>").unwrap();
        let mock = Arc::new(MockBackend::default());
        let backend: BackendHandle = mock.clone();
        upload(&backend, &path, &key(&path, dir.path())).await.unwrap();
        assert_eq!(mock.object("icon.svg").await.unwrap(), b"<svg/>");
        assert_eq!(mock.content_type("icon.svg").await.as_deref(), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_content_type_follows_local_file() {
        let dir = tempfile::tempdir().unwrap();
        // Staged output is always named after its webp key.
        let staged = dir.path().join("sub:img.webp");
        std::fs::write(&staged, b"RIFF").unwrap();
        let mock = Arc::new(MockBackend::default());
        let backend: BackendHandle = mock.clone();
        let remote = key(&dir.path().join("sub/img.jpg"), dir.path());
        upload(&backend, &staged, &remote).await.unwrap();
        assert_eq!(mock.content_type("sub/img.webp").await.as_deref(), Some("image/webp"));
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let err = upload(&backend, &path, &key(&path, dir.path())).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Upload(_)));
    }

    #[tokio::test]
    async fn test_store_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.gif");
        std::fs::write(&path, b"GIF89a").unwrap();
        let backend: BackendHandle = Arc::new(MockBackend::default().failing("icon.gif"));
        let err = upload(&backend, &path, &key(&path, dir.path())).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Upload(key) if key == "icon.gif"));
    }
}
