//! Scratch directory holding compressed output until it's uploaded.

use crate::error::{ErrorKind, Result};
use crate::key::RemoteKey;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A freshly emptied staging directory.
///
/// Files are staged flat, named after their
/// [`STAGING_SEPARATOR`](crate::STAGING_SEPARATOR)-joined key. Nothing is
/// cleaned up at the end of a run, so the output can be inspected.
#[derive(Debug, Clone)]
pub struct StagingDir {
    root: PathBuf,
}

impl StagingDir {
    /// Remove `path` (if it exists) along with everything in it, then create
    /// it again, empty.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        match fs::remove_dir_all(&root).await {
            Ok(()) => tracing::debug!("Removed previous staging directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(e).or_raise(|| ErrorKind::Staging(root)),
        }
        fs::create_dir_all(&root).await.or_raise(|| ErrorKind::Staging(root.clone()))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Where the staged file for `key` lives.
    pub fn path_for(&self, key: &RemoteKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{STAGING_SEPARATOR, derive_key};
    use std::ops::Deref;

    #[tokio::test]
    async fn test_init_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingDir::init(dir.path().join("output")).await.unwrap();
        assert!(staging.path().is_dir());
    }

    #[tokio::test]
    async fn test_init_wipes_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::create_dir_all(path.join("nested")).unwrap();
        std::fs::write(path.join("old.webp"), b"stale").unwrap();
        std::fs::write(path.join("nested/old.webp"), b"stale").unwrap();
        let staging = StagingDir::init(&path).await.unwrap();
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_init_fails_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, b"not a directory").unwrap();
        let err = StagingDir::init(&path).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Staging(_)));
    }

    #[tokio::test]
    async fn test_path_for_is_flat() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingDir::init(dir.path()).await.unwrap();
        let key = derive_key(Path::new("/srv/images/a/b/photo.png"), Path::new("/srv/images"), STAGING_SEPARATOR).unwrap();
        assert_eq!(staging.path_for(&key), dir.path().join("a:b:photo.webp"));
    }
}
