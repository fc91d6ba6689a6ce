//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! Objects are stored as files in a configured directory, with `/`-separated
//! keys mapped onto subdirectories, and accessed via `tokio::fs` for async I/O.

use crate::backend::ObjectInfoStream;
use crate::error::ErrorKind;
use crate::{ObjectInfo, StorageBackend, error::Result, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    Object(ObjectInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// Stores objects in a directory on the local filesystem. All keys are
/// relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use imgsync_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("mirror", "/srv/www/static/img")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory objects are stored under
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::BackendError(format!("store root `{}` must be absolute", root.display())));
        }

        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::BackendError(format!("store root `{}` is not a directory", root.display())));
            }
        } else {
            // Constructor runs once per process, not worth making it async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for an object key.
    ///
    /// Validates the key and joins it with the root directory.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let validated = validate_key(key)?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to an object key.
    fn relative_key(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!(
                "path `{}` is not within root `{}`",
                absolute.display(),
                self.root.display()
            ))
        })?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str().ok_or_else(|| {
                    exn::Exn::from(ErrorKind::InvalidKey(relative.to_string_lossy().into_owned()))
                })?),
                _ => exn::bail!(ErrorKind::InvalidKey(relative.to_string_lossy().into_owned())),
            }
        }
        validate_key(segments.join("/"))
    }

    fn object_info(key: String, metadata: &Metadata) -> ObjectInfo {
        let info = ObjectInfo::new(key, metadata.len());
        match metadata.modified() {
            Ok(modified) => info.with_modified(modified),
            Err(_) => info,
        }
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Segment-wise prefix match: `gallery` matches `gallery` and
    /// `gallery/a.webp` but not `gallery-old/a.webp`.
    fn under_prefix(key: &str, prefix: &str) -> bool {
        key.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Keep the walk loop free of error plumbing: everything that can fail
    /// for a single entry happens here.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&str>) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        let key = self.relative_key(&path)?;
        if metadata.is_dir() {
            // Descend into anything on the way to (or underneath) the prefix.
            let wanted = prefix.is_none_or(|p| Self::under_prefix(&key, p) || Self::under_prefix(p, &key));
            return Ok(if wanted { WalkEntry::Descend(path) } else { WalkEntry::Skip });
        }
        if let Some(p) = prefix
            && !Self::under_prefix(&key, p)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_file() {
            return Ok(WalkEntry::Object(Self::object_info(key, &metadata)));
        }
        // Most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_key).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Same as S3: listing something that isn't there is empty, not an error.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => {
                            yield Err(exn::Exn::from(Self::map_io_error(e, &current)));
                            continue 'dirs;
                        },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::Object(info)) => yield Ok(info),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let abs_path = self.absolute_path(key)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        // Keys imply their directories, same as an object store.
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, &abs_path))?;
        tracing::debug!(backend = %self.name, key, path = %abs_path.display(), "Stored object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    fn keys(mut objects: Vec<ObjectInfo>) -> Vec<String> {
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        objects.into_iter().map(|o| o.key).collect()
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/store");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"data").unwrap();
        assert!(LocalBackend::new("name", &file).is_err());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("gallery/photo.webp");
        assert_eq!(backend.absolute_path("gallery/photo.webp").unwrap(), expected);
        assert!(backend.absolute_path("../etc/passwd").is_err());
    }

    #[test]
    fn test_relative_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let abs = temp_dir.path().join("gallery").join("photo.webp");
        assert_eq!(backend.relative_key(&abs).unwrap(), "gallery/photo.webp");
        assert!(backend.relative_key(Path::new("/other/photo.webp")).is_err());
    }

    #[test]
    fn test_under_prefix() {
        assert!(LocalBackend::under_prefix("gallery", "gallery"));
        assert!(LocalBackend::under_prefix("gallery/a.webp", "gallery"));
        assert!(!LocalBackend::under_prefix("gallery-old/a.webp", "gallery"));
        assert!(!LocalBackend::under_prefix("gal", "gallery"));
    }

    #[tokio::test]
    async fn test_put_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.put("a/b/c/photo.webp", b"data".to_vec(), "image/webp").await.unwrap();
        assert!(backend.exists("a/b/c/photo.webp").await.unwrap());
        assert_eq!(std::fs::read(temp_dir.path().join("a/b/c/photo.webp")).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.put("photo.webp", b"old".to_vec(), "image/webp").await.unwrap();
        backend.put("photo.webp", b"new".to_vec(), "image/webp").await.unwrap();
        assert_eq!(std::fs::read(temp_dir.path().join("photo.webp")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(!backend.exists("missing.webp").await.unwrap());
        backend.put("present.webp", b"data".to_vec(), "image/webp").await.unwrap();
        assert!(backend.exists("present.webp").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_returns_nested_objects() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.put("photo.webp", b"12345".to_vec(), "image/webp").await.unwrap();
        backend.put("sub/img.webp", b"data".to_vec(), "image/webp").await.unwrap();
        backend.put("sub/deeper/icon.svg", b"<svg/>".to_vec(), "image/svg+xml").await.unwrap();
        let objects = backend.list(None).await.unwrap();
        let photo = objects.iter().find(|o| o.key == "photo.webp").unwrap();
        assert_eq!(photo.size, 5);
        assert!(photo.modified.is_some());
        assert_eq!(keys(objects), vec!["photo.webp", "sub/deeper/icon.svg", "sub/img.webp"]);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.put("gallery/Sub/a.webp", b"data".to_vec(), "image/webp").await.unwrap();
        backend.put("gallery/Subdir/b.webp", b"data".to_vec(), "image/webp").await.unwrap();
        backend.put("gallery/Subfile.webp", b"data".to_vec(), "image/webp").await.unwrap();
        let objects = backend.list(Some("gallery/Sub")).await.unwrap();
        assert_eq!(keys(objects), vec!["gallery/Sub/a.webp"]);
        let objects = backend.list(Some("gallery/")).await.unwrap();
        assert_eq!(objects.len(), 3);
    }

    #[tokio::test]
    async fn test_list_nonexistent_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.list(Some("nonexistent/")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.put("../escape.webp", b"data".to_vec(), "image/webp").await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::InvalidKey(_)));
        assert!(backend.exists("etc/../../passwd").await.is_err());
        assert!(backend.list(Some("../..")).await.is_err());
    }
}
