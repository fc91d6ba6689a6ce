//! Discovering image files underneath the images folder.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, TryStreamExt};
use imgsync_compress::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// An image found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path as discovered (the scan root joined with `relative`).
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative: PathBuf,
    pub format: ImageFormat,
}

/// Canonical paths of the directories between the scan root and an entry.
type Ancestors = Arc<Vec<PathBuf>>;

enum Entry {
    File(PathBuf, ImageFormat),
    Dir(PathBuf, Ancestors),
}

/// Read one directory, returning its interesting entries sorted by name.
///
/// Symlinks are resolved: a link to a directory is walked like a directory,
/// a link to an image like an image. Broken links are skipped.
async fn read_sorted(dir: &Path, ancestors: &Ancestors) -> Result<Vec<Entry>> {
    let mut entries = fs::read_dir(dir).await.or_raise(|| ErrorKind::Scan(dir.to_path_buf()))?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Scan(dir.to_path_buf()))? {
        let path = entry.path();
        let mut file_type = entry.file_type().await.or_raise(|| ErrorKind::Scan(path.clone()))?;
        if file_type.is_symlink() {
            match fs::metadata(&path).await {
                Ok(metadata) => file_type = metadata.file_type(),
                Err(_) => {
                    tracing::debug!(path = %path.display(), "Skipping broken symlink");
                    continue;
                },
            }
        }
        if file_type.is_dir() {
            found.push((entry.file_name(), Entry::Dir(path, ancestors.clone())));
            continue;
        }
        let Some(format) = ImageFormat::from_path(&path) else {
            continue;
        };
        if file_type.is_file() {
            found.push((entry.file_name(), Entry::File(path, format)));
        } else {
            tracing::debug!(path = %path.display(), "Skipping image path that isn't a regular file");
        }
    }
    found.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(found.into_iter().map(|(_, entry)| entry).collect())
}

/// Stream every known image underneath `root`.
///
/// Depth-first, pre-order: entries of each directory are visited in name
/// order, and a subdirectory is walked completely before its next sibling.
/// Symlinked directories are followed unless they lead back into one of
/// their own ancestors. Any directory that can't be read ends the stream
/// with a [`Scan`](ErrorKind::Scan) error.
pub fn scan_stream(root: &Path) -> impl Stream<Item = Result<LocalFile>> + '_ {
    walk(root, None)
}

/// Like [`scan_stream`], but never descends into `excluded` (typically the
/// staging directory when it lives inside the images folder).
pub fn scan_stream_excluding<'a>(root: &'a Path, excluded: &'a Path) -> impl Stream<Item = Result<LocalFile>> + 'a {
    walk(root, Some(excluded))
}

fn walk<'a>(root: &'a Path, excluded: Option<&'a Path>) -> impl Stream<Item = Result<LocalFile>> + 'a {
    stream! {
        match fs::metadata(root).await {
            Ok(metadata) if metadata.is_dir() => {},
            Ok(_) => {
                yield Err(exn::Exn::from(ErrorKind::Scan(root.to_path_buf())));
                return;
            },
            Err(e) => {
                yield Err(e).or_raise(|| ErrorKind::Scan(root.to_path_buf()));
                return;
            },
        }
        // Doesn't exist yet means there's nothing to skip.
        let excluded = match excluded {
            Some(excluded) => fs::canonicalize(excluded).await.ok(),
            None => None,
        };

        let mut stack = vec![Entry::Dir(root.to_path_buf(), Arc::new(Vec::new()))];
        while let Some(entry) = stack.pop() {
            match entry {
                Entry::File(path, format) => {
                    let relative = match path.strip_prefix(root) {
                        Ok(relative) => relative.to_path_buf(),
                        Err(e) => {
                            yield Err(e).or_raise(|| ErrorKind::Scan(path.clone()));
                            return;
                        },
                    };
                    yield Ok(LocalFile { path, relative, format });
                },
                Entry::Dir(dir, ancestors) => {
                    let canonical = match fs::canonicalize(&dir).await {
                        Ok(canonical) => canonical,
                        Err(e) => {
                            yield Err(e).or_raise(|| ErrorKind::Scan(dir.clone()));
                            return;
                        },
                    };
                    if !ancestors.is_empty() && excluded.as_ref() == Some(&canonical) {
                        tracing::debug!(path = %dir.display(), "Skipping staging directory");
                        continue;
                    }
                    if ancestors.contains(&canonical) {
                        tracing::warn!(path = %dir.display(), target = %canonical.display(), "Skipping symlink cycle");
                        continue;
                    }
                    let mut chain = Vec::clone(&ancestors);
                    chain.push(canonical);
                    match read_sorted(&dir, &Arc::new(chain)).await {
                        // Reversed so the first entry is popped first.
                        Ok(entries) => stack.extend(entries.into_iter().rev()),
                        Err(e) => {
                            yield Err(e);
                            return;
                        },
                    }
                },
            }
        }
    }
}

/// Collect every known image underneath `root`, in [`scan_stream`] order.
#[tracing::instrument(skip_all, fields(root = %root.display()))]
pub async fn scan(root: &Path) -> Result<Vec<LocalFile>> {
    let files: Vec<LocalFile> = scan_stream(root).try_collect().await?;
    tracing::debug!(count = files.len(), "Scan complete");
    Ok(files)
}

/// Collect every known image underneath `root` except those inside
/// `excluded`, in [`scan_stream`] order.
#[tracing::instrument(skip_all, fields(root = %root.display(), excluded = %excluded.display()))]
pub async fn scan_excluding(root: &Path, excluded: &Path) -> Result<Vec<LocalFile>> {
    let files: Vec<LocalFile> = scan_stream_excluding(root, excluded).try_collect().await?;
    tracing::debug!(count = files.len(), "Scan complete");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"data").unwrap();
    }

    fn relatives(files: &[LocalFile]) -> Vec<String> {
        files.iter().map(|f| f.relative.to_string_lossy().into_owned()).collect()
    }

    #[tokio::test]
    async fn test_known_images_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.JPG", "c.jpeg", "d.webp", "e.svg", "f.gif", "notes.txt", "README", "g.bmp"] {
            touch(dir.path(), name);
        }
        let files = scan(dir.path()).await.unwrap();
        assert_eq!(relatives(&files), vec!["a.png", "b.JPG", "c.jpeg", "d.webp", "e.svg", "f.gif"]);
        assert_eq!(files[1].format, ImageFormat::Jpeg);
        assert_eq!(files[4].format, ImageFormat::Svg);
        assert_eq!(files[0].path, dir.path().join("a.png"));
    }

    #[tokio::test]
    async fn test_depth_first_pre_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a/z.png");
        touch(dir.path(), "a/b/c.png");
        touch(dir.path(), "c/d.png");
        touch(dir.path(), "0.png");
        let files = scan(dir.path()).await.unwrap();
        assert_eq!(relatives(&files), vec!["0.png", "a/b/c.png", "a/z.png", "b.png", "c/d.png"]);
    }

    #[tokio::test]
    async fn test_empty_and_image_named_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::create_dir_all(dir.path().join("folder.png")).unwrap();
        touch(dir.path(), "folder.png/inner.gif");
        let files = scan(dir.path()).await.unwrap();
        assert_eq!(relatives(&files), vec!["folder.png/inner.gif"]);
    }

    #[tokio::test]
    async fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Scan(_)));
    }

    #[tokio::test]
    async fn test_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "photo.png");
        let err = scan(&dir.path().join("photo.png")).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Scan(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "real/photo.png");
        std::os::unix::fs::symlink(dir.path().join("real/photo.png"), dir.path().join("link.png")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("linked-dir")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.png"), dir.path().join("broken.png")).unwrap();
        let files = scan(dir.path()).await.unwrap();
        assert_eq!(relatives(&files), vec!["link.png", "linked-dir/photo.png", "real/photo.png"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_cycles_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/photo.png");
        touch(dir.path(), "b/icon.svg");
        std::os::unix::fs::symlink(dir.path().join("b"), dir.path().join("a/to-b")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("b/to-a")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("a/to-root")).unwrap();
        let files = scan(dir.path()).await.unwrap();
        assert_eq!(
            relatives(&files),
            vec!["a/photo.png", "a/to-b/icon.svg", "b/icon.svg", "b/to-a/photo.png"]
        );
    }

    #[tokio::test]
    async fn test_excluded_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "photo.png");
        touch(dir.path(), "output/photo.webp");
        touch(dir.path(), "sub/output/kept.png");
        let files = scan_excluding(dir.path(), &dir.path().join("output")).await.unwrap();
        assert_eq!(relatives(&files), vec!["photo.png", "sub/output/kept.png"]);
    }

    #[tokio::test]
    async fn test_missing_excluded_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "photo.png");
        let files = scan_excluding(dir.path(), &dir.path().join("output")).await.unwrap();
        assert_eq!(relatives(&files), vec!["photo.png"]);
    }
}
