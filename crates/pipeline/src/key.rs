//! Mapping local file paths onto remote object keys.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use imgsync_compress::{ImageFormat, TARGET_FORMAT};
use std::borrow::Borrow;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

/// Joins folders in object store keys.
pub const REMOTE_SEPARATOR: &str = "/";
/// Joins folders in staging filenames, keeping the staging directory flat.
pub const STAGING_SEPARATOR: &str = ":";

/// Canonical key of an image in the object store.
///
/// Folder names relative to the scan root, then the file's base name, then
/// the extension it's stored under: `.webp` for anything compressible,
/// otherwise the original extension in lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteKey(String);

impl RemoteKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for RemoteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RemoteKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RemoteKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Extension a file is stored under.
fn suffix(path: &Path) -> String {
    match ImageFormat::from_path(path) {
        Some(format) if format.is_compressible() => TARGET_FORMAT.extension().to_string(),
        _ => path.extension().and_then(OsStr::to_str).map(|ext| format!(".{}", ext.to_lowercase())).unwrap_or_default(),
    }
}

/// Derive the key for `path`, a file somewhere underneath `root`.
///
/// Walks up from the file's parent until it reaches `root`, collecting each
/// folder name on the way, then joins them top-down with `separator`. A file
/// directly inside `root` has no folder part and no leading separator.
///
/// # Errors
///
/// [`InvalidPath`](ErrorKind::InvalidPath) if `path` isn't underneath
/// `root`, or any component on the way isn't valid UTF-8.
///
/// # Examples
///
/// ```
/// use imgsync_pipeline::{REMOTE_SEPARATOR, STAGING_SEPARATOR, derive_key};
/// use std::path::Path;
///
/// let root = Path::new("/srv/images");
/// let key = derive_key(Path::new("/srv/images/blog/2024/cover.JPG"), root, REMOTE_SEPARATOR).unwrap();
/// assert_eq!(key.as_str(), "blog/2024/cover.webp");
/// let key = derive_key(Path::new("/srv/images/blog/2024/cover.JPG"), root, STAGING_SEPARATOR).unwrap();
/// assert_eq!(key.as_str(), "blog:2024:cover.webp");
/// let key = derive_key(Path::new("/srv/images/logo.svg"), root, REMOTE_SEPARATOR).unwrap();
/// assert_eq!(key.as_str(), "logo.svg");
/// ```
pub fn derive_key(path: &Path, root: &Path, separator: &str) -> Result<RemoteKey> {
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let stem = path.file_stem().and_then(OsStr::to_str).ok_or_raise(invalid)?;

    let mut folders = Vec::new();
    let mut current = path.parent().ok_or_raise(invalid)?;
    while current != root {
        folders.push(current.file_name().and_then(OsStr::to_str).ok_or_raise(invalid)?);
        current = current.parent().ok_or_raise(invalid)?;
    }
    folders.reverse();

    let mut key = String::new();
    for folder in folders {
        key.push_str(folder);
        key.push_str(separator);
    }
    key.push_str(stem);
    key.push_str(&suffix(path));
    Ok(RemoteKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ops::Deref;

    const ROOT: &str = "/srv/images";

    #[rstest]
    #[case("/srv/images/photo.png", "photo.webp")]
    #[case("/srv/images/photo.jpg", "photo.webp")]
    #[case("/srv/images/photo.JPEG", "photo.webp")]
    #[case("/srv/images/photo.webp", "photo.webp")]
    #[case("/srv/images/icon.svg", "icon.svg")]
    #[case("/srv/images/anim.GIF", "anim.gif")]
    #[case("/srv/images/sub/img.jpg", "sub/img.webp")]
    #[case("/srv/images/a/b/c/deep.png", "a/b/c/deep.webp")]
    #[case("/srv/images/archive.tar.png", "archive.tar.webp")]
    fn test_remote_keys(#[case] path: &str, #[case] expected: &str) {
        let key = derive_key(Path::new(path), Path::new(ROOT), REMOTE_SEPARATOR).unwrap();
        assert_eq!(key.as_str(), expected);
    }

    #[test]
    fn test_staging_keys_are_flat() {
        let key = derive_key(Path::new("/srv/images/a/b/photo.png"), Path::new(ROOT), STAGING_SEPARATOR).unwrap();
        assert_eq!(key.as_str(), "a:b:photo.webp");
        let key = derive_key(Path::new("/srv/images/photo.png"), Path::new(ROOT), STAGING_SEPARATOR).unwrap();
        assert_eq!(key.as_str(), "photo.webp");
    }

    #[test]
    fn test_siblings_share_key() {
        let root = Path::new(ROOT);
        let jpg = derive_key(Path::new("/srv/images/sub/img.jpg"), root, REMOTE_SEPARATOR).unwrap();
        let png = derive_key(Path::new("/srv/images/sub/img.png"), root, REMOTE_SEPARATOR).unwrap();
        assert_eq!(jpg, png);
    }

    #[test]
    fn test_root_with_trailing_slash() {
        let key = derive_key(Path::new("/srv/images/sub/img.jpg"), Path::new("/srv/images/"), REMOTE_SEPARATOR).unwrap();
        assert_eq!(key.as_str(), "sub/img.webp");
    }

    #[test]
    fn test_relative_root() {
        let key = derive_key(Path::new("images/sub/img.jpg"), Path::new("images"), REMOTE_SEPARATOR).unwrap();
        assert_eq!(key.as_str(), "sub/img.webp");
    }

    #[rstest]
    #[case("/elsewhere/photo.png")]
    #[case("/srv/photo.png")]
    #[case("photo.png")]
    #[case("/")]
    fn test_outside_root(#[case] path: &str) {
        let err = derive_key(Path::new(path), Path::new(ROOT), REMOTE_SEPARATOR).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_borrow_as_str() {
        let key = derive_key(Path::new("/srv/images/photo.png"), Path::new(ROOT), REMOTE_SEPARATOR).unwrap();
        let set: std::collections::HashSet<RemoteKey> = [key].into();
        assert!(set.contains("photo.webp"));
    }
}
