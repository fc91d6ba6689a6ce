//! Key validation and content type utilities.
//!
//! This module provides functions to validate object keys and prevent
//! security issues like path traversal when keys are mapped onto a local
//! directory.

use crate::error::{ErrorKind, Result};
use imgsync_compress::ImageFormat;
use std::path::Path;

/// Content type used for anything that isn't a known image.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Validates an object key for security and correctness.
/// Ensures that keys don't escape the store root (no `..` traversal).
///
/// Keys are always `/`-separated, regardless of platform. Empty segments and
/// `.` segments are dropped. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized key if valid, or [`InvalidKey`](crate::error::ErrorKind::InvalidKey)
/// if invalid.
///
/// # Examples
///
/// ```
/// use imgsync_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("gallery/photo.webp").is_ok());
/// assert!(validate_key("a/b/c/icon.svg").is_ok());
/// assert!(validate_key("a/../photo.webp").is_ok()); // (never leaves store root)
/// // Invalid keys
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a/../../b").is_err());
/// assert!(validate_key("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(
///     validate_key("wrong/../still-wrong/.././correct//./photo.webp/").unwrap(),
///     "correct/photo.webp"
/// );
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            s if s.contains('\0') => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(segments.join("/")),
    }
}

/// Content type for an object, inferred from the local file's extension.
///
/// # Examples
///
/// ```
/// use imgsync_storage::content_type;
/// assert_eq!(content_type("output/photo.webp"), "image/webp");
/// assert_eq!(content_type("icons/logo.SVG"), "image/svg+xml");
/// assert_eq!(content_type("notes.txt"), "application/octet-stream");
/// ```
pub fn content_type(path: impl AsRef<Path>) -> &'static str {
    ImageFormat::from_path(path).map(|f| f.mime_type()).unwrap_or(FALLBACK_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_valid_keys() {
        assert_eq!(validate("gallery/photo.webp").unwrap(), "gallery/photo.webp");
        assert_eq!(validate("a/b/c/icon.svg").unwrap(), "a/b/c/icon.svg");
        assert_eq!(validate("simple.webp").unwrap(), "simple.webp");
    }

    #[test]
    fn test_key_normalization() {
        // Double slashes are normalized
        assert_eq!(validate("a//b//c").unwrap(), "a/b/c");
        // Current directory references removed
        assert_eq!(validate("a/./b/./c").unwrap(), "a/b/c");
        // Leading slashes are stripped
        assert_eq!(validate("/a/b").unwrap(), "a/b");
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
        assert!(validate("../..").is_err());
    }

    #[test]
    fn test_reverse_attempts() {
        // Traversal remains within store root
        assert_eq!(validate("a/b/..").unwrap(), "a");
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate("a\0b").is_err());
        assert!(validate("\0").is_err());
    }

    #[test]
    fn test_empty_keys() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("./").is_err());
        assert!(validate("./.").is_err());
        assert!(validate("//").is_err());
    }

    #[test]
    fn test_trailing_slashes() {
        assert_eq!(validate("gallery/").unwrap(), "gallery");
        assert_eq!(validate("a/b/c/").unwrap(), "a/b/c");
        assert_eq!(validate("gallery///").unwrap(), "gallery");
    }

    #[rstest]
    #[case("photo.webp", "image/webp")]
    #[case("photo.PNG", "image/png")]
    #[case("photo.jpeg", "image/jpeg")]
    #[case("anim.gif", "image/gif")]
    #[case("icon.svg", "image/svg+xml")]
    #[case("README", "application/octet-stream")]
    fn test_content_type(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(content_type(path), expected);
    }
}
