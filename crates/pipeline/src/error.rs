//! Pipeline Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the storage and
//! compression crates are raised into one of these kinds, so the cause is
//! still available further down the tree.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a pipeline failure.
///
/// ### Fatal (end the run)
/// - [`ErrorKind::Scan`]
/// - [`ErrorKind::Inventory`]
/// - [`ErrorKind::Staging`]
/// - [`ErrorKind::NoService`]
///
/// ### Per file (the run carries on)
/// - [`ErrorKind::InvalidPath`]
/// - [`ErrorKind::Convert`]
/// - [`ErrorKind::Upload`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The images folder could not be walked.
    #[display("could not scan `{}`", _0.display())]
    Scan(#[error(not(source))] PathBuf),
    /// A file path can't be turned into a remote key (outside the scan root,
    /// or not valid UTF-8).
    #[display("cannot derive a key for `{}`", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Compressing or converting the file through the service failed.
    #[display("conversion failed for `{_0}`")]
    Convert(#[error(not(source))] String),
    /// Putting the processed file into the store failed.
    #[display("upload failed for `{_0}`")]
    Upload(#[error(not(source))] String),
    /// Listing the store's existing keys failed.
    #[display("could not fetch the store inventory")]
    Inventory,
    /// The staging directory could not be reset.
    #[display("could not prepare staging directory `{}`", _0.display())]
    Staging(#[error(not(source))] PathBuf),
    /// Some images need compressing but no compression service is configured.
    #[display("{_0} image(s) need compressing but no compression service is configured")]
    NoService(#[error(not(source))] usize),
}

impl ErrorKind {
    /// Returns `true` if the failure only affects a single file.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::InvalidPath(_) | Self::Convert(_) | Self::Upload(_))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Convert(_) | Self::Upload(_) | Self::Inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_kinds() {
        assert!(ErrorKind::Convert("photo.webp".to_string()).is_per_file());
        assert!(ErrorKind::InvalidPath(PathBuf::from("/elsewhere/a.png")).is_per_file());
        assert!(!ErrorKind::Inventory.is_per_file());
        assert!(!ErrorKind::Scan(PathBuf::from("/srv/images")).is_per_file());
        assert!(!ErrorKind::NoService(3).is_per_file());
    }

    #[test]
    fn display() {
        assert_eq!(ErrorKind::Upload("sub/img.webp".to_string()).to_string(), "upload failed for `sub/img.webp`");
        assert_eq!(ErrorKind::Staging(PathBuf::from("output")).to_string(), "could not prepare staging directory `output`");
    }
}
