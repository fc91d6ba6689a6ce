//! Error types for the [`convert`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A conversion error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which step of compressing a single file failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The original file could not be read.
    #[display("could not read `{}`", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// The compression service rejected or failed the request.
    #[display("compression service request failed")]
    Service,
    /// The service's output could not be written to the staging directory.
    #[display("could not stage output at `{}`", _0.display())]
    Stage(#[error(not(source))] PathBuf),
    /// The staged output isn't the format that was asked for.
    #[display("staged output at `{}` is not a valid {_1} image", _0.display())]
    Verify(#[error(not(source))] PathBuf, #[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Service)
    }
}
