//! Compression Service Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A compression service error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The API key was rejected. Fix the configuration.
    #[display("compression service rejected the credentials")]
    Unauthorized,
    /// The account's compression quota (or request rate) was exceeded.
    #[display("compression service quota exceeded")]
    QuotaExceeded,
    /// The service could not process the image. Don't retry with the same input.
    #[display("compression service rejected the image: {_0}")]
    InvalidImage(#[error(not(source))] String),
    /// The service returned something we didn't expect.
    #[display("unexpected compression service response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// The requested format is not supported.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The service is having a bad day.
    #[display("compression service error: {_0}")]
    Server(#[error(not(source))] String),
    /// The request never made it to the service (or the response never made
    /// it back).
    #[display("network error")]
    Network,
    /// Reading or writing local files failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Server(_) | ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::QuotaExceeded.to_string(), "compression service quota exceeded");
        assert_eq!(ErrorKind::UnsupportedFormat("tiff".to_string()).to_string(), "unsupported format: tiff");
        assert_eq!(ErrorKind::Io.to_string(), "I/O error");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::InvalidImage("corrupt".to_string()).is_retryable());
        assert!(ErrorKind::Server("502".to_string()).is_retryable());
        assert!(ErrorKind::Network.is_retryable());
    }

    #[test]
    fn error_from_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        let err: Result<()> = result.or_raise(|| ErrorKind::Io);
        let exn = err.unwrap_err();
        assert_eq!(*exn, ErrorKind::Io);
    }
}
