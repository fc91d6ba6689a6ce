//! Compression service trait.
//!
//! The service is a black box that accepts image bytes and hands back a
//! [`Handle`] to the (remote) result. Conversions are recorded on the handle
//! and only materialize when the result is fetched, so a shrink followed by a
//! conversion costs one upload of the source image.

use crate::ImageFormat;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::Path;

/// Reference to a compressed image held by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    location: String,
    conversion: Option<ImageFormat>,
}
impl Handle {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            conversion: None,
        }
    }

    /// Where the service keeps the result.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Target format requested via [`CompressionService::convert`], if any.
    pub fn conversion(&self) -> Option<ImageFormat> {
        self.conversion
    }

    pub fn converted_to(mut self, format: ImageFormat) -> Self {
        self.conversion = Some(format);
        self
    }
}

/// Unified interface for image compression services.
///
/// Implementations are expected to be rate limited by the service itself;
/// callers are responsible for pacing requests (see the pipeline's throttle).
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use imgsync_compress::{CompressionService, ImageFormat, error::Result};
///
/// async fn shrink_to_webp(service: &dyn CompressionService, source: &Path, target: &Path) -> Result<u64> {
///     let data = tokio::fs::read(source).await.unwrap();
///     let handle = service.submit(data).await?;
///     let handle = service.convert(handle, ImageFormat::Webp).await?;
///     service.write_to_file(&handle, target).await
/// }
/// ```
#[async_trait]
pub trait CompressionService: Send + Sync {
    /// Name of the service (used for logging only).
    fn name(&self) -> &str;

    /// Upload image bytes for compression.
    async fn submit(&self, data: Vec<u8>) -> Result<Handle>;

    /// Request a format conversion of an already-submitted image.
    ///
    /// The default implementation records the conversion on the handle so
    /// it is applied when the result is fetched. Only formats the service can
    /// produce are accepted.
    async fn convert(&self, handle: Handle, format: ImageFormat) -> Result<Handle> {
        if !format.is_compressible() {
            exn::bail!(ErrorKind::UnsupportedFormat(format.to_string()));
        }
        Ok(handle.converted_to(format))
    }

    /// Download the result bytes, applying any requested conversion.
    async fn fetch(&self, handle: &Handle) -> Result<Vec<u8>>;

    /// Download the result straight into a local file, overwriting it.
    ///
    /// Returns the number of bytes written.
    async fn write_to_file(&self, handle: &Handle, path: &Path) -> Result<u64> {
        let data = self.fetch(handle).await?;
        tokio::fs::write(path, &data).await.or_raise(|| ErrorKind::Io)?;
        Ok(data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_conversion() {
        let handle = Handle::new("https://example.com/output/abc");
        assert_eq!(handle.location(), "https://example.com/output/abc");
        assert_eq!(handle.conversion(), None);
        let handle = handle.converted_to(ImageFormat::Webp);
        assert_eq!(handle.conversion(), Some(ImageFormat::Webp));
    }
}
