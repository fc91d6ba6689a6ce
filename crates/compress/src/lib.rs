//! Image formats and the external image compression service.
//!
//! This crate wraps the handful of image formats the pipeline cares about
//! behind a unified [`ImageFormat`] enum, providing:
//!
//! - **Format detection** from file extensions ([`ImageFormat::from_path`]) or
//!   magic bytes ([`ImageFormat::from_magic_bytes`])
//! - **Eligibility** for recompression ([`ImageFormat::is_compressible`]) and
//!   the MIME type used when uploading ([`ImageFormat::mime_type`])
//! - **The compression service** seam ([`CompressionService`]), with a
//!   Tinify-backed client behind the `tinify` feature and an in-memory fake
//!   behind the `mock` feature.

mod construct;
pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod service;
#[cfg(feature = "tinify")]
mod tinify;
mod util;

#[cfg(feature = "mock")]
pub use crate::mock::MockService;
pub use crate::service::{CompressionService, Handle};
#[cfg(feature = "tinify")]
pub use crate::tinify::TinifyClient;
use std::sync::Arc;

pub type ServiceHandle = Arc<dyn CompressionService + Send + Sync>;

/// The format every compressible image is converted into.
pub const TARGET_FORMAT: ImageFormat = ImageFormat::Webp;

/// A known image format.
///
/// Anything that isn't one of these is not an image as far as the pipeline
/// is concerned, so detection returns [`Option<ImageFormat>`] rather than
/// falling back to a catch-all variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// JPEG (.jpg, .jpeg)
    Jpeg,
    /// PNG (.png)
    Png,
    /// WebP (.webp)
    Webp,
    /// GIF (.gif), possibly animated
    Gif,
    /// SVG (.svg), vector
    Svg,
}

#[cfg(test)]
mod tests {
    use crate::{ImageFormat, TARGET_FORMAT};

    #[test]
    fn target_is_compressible() {
        assert!(TARGET_FORMAT.is_compressible());
        assert_eq!(TARGET_FORMAT, ImageFormat::Webp);
    }
}
