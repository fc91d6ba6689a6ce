use crate::ImageFormat;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for ImageFormat {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl ImageFormat {
    /// Returns the canonical file extension for this format, including the
    /// leading dot.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::Png => ".png",
            ImageFormat::Webp => ".webp",
            ImageFormat::Gif => ".gif",
            ImageFormat::Svg => ".svg",
        }
    }

    /// Returns the short name (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
            ImageFormat::Svg => "svg",
        }
    }

    /// MIME type, used both as the upload content type and when asking the
    /// compression service for a conversion.
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Svg => "image/svg+xml",
        }
    }

    /// Whether the compression service accepts this format.
    ///
    /// Vector and animated formats are passed through untouched.
    #[inline]
    #[must_use]
    pub fn is_compressible(&self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Webp)
    }

    /// Verify that `bytes` start with the expected magic bytes for this format.
    ///
    /// Returns `true` for SVG unconditionally, since it's plain XML.
    #[must_use]
    pub fn check_magic_bytes(&self, bytes: &[u8]) -> bool {
        if matches!(self, ImageFormat::Svg) {
            return true;
        }
        Self::from_magic_bytes(bytes) == Some(*self)
    }
}
