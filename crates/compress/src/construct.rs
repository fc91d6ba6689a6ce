use crate::ImageFormat;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF87_MAGIC: &[u8; 6] = b"GIF87a";
const GIF89_MAGIC: &[u8; 6] = b"GIF89a";
const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WEBP_MAGIC: &[u8; 4] = b"WEBP";

impl FromStr for ImageFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches('.') {
            "jpg" | "jpeg" | "image/jpeg" => Ok(ImageFormat::Jpeg),
            "png" | "image/png" => Ok(ImageFormat::Png),
            "webp" | "image/webp" => Ok(ImageFormat::Webp),
            "gif" | "image/gif" => Ok(ImageFormat::Gif),
            "svg" | "image/svg+xml" => Ok(ImageFormat::Svg),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}
impl ImageFormat {
    /// Detect the image format from a bare extension (without the leading
    /// dot), case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "gif" => Some(ImageFormat::Gif),
            "svg" => Some(ImageFormat::Svg),
            _ => None,
        }
    }

    /// Detect the image format from a file extension.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
    }

    /// Detect the image format from magic bytes.
    ///
    /// SVG is plain XML text and has no magic bytes, so it is never detected.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&JPEG_MAGIC) {
            return Some(ImageFormat::Jpeg);
        }
        if bytes.starts_with(&PNG_MAGIC) {
            return Some(ImageFormat::Png);
        }
        if bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC) {
            return Some(ImageFormat::Gif);
        }
        // RIFF container: "RIFF", 4 bytes of little-endian size, "WEBP".
        if bytes.len() >= 12 && bytes.starts_with(RIFF_MAGIC) && &bytes[8..12] == WEBP_MAGIC {
            return Some(ImageFormat::Webp);
        }
        None
    }
}
