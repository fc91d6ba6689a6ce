//! In-memory compression service for testing.

use crate::error::{ErrorKind, Result};
use crate::{CompressionService, Handle, ImageFormat};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory compression service for testing.
///
/// Submitted images are kept in a `HashMap` behind a [`RwLock`] and handed
/// back untouched on fetch, unless a conversion was requested, in which case
/// the payload is re-wrapped in the target format's magic bytes (see
/// [`MockService::fake_image`]). Every call is counted so tests can assert on
/// how often the service was hit.
///
/// # Examples
///
/// ```
/// use imgsync_compress::{CompressionService, ImageFormat, MockService};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = MockService::default();
/// let handle = service.submit(MockService::fake_image(ImageFormat::Png, b"pixels")).await?;
/// let handle = service.convert(handle, ImageFormat::Webp).await?;
/// let data = service.fetch(&handle).await?;
/// assert!(ImageFormat::Webp.check_magic_bytes(&data));
/// assert_eq!(service.submissions(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockService {
    name: String,
    results: RwLock<HashMap<String, Vec<u8>>>,
    rejected: Vec<Vec<u8>>,
    submissions: AtomicUsize,
    conversions: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockService {
    /// Reject any submission whose bytes exactly match `data`, as the real
    /// service does with a corrupt image.
    pub fn rejecting(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.rejected.push(data.into());
        self
    }

    /// Change the name of the mock service.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build bytes that pass [`ImageFormat::check_magic_bytes`] for `format`.
    pub fn fake_image(format: ImageFormat, payload: &[u8]) -> Vec<u8> {
        let mut data = match format {
            ImageFormat::Jpeg => vec![0xFF, 0xD8, 0xFF, 0xE0],
            ImageFormat::Png => vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
            ImageFormat::Webp => {
                let size = u32::try_from(payload.len() + 4).unwrap_or(u32::MAX);
                let mut header = b"RIFF".to_vec();
                header.extend_from_slice(&size.to_le_bytes());
                header.extend_from_slice(b"WEBP");
                header
            },
            ImageFormat::Gif => b"GIF89a".to_vec(),
            ImageFormat::Svg => Vec::new(),
        };
        data.extend_from_slice(payload);
        data
    }

    /// Number of [`submit`](CompressionService::submit) calls, including rejected ones.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of [`convert`](CompressionService::convert) calls.
    pub fn conversions(&self) -> usize {
        self.conversions.load(Ordering::SeqCst)
    }

    /// Number of [`fetch`](CompressionService::fetch) calls.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn strip_magic(data: &[u8]) -> &[u8] {
        match ImageFormat::from_magic_bytes(data) {
            Some(ImageFormat::Jpeg) => &data[4.min(data.len())..],
            Some(ImageFormat::Png) => &data[8..],
            Some(ImageFormat::Webp) => &data[12..],
            Some(ImageFormat::Gif) => &data[6..],
            Some(ImageFormat::Svg) | None => data,
        }
    }
}
impl Default for MockService {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            results: RwLock::new(HashMap::new()),
            rejected: Vec::new(),
            submissions: AtomicUsize::new(0),
            conversions: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompressionService for MockService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, data: Vec<u8>) -> Result<Handle> {
        let id = self.submissions.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(&data) {
            exn::bail!(ErrorKind::InvalidImage("file type is not supported".to_string()));
        }
        let location = format!("mock://output/{id}");
        self.results.write().await.insert(location.clone(), data);
        Ok(Handle::new(location))
    }

    async fn convert(&self, handle: Handle, format: ImageFormat) -> Result<Handle> {
        self.conversions.fetch_add(1, Ordering::SeqCst);
        if !format.is_compressible() {
            exn::bail!(ErrorKind::UnsupportedFormat(format.to_string()));
        }
        Ok(handle.converted_to(format))
    }

    async fn fetch(&self, handle: &Handle) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let guard = self.results.read().await;
        let Some(data) = guard.get(handle.location()) else {
            exn::bail!(ErrorKind::InvalidResponse(format!("unknown output {}", handle.location())));
        };
        Ok(match handle.conversion() {
            Some(format) => Self::fake_image(format, Self::strip_magic(data)),
            None => data.clone(),
        })
    }
}
