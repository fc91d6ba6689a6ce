//! Compressing eligible images through the compression service.
//!
//! Compressible images (JPEG, PNG, WebP) are submitted to the service,
//! converted to [`TARGET_FORMAT`] unless they already are, and written into
//! the [`StagingDir`]. Everything else is passed through untouched, without
//! any network request.

pub mod error;

use crate::convert::error::{ErrorKind as ConvertErrorKind, Result as ConvertResult};
use crate::error::{ErrorKind, Result};
use crate::key::{REMOTE_SEPARATOR, RemoteKey, STAGING_SEPARATOR, derive_key};
use crate::scan::LocalFile;
use crate::staging::StagingDir;
use crate::throttle::ThrottleHandle;
use exn::{OptionExt, ResultExt};
use imgsync_compress::error::ErrorKind as CompressErrorKind;
use imgsync_compress::{ServiceHandle, TARGET_FORMAT};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Longest magic byte signature among the known formats (WebP's RIFF header).
const MAGIC_LEN: u64 = 12;

/// A file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Key to upload under.
    pub key: RemoteKey,
    /// The staged output for converted files, the original otherwise.
    pub path: PathBuf,
    /// Whether the compression service produced `path`.
    pub converted: bool,
}

/// Runs files through the compression service, one at a time.
pub struct Converter {
    service: Option<ServiceHandle>,
    throttle: ThrottleHandle,
    staging: StagingDir,
    root: PathBuf,
}

impl Converter {
    pub fn new(throttle: ThrottleHandle, staging: StagingDir, root: impl Into<PathBuf>) -> Self {
        Self {
            service: None,
            throttle,
            staging,
            root: root.into(),
        }
    }

    /// Without a service, only files that pass through can be processed.
    pub fn with_service(mut self, service: ServiceHandle) -> Self {
        self.service = Some(service);
        self
    }

    /// Prepare `file` for upload.
    ///
    /// # Errors
    ///
    /// - [`InvalidPath`](ErrorKind::InvalidPath) if no key can be derived
    /// - [`Convert`](ErrorKind::Convert) raised from the failing step
    ///   otherwise; only this file is affected
    #[tracing::instrument(skip_all, fields(path = %file.relative.display()))]
    pub async fn process(&self, file: &LocalFile) -> Result<Conversion> {
        let key = derive_key(&file.path, &self.root, REMOTE_SEPARATOR)?;
        if !file.format.is_compressible() {
            tracing::debug!(%key, format = %file.format, "Passing through without compression");
            return Ok(Conversion {
                key,
                path: file.path.clone(),
                converted: false,
            });
        }
        let staged_key = derive_key(&file.path, &self.root, STAGING_SEPARATOR)?;
        let target = self.staging.path_for(&staged_key);
        match self.compress(file, &target).await {
            Ok(()) => Ok(Conversion {
                key,
                path: target,
                converted: true,
            }),
            Err(e) => Err(e).or_raise(|| ErrorKind::Convert(key.into_string())),
        }
    }

    async fn compress(&self, file: &LocalFile, target: &Path) -> ConvertResult<()> {
        let service = self.service.as_ref().ok_or_raise(|| ConvertErrorKind::Service)?;
        self.throttle.wait().await;
        let data = tokio::fs::read(&file.path).await.or_raise(|| ConvertErrorKind::Read(file.path.clone()))?;
        let input_size = data.len();

        let handle = service.submit(data).await.or_raise(|| ConvertErrorKind::Service)?;
        let handle = match file.format == TARGET_FORMAT {
            true => handle,
            false => service.convert(handle, TARGET_FORMAT).await.or_raise(|| ConvertErrorKind::Service)?,
        };
        let output_size = match service.write_to_file(&handle, target).await {
            Ok(size) => size,
            Err(e) if matches!(e.deref(), CompressErrorKind::Io) => {
                return Err(e).or_raise(|| ConvertErrorKind::Stage(target.to_path_buf()));
            },
            Err(e) => return Err(e).or_raise(|| ConvertErrorKind::Service),
        };

        verify(target).await?;
        tracing::info!(
            service = service.name(),
            from = %file.format,
            to = %TARGET_FORMAT,
            input_size,
            output_size,
            staged = %target.display(),
            "Compressed"
        );
        Ok(())
    }
}

/// Check the staged output starts with the target format's magic bytes.
async fn verify(path: &Path) -> ConvertResult<()> {
    let stage_error = || ConvertErrorKind::Stage(path.to_path_buf());
    let file = File::open(path).await.or_raise(stage_error)?;
    let mut head = Vec::with_capacity(MAGIC_LEN as usize);
    file.take(MAGIC_LEN).read_to_end(&mut head).await.or_raise(stage_error)?;
    if !TARGET_FORMAT.check_magic_bytes(&head) {
        exn::bail!(ConvertErrorKind::Verify(path.to_path_buf(), TARGET_FORMAT.as_str()));
    }
    Ok(())
}
