//! The whole run: scan, deduplicate, convert and upload.
//!
//! The primary entry point is [`sync`], which streams [`SyncEvent`]s as it
//! works through the images folder one file at a time.

mod report;

pub use self::report::Report;
use crate::convert::{Conversion, Converter};
use crate::dedup::filter_existing;
use crate::error::{ErrorKind, Result};
use crate::inventory::Inventory;
use crate::scan::{LocalFile, scan_excluding};
use crate::staging::StagingDir;
use crate::throttle::{FixedDelay, ThrottleHandle};
use crate::upload::upload;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use imgsync_compress::ServiceHandle;
use imgsync_storage::BackendHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a run needs.
pub struct Context {
    pub root: PathBuf,
    pub staging_dir: PathBuf,
    pub backend: BackendHandle,
    /// Only needed when something is left to compress.
    pub service: Option<ServiceHandle>,
    pub throttle: ThrottleHandle,
    /// Ask the store again right before each upload, instead of trusting the
    /// inventory fetched at the start.
    pub recheck: bool,
}

impl Context {
    pub fn new(root: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>, backend: BackendHandle) -> Self {
        Self {
            root: root.into(),
            staging_dir: staging_dir.into(),
            backend,
            service: None,
            throttle: Arc::new(FixedDelay::default()),
            recheck: false,
        }
    }

    pub fn with_service(mut self, service: ServiceHandle) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleHandle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_recheck(mut self, recheck: bool) -> Self {
        self.recheck = recheck;
        self
    }
}

/// Progress events emitted by [`sync`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, after
///    the scan and the inventory check.
/// 3. [`Uploaded`](Self::Uploaded), [`Staged`](Self::Staged) or
///    [`AlreadyPresent`](Self::AlreadyPresent): zero or more times, one per
///    file that didn't fail.
/// 4. [`Complete`](Self::Complete): exactly once, with the final tally.
///
/// A fatal error terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started,
    /// How many images were found, and how many still need uploading.
    DiscoveryComplete { discovered: usize, pending: usize },
    /// A file was put into the store.
    Uploaded(Conversion),
    /// The store is read-only; the file was prepared but not sent.
    Staged(Conversion),
    /// The key turned up in the store after the inventory was fetched
    /// (recheck mode only); the upload was skipped.
    AlreadyPresent(Conversion),
    Complete(Report),
}

/// Streams [`SyncEvent`]s for a whole run described by `ctx`.
///
/// Files are processed strictly one after another, in scan order. Failures
/// affecting a single file ([`is_per_file`](ErrorKind::is_per_file)) are
/// yielded as `Err` items without terminating the stream. A failure to scan,
/// fetch the inventory or prepare the staging directory is yielded once and
/// ends it, as is a run that needs compressing without a service configured.
pub fn sync(ctx: &Context) -> impl Stream<Item = Result<SyncEvent>> + '_ {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(SyncEvent::Started);
        let mut report = Report::default();

        let files = match scan_excluding(&ctx.root, &ctx.staging_dir).await {
            Ok(files) => files,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let inventory = match Inventory::fetch(&ctx.backend).await {
            Ok(inventory) => inventory,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        report.discovered = files.len();
        let pending = filter_existing(files, &inventory, &ctx.root);
        report.skipped = report.discovered - pending.len();
        yield Ok(SyncEvent::DiscoveryComplete { discovered: report.discovered, pending: pending.len() });

        let service = ctx.service.clone();
        let compressible = pending.iter().filter(|file| file.format.is_compressible()).count();
        if service.is_none() && compressible > 0 {
            yield Err(exn::Exn::from(ErrorKind::NoService(compressible)));
            return;
        }

        let staging = match prepare_staging(&ctx.staging_dir, &ctx.root).await {
            Ok(staging) => staging,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let converter = Converter::new(ctx.throttle.clone(), staging, &ctx.root);
        let converter = match service {
            Some(service) => converter.with_service(service),
            None => converter,
        };

        for file in &pending {
            let result = sync_file(ctx, &converter, file, &mut report).await;
            if result.is_err() {
                report.failed += 1;
            }
            yield result;
        }

        tracing::info!(
            discovered = report.discovered,
            skipped = report.skipped,
            converted = report.converted,
            passed_through = report.passed_through,
            uploaded = report.uploaded,
            staged = report.staged,
            failed = report.failed,
            "Sync complete"
        );
        yield Ok(SyncEvent::Complete(report));
    })
}

async fn sync_file(ctx: &Context, converter: &Converter, file: &LocalFile, report: &mut Report) -> Result<SyncEvent> {
    let conversion = converter.process(file).await?;
    match conversion.converted {
        true => report.converted += 1,
        false => report.passed_through += 1,
    }

    if ctx.recheck
        && ctx.backend.exists(conversion.key.as_str()).await.or_raise(|| ErrorKind::Upload(conversion.key.to_string()))?
    {
        tracing::info!(key = %conversion.key, "Skipping upload, key appeared in store during run");
        report.skipped += 1;
        return Ok(SyncEvent::AlreadyPresent(conversion));
    }

    upload(&ctx.backend, &conversion.path, &conversion.key).await?;
    if ctx.backend.is_read_only() {
        report.staged += 1;
        return Ok(SyncEvent::Staged(conversion));
    }
    report.uploaded += 1;
    Ok(SyncEvent::Uploaded(conversion))
}

/// Reset the staging directory, refusing to wipe anything that contains the
/// images being synced.
async fn prepare_staging(staging_dir: &Path, root: &Path) -> Result<StagingDir> {
    let staging_error = || ErrorKind::Staging(staging_dir.to_path_buf());
    let staging_abs = std::path::absolute(staging_dir).or_raise(staging_error)?;
    let root_abs = std::path::absolute(root).or_raise(staging_error)?;
    if root_abs.starts_with(&staging_abs) {
        tracing::error!(staging = %staging_abs.display(), root = %root_abs.display(), "Staging directory contains the images folder");
        exn::bail!(staging_error());
    }
    StagingDir::init(staging_dir).await
}
