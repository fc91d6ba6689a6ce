mod cli;
mod error;
mod logging;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use imgsync_compress::TinifyClient;
use imgsync_config::{Config, StoreConfig, TinifyConfig};
use imgsync_pipeline::{Context, FixedDelay, Report, SyncEvent, sync};
use imgsync_storage::BackendHandle;
use imgsync_storage::backend::{LocalBackend, ReadOnlyBackend, S3Backend};
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();
    match run(&cli).await {
        Ok(report) if cli.strict && report.has_failures() => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "{e}");
            ExitCode::from(1)
        },
    }
}

async fn run(cli: &Cli) -> Result<Report> {
    let figment = Config::figment(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let config = Config::from_figment(cli.overrides(figment)).or_raise(|| ErrorKind::Config)?;

    let backend = store(&config.store, cli.no_upload)?;
    let tinify = tinify(&config.tinify)?.map(Arc::new);
    let mut ctx = Context::new(&config.images_folder, &config.staging_dir, backend)
        .with_throttle(Arc::new(FixedDelay::new(config.throttle())))
        .with_recheck(config.recheck);
    match &tinify {
        Some(tinify) => ctx = ctx.with_service(tinify.clone()),
        None => tracing::debug!("No Tinify API key; only files that need no compression can be synced"),
    }
    tracing::info!(
        root = %config.images_folder.display(),
        store = ctx.backend.name(),
        staging = %config.staging_dir.display(),
        recheck = config.recheck,
        "Starting sync"
    );

    let mut events = pin!(sync(&ctx));
    let mut report = None;
    while let Some(event) = events.next().await {
        match event {
            Ok(SyncEvent::DiscoveryComplete { discovered, pending }) => {
                tracing::info!(discovered, pending, "Discovery complete");
            },
            Ok(SyncEvent::Complete(r)) => report = Some(r),
            Ok(_) => {},
            Err(e) if e.is_per_file() => tracing::warn!(error = ?e, "{e}"),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Sync),
        }
    }
    if let Some(count) = tinify.map(|t| t.compression_count()).filter(|count| *count > 0) {
        tracing::info!(count, "Compressions used this month");
    }
    report.ok_or_raise(|| ErrorKind::Sync)
}

fn store(config: &StoreConfig, no_upload: bool) -> Result<BackendHandle> {
    let backend: BackendHandle = match config {
        StoreConfig::S3 {
            bucket,
            region,
            endpoint,
            prefix,
            key_id,
            key_secret,
        } => Arc::new(
            S3Backend::new("s3", bucket, prefix.clone(), region, endpoint.clone(), key_id, key_secret)
                .or_raise(|| ErrorKind::Store)?,
        ),
        StoreConfig::Local { path } => {
            let path = std::path::absolute(path).or_raise(|| ErrorKind::Store)?;
            Arc::new(LocalBackend::new("local", path).or_raise(|| ErrorKind::Store)?)
        },
    };
    if no_upload {
        tracing::info!("Uploads disabled; converted files stay in the staging directory");
        return Ok(Arc::new(ReadOnlyBackend::new(backend)));
    }
    Ok(backend)
}

fn tinify(config: &TinifyConfig) -> Result<Option<TinifyClient>> {
    let Some(api_key) = config.api_key.as_deref().filter(|key| !key.is_empty()) else {
        return Ok(None);
    };
    let client = TinifyClient::new(api_key).or_raise(|| ErrorKind::Service)?;
    Ok(Some(match &config.endpoint {
        Some(endpoint) => client.with_endpoint(endpoint),
        None => client,
    }))
}
