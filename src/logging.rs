use std::env;
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

const CRATES: &[&str] = &["imgsync", "imgsync_compress", "imgsync_config", "imgsync_pipeline", "imgsync_storage"];

/// Install the global subscriber, writing to stderr.
pub fn init() {
    let rust_log = env::var(EnvFilter::DEFAULT_ENV).ok();
    let format = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false);
    tracing_subscriber::registry().with(format).with(EnvFilter::new(directives(rust_log.as_deref()))).init();
}

/// A bare level in `RUST_LOG` applies to this workspace only (everything
/// else stays at `warn`); anything else is used as a filter verbatim.
fn directives(rust_log: Option<&str>) -> String {
    let level = match rust_log {
        Some(value) => match value.parse::<Level>() {
            Ok(level) => level,
            Err(_) => return value.to_string(),
        },
        None => Level::INFO,
    };
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|name| format!("{name}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}
