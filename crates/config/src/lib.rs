//! Configuration for imgsync.
//!
//! Settings are layered with [`figment`], later sources overriding earlier
//! ones:
//!
//! 1. Built-in defaults
//! 2. A config file (TOML, YAML or JSON), either given explicitly or found at
//!    `<config dir>/imgsync/config.toml`
//! 3. The legacy environment variables (`IMAGES_FOLDER`, `S3_BUCKET`, ...)
//! 4. `IMGSYNC_`-prefixed environment variables, with `__` separating nested
//!    keys (`IMGSYNC_STORE__BUCKET`)

pub mod error;

use crate::error::{ConfigErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "IMGSYNC_";
pub const DEFAULT_STAGING_DIR: &str = "output";
pub const DEFAULT_THROTTLE_SECS: u64 = 10;
pub const DEFAULT_REGION: &str = "us-east-1";

/// Environment variables understood before the `IMGSYNC_` prefix existed,
/// and the config key each one maps onto.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("IMAGES_FOLDER", "images_folder"),
    ("S3_BUCKET", "store.bucket"),
    ("S3_REGION", "store.region"),
    ("S3_ENDPOINT", "store.endpoint"),
    ("S3_PREFIX", "store.prefix"),
    ("S3_ACCESS_KEY_ID", "store.key_id"),
    ("S3_SECRET_ACCESS_KEY", "store.key_secret"),
    ("TINIFY_API_KEY", "tinify.api_key"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Local directory tree to scan for images.
    pub images_folder: PathBuf,
    /// Scratch directory for compressed output, wiped at the start of every run.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Fixed delay before every compression service request.
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: u64,
    /// Check the store for each key again right before uploading it.
    #[serde(default)]
    pub recheck: bool,
    pub store: StoreConfig,
    #[serde(default)]
    pub tinify: TinifyConfig,
}

/// Where processed images end up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// An S3-compatible bucket.
    S3 {
        bucket: String,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
        key_id: String,
        key_secret: String,
    },
    /// A directory on the local filesystem, laid out like the bucket would be.
    Local { path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TinifyConfig {
    /// Only needed once something is left to compress.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override the API base URL (tests, proxies).
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STAGING_DIR)
}

fn default_throttle_secs() -> u64 {
    DEFAULT_THROTTLE_SECS
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Config {
    /// Load configuration from every source.
    ///
    /// # Errors
    ///
    /// - [`Missing`](ConfigErrorKind::Missing) if the images folder isn't
    ///   set anywhere
    /// - [`Invalid`](ConfigErrorKind::Invalid) if a config file can't be
    ///   read or parsed, or a value has the wrong shape
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path)?)
    }

    /// Build the layered [`Figment`] without extracting it, so callers can
    /// merge their own overrides (command line flags) on top.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let figment = Figment::new().merge(Serialized::default("store.type", "s3"));
        let figment = match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ConfigErrorKind::Invalid(format!("config file `{}` not found", path.display())));
                }
                tracing::debug!(path = %path.display(), "Using config file");
                merge_file(figment, path)?
            },
            None => match default_config_file() {
                Some(path) if path.is_file() => {
                    tracing::debug!(path = %path.display(), "Using default config file");
                    merge_file(figment, &path)?
                },
                _ => figment,
            },
        };
        Ok(figment.merge(legacy_env()).merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        if figment.find_value("images_folder").is_err() {
            exn::bail!(ConfigErrorKind::Missing("images_folder"));
        }
        figment.extract().map_err(|e| exn::Exn::from(ConfigErrorKind::Invalid(e.to_string())))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }
}

fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "imgsync").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        None | Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        Some(other) => exn::bail!(ConfigErrorKind::Invalid(format!("unsupported config file format `.{other}`"))),
    })
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|name| {
        LEGACY_ENV
            .iter()
            .find(|(legacy, _)| name.as_str().eq_ignore_ascii_case(legacy))
            .map(|(_, key)| (*key).into())
            .unwrap_or_else(|| name.into())
    })
}
