use clap::Parser;
use figment::Figment;
use figment::providers::Serialized;
use std::path::PathBuf;

/// Compress local images and upload the ones missing from the object store.
#[derive(Debug, Parser)]
#[command(name = "imgsync", version, about)]
pub struct Cli {
    /// Config file (TOML, YAML or JSON) to load instead of the default one.
    #[arg(long, short, env = "IMGSYNC_CONFIG")]
    pub config: Option<PathBuf>,
    /// Images folder to scan, overriding the configured one.
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Convert and stage everything, but don't upload anything.
    #[arg(long)]
    pub no_upload: bool,
    /// Check the store for every key again right before uploading it.
    #[arg(long)]
    pub recheck: bool,
    /// Exit with status 2 if any single file failed.
    #[arg(long)]
    pub strict: bool,
}

impl Cli {
    /// Merge flags that double as settings on top of every other source.
    pub fn overrides(&self, mut figment: Figment) -> Figment {
        if let Some(root) = &self.root {
            figment = figment.merge(Serialized::default("images_folder", root));
        }
        if self.recheck {
            figment = figment.merge(Serialized::default("recheck", true));
        }
        figment
    }
}
