//! Configuration management
//!
//! Values are layered, lowest precedence first: built-in defaults, an optional
//! TOML file, `BUCKETPROXY_*` environment variables, then command-line flags.

use anyhow::{bail, Context};
use bucketproxy_objects::storage::S3Options;
use serde::Deserialize;
use std::path::PathBuf;

/// Which storage backend serves the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Filesystem,
    S3,
}

/// Main configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    pub host: String,
    pub server_port: u16,
    pub telemetry_port: u16,

    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,

    pub backend: BackendKind,
    pub data_dir: Option<PathBuf>,
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub path_style: bool,
}

/// Storage selection derived from [`Config`]
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Ephemeral,
    FileSystem { path: PathBuf },
    S3 { bucket: String, options: S3Options },
}

/// Values given on the command line; `None` leaves lower layers in effect
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub server_port: Option<u16>,
    pub telemetry_port: Option<u16>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub backend: Option<String>,
    pub data_dir: Option<String>,
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub path_style: Option<bool>,
}

impl Config {
    /// Load configuration from file, environment and command-line overrides
    pub fn load(file: &str, overrides: Overrides) -> anyhow::Result<Self> {
        Self::load_with_env(file, overrides, config::Environment::with_prefix("BUCKETPROXY"))
    }

    fn load_with_env(
        file: &str,
        overrides: Overrides,
        env: config::Environment,
    ) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("server_port", 8080_i64)?
            .set_default("telemetry_port", 9090_i64)?
            .set_default("prefix", "")?
            .set_default("backend", "memory")?
            .set_default("path_style", false)?
            .add_source(config::File::with_name(file).required(false))
            .add_source(env)
            .set_override_option("host", overrides.host)?
            .set_override_option("server_port", overrides.server_port.map(i64::from))?
            .set_override_option("telemetry_port", overrides.telemetry_port.map(i64::from))?
            .set_override_option("bucket", overrides.bucket)?
            .set_override_option("prefix", overrides.prefix)?
            .set_override_option("backend", overrides.backend)?
            .set_override_option("data_dir", overrides.data_dir)?
            .set_override_option("endpoint_url", overrides.endpoint_url)?
            .set_override_option("region", overrides.region)?
            .set_override_option("path_style", overrides.path_style)?
            .build()
            .context("failed to load configuration")?;

        let config = config
            .try_deserialize::<Config>()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.trim().is_empty() {
            bail!("a bucket is required (--bucket or BUCKETPROXY_BUCKET)");
        }
        if self.backend == BackendKind::Filesystem && self.data_dir.is_none() {
            bail!("the filesystem backend requires --data-dir");
        }
        Ok(())
    }

    pub fn storage(&self) -> StorageConfig {
        match self.backend {
            BackendKind::Memory => StorageConfig::Ephemeral,
            BackendKind::Filesystem => StorageConfig::FileSystem {
                path: self
                    .data_dir
                    .clone()
                    .unwrap_or_default()
                    .join(&self.bucket),
            },
            BackendKind::S3 => StorageConfig::S3 {
                bucket: self.bucket.clone(),
                options: S3Options {
                    endpoint_url: self.endpoint_url.clone(),
                    region: self.region.clone(),
                    force_path_style: self.path_style,
                },
            },
        }
    }
}
