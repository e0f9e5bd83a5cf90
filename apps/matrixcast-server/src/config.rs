//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = auto).
    /// Override: `MATRIXCAST_BIND_PORT`
    pub bind_port: u16,

    /// Public URL prefix for preview links.
    /// Defaults to `http://localhost:<bind_port>/`.
    /// Override: `MATRIXCAST_BASE_URL`
    pub base_url: Option<String>,

    /// Base URL of the matrix controller.
    /// Override: `MATRIXCAST_MATRIX_URL`
    pub matrix_url: String,

    /// Timeout for each controller request, in seconds.
    pub controller_timeout_secs: u64,

    /// Matrix width in pixels.
    pub width: u32,

    /// Matrix height in pixels.
    pub height: u32,

    /// Upper bound on entries per fragment.
    pub max_fragment_elements: usize,

    /// Temporary location for raw uploads.
    pub upload_dir: PathBuf,

    /// Location of the preview PNGs (served under `/pictures`).
    pub image_dir: PathBuf,

    /// Directory for picture records.
    /// Override: `MATRIXCAST_DATA_DIR`
    pub data_dir: PathBuf,

    /// Seconds between integrity checks (0 = disabled).
    /// Override: `MATRIXCAST_INTEGRITY_INTERVAL`
    pub integrity_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = matrixcast_core::Config::default();
        Self {
            bind_port: core.preferred_port,
            base_url: None,
            matrix_url: core.matrix_url,
            controller_timeout_secs: core.controller_timeout_secs,
            width: core.width,
            height: core.height,
            max_fragment_elements: core.max_fragment_elements,
            upload_dir: core.upload_dir,
            image_dir: core.image_dir,
            data_dir: core.data_dir,
            integrity_interval_secs: core.integrity_interval_secs,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `MATRIXCAST_*` overrides. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("MATRIXCAST_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(url) = lookup("MATRIXCAST_MATRIX_URL") {
            self.matrix_url = url;
        }

        if let Some(url) = lookup("MATRIXCAST_BASE_URL") {
            self.base_url = Some(url);
        }

        if let Some(interval) =
            lookup("MATRIXCAST_INTEGRITY_INTERVAL").and_then(|v| v.parse().ok())
        {
            self.integrity_interval_secs = interval;
        }

        // Note: MATRIXCAST_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to matrixcast-core's Config type.
    pub fn to_core_config(&self) -> matrixcast_core::Config {
        let base_url = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/", self.bind_port));

        matrixcast_core::Config {
            preferred_port: self.bind_port,
            base_url,
            matrix_url: self.matrix_url.clone(),
            controller_timeout_secs: self.controller_timeout_secs,
            width: self.width,
            height: self.height,
            max_fragment_elements: self.max_fragment_elements,
            upload_dir: self.upload_dir.clone(),
            image_dir: self.image_dir.clone(),
            data_dir: self.data_dir.clone(),
            integrity_interval_secs: self.integrity_interval_secs,
        }
    }
}
