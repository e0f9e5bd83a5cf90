//! Core configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{CONTROLLER_TIMEOUT_SECS, DEFAULT_MAX_FRAGMENT_ELEMENTS};
use crate::services::IngestSettings;

/// Configuration for MatrixCast.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Public URL prefix used to build preview links.
    pub base_url: String,

    // Controller
    /// Base URL of the matrix controller.
    pub matrix_url: String,

    /// Timeout for each controller request (seconds).
    pub controller_timeout_secs: u64,

    // Encoding
    /// Matrix width in pixels.
    pub width: u32,

    /// Matrix height in pixels.
    pub height: u32,

    /// Upper bound on color/id entries per fragment.
    pub max_fragment_elements: usize,

    // Storage
    /// Temporary location for raw uploads.
    pub upload_dir: PathBuf,

    /// Location of the preview PNGs.
    pub image_dir: PathBuf,

    /// Location of the picture records.
    pub data_dir: PathBuf,

    // Maintenance
    /// Seconds between integrity checks (0 = disabled).
    pub integrity_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 3000,
            base_url: "http://localhost:3000/".to_string(),
            matrix_url: "http://127.0.0.1:8080".to_string(),
            controller_timeout_secs: CONTROLLER_TIMEOUT_SECS,
            width: 16,
            height: 16,
            max_fragment_elements: DEFAULT_MAX_FRAGMENT_ELEMENTS,
            upload_dir: PathBuf::from("./uploads"),
            image_dir: PathBuf::from("./images"),
            data_dir: PathBuf::from("./data"),
            integrity_interval_secs: 0,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "matrix size must be at least 1x1 (got {}x{})",
                self.width, self.height
            ));
        }
        if self.max_fragment_elements == 0 {
            return Err("max_fragment_elements must be >= 1".to_string());
        }
        if self.controller_timeout_secs == 0 {
            return Err("controller_timeout_secs must be >= 1".to_string());
        }
        if !(self.matrix_url.starts_with("http://") || self.matrix_url.starts_with("https://")) {
            return Err(format!(
                "matrix_url must be an http(s) URL (got {:?})",
                self.matrix_url
            ));
        }
        Ok(())
    }

    /// Creates the upload, image and data directories if missing.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.upload_dir, &self.image_dir, &self.data_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Settings handed to the ingestion pipeline.
    #[must_use]
    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            width: self.width,
            height: self.height,
            max_fragment_elements: self.max_fragment_elements,
            upload_dir: self.upload_dir.clone(),
            image_dir: self.image_dir.clone(),
        }
    }
}
