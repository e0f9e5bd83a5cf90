//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::controller::{HttpMatrixController, MatrixController};
use crate::error::{MatrixError, MatrixResult};
use crate::events::{EventEmitter, LoggingEventEmitter};
use crate::services::{
    DeliveryService, IngestService, IntegrityService, LibraryService, SettingsGuard,
};
use crate::state::Config;
use crate::store::{JsonFilePictureStore, PictureStore};
use crate::transcode::{CoverTranscoder, Transcoder};

/// Container for all bootstrapped services.
///
/// Consumed by `AppState` to build the HTTP layer's state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Picture record persistence.
    pub store: Arc<dyn PictureStore>,
    /// Matrix controller client.
    pub controller: Arc<dyn MatrixController>,
    /// Brightness/speed guard.
    pub settings: Arc<SettingsGuard>,
    /// Single-flight delivery of stored pictures.
    pub delivery: Arc<DeliveryService>,
    /// Upload ingestion.
    pub ingest: Arc<IngestService>,
    /// Picture lookup and deletion.
    pub library: Arc<LibraryService>,
    /// Record/file reconciliation.
    pub integrity: Arc<IntegrityService>,
    /// Sink for domain events.
    pub emitter: Arc<dyn EventEmitter>,
    /// Configuration the services were built from.
    pub config: Config,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BootstrappedServices {
    /// Starts periodic jobs (currently the integrity check, if enabled).
    pub fn start_background_tasks(&self) {
        let interval = self.config.integrity_interval_secs;
        if interval == 0 {
            log::info!("[Bootstrap] Periodic integrity check disabled");
            return;
        }

        let handle = Arc::clone(&self.integrity)
            .spawn_periodic(Duration::from_secs(interval), self.cancel_token.clone());
        self.background.lock().push(handle);
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        // Signal cancellation to all background tasks
        self.cancel_token.cancel();

        let handles: Vec<_> = self.background.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("[Bootstrap] Background task ended abnormally: {e}");
            }
        }

        if self.delivery.is_busy() {
            log::warn!("[Bootstrap] A delivery job is still sending");
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the shared HTTP client for controller communication.
fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// Bootstraps all services with the default infrastructure: a JSON file
/// store under `data_dir`, an HTTP controller client and the logging
/// event emitter.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a directory cannot
/// be created.
pub fn bootstrap_services(config: &Config) -> MatrixResult<BootstrappedServices> {
    config.validate().map_err(MatrixError::Configuration)?;
    config
        .ensure_directories()
        .map_err(|e| MatrixError::Configuration(format!("Failed to create directories: {e}")))?;

    let timeout = Duration::from_secs(config.controller_timeout_secs);
    let http_client = create_http_client(timeout);

    let store: Arc<dyn PictureStore> = Arc::new(JsonFilePictureStore::open(&config.data_dir)?);
    let controller: Arc<dyn MatrixController> = Arc::new(HttpMatrixController::new(
        http_client,
        config.matrix_url.clone(),
        timeout,
    ));

    log::info!(
        "[Bootstrap] Controller at {}, matrix {}x{}",
        config.matrix_url,
        config.width,
        config.height
    );

    Ok(bootstrap_with(
        config,
        store,
        controller,
        Arc::new(CoverTranscoder::default()),
        Arc::new(LoggingEventEmitter),
    ))
}

/// Wires services around the given infrastructure.
///
/// The wiring order follows the dependencies:
///
/// 1. Settings guard (controller, emitter)
/// 2. Delivery service (store, controller, settings guard)
/// 3. Ingest, library and integrity services (store, emitter)
pub fn bootstrap_with(
    config: &Config,
    store: Arc<dyn PictureStore>,
    controller: Arc<dyn MatrixController>,
    transcoder: Arc<dyn Transcoder>,
    emitter: Arc<dyn EventEmitter>,
) -> BootstrappedServices {
    let settings = Arc::new(SettingsGuard::new(
        Arc::clone(&controller),
        Arc::clone(&emitter),
    ));

    let delivery = Arc::new(DeliveryService::new(
        Arc::clone(&store),
        Arc::clone(&controller),
        Arc::clone(&settings),
        Arc::clone(&emitter),
    ));

    let ingest = Arc::new(IngestService::new(
        Arc::clone(&store),
        transcoder,
        Arc::clone(&emitter),
        config.ingest_settings(),
    ));

    let library = Arc::new(LibraryService::new(
        Arc::clone(&store),
        Arc::clone(&emitter),
        config.image_dir.clone(),
        config.base_url.clone(),
    ));

    let integrity = Arc::new(IntegrityService::new(
        Arc::clone(&store),
        Arc::clone(&emitter),
        config.image_dir.clone(),
    ));

    BootstrappedServices {
        store,
        controller,
        settings,
        delivery,
        ingest,
        library,
        integrity,
        emitter,
        config: config.clone(),
        cancel_token: CancellationToken::new(),
        background: Arc::new(Mutex::new(Vec::new())),
    }
}
