//! HTTP API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::bootstrap::BootstrappedServices;
use crate::services::{
    DeliveryService, IngestService, IntegrityService, LibraryService, SettingsGuard,
};
use crate::state::Config;

pub mod http;
pub mod response;

/// Port range probed when no preferred port is configured.
const FALLBACK_PORT_RANGE: (u16, u16) = (49500, 49510);

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Single-flight delivery to the controller.
    pub delivery: Arc<DeliveryService>,
    /// Upload ingestion.
    pub ingest: Arc<IngestService>,
    /// Picture lookup and deletion.
    pub library: Arc<LibraryService>,
    /// Record/file reconciliation.
    pub integrity: Arc<IntegrityService>,
    /// Brightness/speed guard.
    pub settings: Arc<SettingsGuard>,
    /// Application configuration.
    pub config: Arc<Config>,
    /// Whether background services have been started.
    services_started: Arc<AtomicBool>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    delivery: Option<Arc<DeliveryService>>,
    ingest: Option<Arc<IngestService>>,
    library: Option<Arc<LibraryService>>,
    integrity: Option<Arc<IntegrityService>>,
    settings: Option<Arc<SettingsGuard>>,
    config: Option<Arc<Config>>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delivery service.
    pub fn delivery(mut self, delivery: Arc<DeliveryService>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Sets the ingest service.
    pub fn ingest(mut self, ingest: Arc<IngestService>) -> Self {
        self.ingest = Some(ingest);
        self
    }

    /// Sets the library service.
    pub fn library(mut self, library: Arc<LibraryService>) -> Self {
        self.library = Some(library);
        self
    }

    /// Sets the integrity service.
    pub fn integrity(mut self, integrity: Arc<IntegrityService>) -> Self {
        self.integrity = Some(integrity);
        self
    }

    /// Sets the settings guard.
    pub fn settings(mut self, settings: Arc<SettingsGuard>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState`, panicking if required fields are missing.
    pub fn build(self) -> AppState {
        AppState {
            delivery: self.delivery.expect("delivery is required"),
            ingest: self.ingest.expect("ingest is required"),
            library: self.library.expect("library is required"),
            integrity: self.integrity.expect("integrity is required"),
            settings: self.settings.expect("settings is required"),
            config: self.config.expect("config is required"),
            services_started: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Builds the state from bootstrapped services.
    pub fn from_services(services: &BootstrappedServices) -> Self {
        Self::builder()
            .delivery(Arc::clone(&services.delivery))
            .ingest(Arc::clone(&services.ingest))
            .library(Arc::clone(&services.library))
            .integrity(Arc::clone(&services.integrity))
            .settings(Arc::clone(&services.settings))
            .config(Arc::new(services.config.clone()))
            .build()
    }

    /// Marks services as started.
    ///
    /// Returns `true` if this was the first call to mark started,
    /// `false` if already started.
    pub fn mark_services_started(&self) -> bool {
        self.services_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns whether services have been started.
    pub fn services_started(&self) -> bool {
        self.services_started.load(Ordering::SeqCst)
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Binds the configured or an auto-discovered port.
pub async fn bind_listener(
    preferred_port: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    if preferred_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
        Ok((preferred_port, tokio::net::TcpListener::bind(&addr).await?))
    } else {
        let (start, end) = FALLBACK_PORT_RANGE;
        find_available_port(start, end).await
    }
}

/// Starts the HTTP server and runs it until `shutdown` resolves.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (port, listener) = bind_listener(state.config.preferred_port).await?;

    log::info!("[Server] Listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    log::info!("[Server] Stopped");
    Ok(())
}
