//! MatrixCast Core - picture encoding and delivery for pixel-matrix
//! controllers.
//!
//! This crate turns uploaded raster files (still images and GIF animations)
//! into compact key/delta fragments, stores them, and streams them to an
//! addressable LED matrix controller over HTTP. It is used by the standalone
//! server in `apps/matrixcast-server`.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`codec`]: Pixel grids, key/delta fragment encoding, animation assembly
//! - [`transcode`]: Resizing frames to the matrix resolution
//! - [`store`]: Picture record persistence
//! - [`controller`]: HTTP client for the matrix controller
//! - [`services`]: Ingestion, delivery, settings, library and integrity
//! - [`events`]: Domain events and their emitters
//! - [`api`]: HTTP router and server startup
//! - [`state`]: Core configuration
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple core logic from
//! infrastructure:
//!
//! - [`PictureStore`](store::PictureStore): Record persistence
//! - [`MatrixController`](controller::MatrixController): Controller transport
//! - [`Transcoder`](transcode::Transcoder): Frame resizing and preview output
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events
//!
//! Each trait has a default implementation wired up by
//! [`bootstrap_services`].

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod codec;
pub mod controller;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod services;
pub mod state;
pub mod store;
pub mod transcode;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{ErrorCode, MatrixError, MatrixResult};
pub use events::{
    DeliveryEvent, EventEmitter, LibraryEvent, LoggingEventEmitter, NoopEventEmitter,
    SettingsEvent,
};
pub use state::Config;
pub use utils::now_millis;

// Re-export codec types
pub use codec::{
    assemble, best_of, delta_encode, key_encode, CodecError, EncodedAnimation, Fragment,
    FragmentPayload, PixelGrid, WireFragment,
};

// Re-export collaborator traits and implementations
pub use controller::{ControllerError, HttpMatrixController, MatrixController};
pub use store::{JsonFilePictureStore, MemoryPictureStore, PictureRecord, PictureStore, StoreError};
pub use transcode::{CoverTranscoder, Transcoder};

// Re-export service types
pub use services::{
    ApplyOptions, DeliveryJob, DeliveryService, DeviceSettings, IngestService, IntegrityReport,
    IntegrityService, JobState, LibraryService, Progress, SettingValue, SettingsGuard,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_with, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, AppStateBuilder, ServerError};
