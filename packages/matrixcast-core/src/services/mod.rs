//! Application services layer.
//!
//! This module contains the business logic services that sit between the
//! API layer and infrastructure (codec/, controller/, store/).

pub mod delivery;
pub mod ingest;
pub mod integrity;
pub mod library;
pub mod settings;

pub use delivery::{
    ApplyOptions, DeliveryJob, DeliveryService, DeliverySummary, JobState, Progress, SingleFlight,
};
pub use ingest::{IngestService, IngestSettings, IngestedPicture};
pub use integrity::{IntegrityReport, IntegrityService};
pub use library::{LibraryService, PictureInfo};
pub use settings::{DeviceSettings, SettingValue, SettingsGuard};
