//! Domain events.
//!
//! This module provides:
//! - [`EventEmitter`] trait for services to emit events
//! - Event types for delivery jobs, the picture library and device settings

mod emitter;

pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};
#[cfg(test)]
pub(crate) use emitter::RecordingEventEmitter;

use serde::Serialize;

/// Events describing the lifecycle of one delivery job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeliveryEvent {
    /// The single-flight guard was acquired and the record loaded.
    #[serde(rename_all = "camelCase")]
    Started {
        picture_id: String,
        total: usize,
        timestamp: u64,
    },
    /// Fragment `index` was accepted by the controller.
    #[serde(rename_all = "camelCase")]
    Progress {
        picture_id: String,
        index: usize,
        total: usize,
    },
    /// Every fragment was delivered.
    #[serde(rename_all = "camelCase")]
    Completed {
        picture_id: String,
        total: usize,
        timestamp: u64,
    },
    /// The job stopped early.
    #[serde(rename_all = "camelCase")]
    Failed {
        picture_id: String,
        /// Last fragment attempted, if sending had started.
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        message: String,
        timestamp: u64,
    },
    /// Another job held the guard; nothing was sent.
    #[serde(rename_all = "camelCase")]
    Rejected { picture_id: String, timestamp: u64 },
}

/// Events describing changes to the stored picture library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LibraryEvent {
    #[serde(rename_all = "camelCase")]
    PictureAdded {
        picture_id: String,
        display_name: String,
        animated: bool,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    PictureRemoved { picture_id: String, timestamp: u64 },
    /// A reconciliation pass finished.
    #[serde(rename_all = "camelCase")]
    IntegrityChecked {
        removed_files: usize,
        removed_records: usize,
        timestamp: u64,
    },
}

/// Events describing device setting changes pushed to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SettingsEvent {
    BrightnessChanged { brightness: u8, timestamp: u64 },
    #[serde(rename_all = "camelCase")]
    SpeedChanged { speed_ms: u32, timestamp: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_event_is_tagged_camel_case() {
        let event = DeliveryEvent::Progress {
            picture_id: "p".into(),
            index: 2,
            total: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["pictureId"], "p");
        assert_eq!(json["index"], 2);
    }

    #[test]
    fn failed_before_sending_omits_index() {
        let event = DeliveryEvent::Failed {
            picture_id: "p".into(),
            index: None,
            message: "boom".into(),
            timestamp: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("index").is_none());
    }
}
