//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete sink,
//! so tests can count or capture events.

use super::{DeliveryEvent, LibraryEvent, SettingsEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn done(&self, id: String) {
///         self.emitter.emit_library(LibraryEvent::PictureRemoved { picture_id: id, timestamp: 0 });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a delivery job event.
    fn emit_delivery(&self, event: DeliveryEvent);

    /// Emits a picture library event.
    fn emit_library(&self, event: LibraryEvent);

    /// Emits a device settings event.
    fn emit_settings(&self, event: SettingsEvent);
}

/// No-op emitter for testing.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_delivery(&self, _event: DeliveryEvent) {}

    fn emit_library(&self, _event: LibraryEvent) {}

    fn emit_settings(&self, _event: SettingsEvent) {}
}

/// Logging emitter.
///
/// Logs all events at debug level as structured tracing records.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_delivery(&self, event: DeliveryEvent) {
        tracing::debug!(?event, "delivery_event");
    }

    fn emit_library(&self, event: LibraryEvent) {
        tracing::debug!(?event, "library_event");
    }

    fn emit_settings(&self, event: SettingsEvent) {
        tracing::debug!(?event, "settings_event");
    }
}

/// Emitter that records everything it receives.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingEventEmitter {
    pub delivery: parking_lot::Mutex<Vec<DeliveryEvent>>,
    pub library: parking_lot::Mutex<Vec<LibraryEvent>>,
    pub settings: parking_lot::Mutex<Vec<SettingsEvent>>,
}

#[cfg(test)]
impl EventEmitter for RecordingEventEmitter {
    fn emit_delivery(&self, event: DeliveryEvent) {
        self.delivery.lock().push(event);
    }

    fn emit_library(&self, event: LibraryEvent) {
        self.library.lock().push(event);
    }

    fn emit_settings(&self, event: SettingsEvent) {
        self.settings.lock().push(event);
    }
}
