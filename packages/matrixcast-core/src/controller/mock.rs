//! Recording controller for service tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{ControllerError, ControllerResult, MatrixController};
use crate::codec::WireFragment;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Brightness(u8),
    Speed(u32),
    Fragment(WireFragment),
}

/// Records every call and fails on request.
#[derive(Default)]
pub(crate) struct MockController {
    pub calls: Mutex<Vec<Call>>,
    /// Zero-based fragment send that should fail.
    pub fail_fragment: Mutex<Option<usize>>,
    pub fail_settings: AtomicBool,
    fragments_attempted: AtomicUsize,
    /// When set, fragment sends wait until the gate opens.
    gate: Mutex<Option<Arc<Notify>>>,
    /// Notified when a fragment send starts waiting on the gate.
    pub entered: Arc<Notify>,
}

impl MockController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_at(index: usize) -> Arc<Self> {
        let mock = Self::default();
        *mock.fail_fragment.lock() = Some(index);
        Arc::new(mock)
    }

    /// Holds fragment sends until [`MockController::open`] is called.
    pub fn gated() -> Arc<Self> {
        let mock = Self::default();
        *mock.gate.lock() = Some(Arc::new(Notify::new()));
        Arc::new(mock)
    }

    /// Releases the held send and lets later ones through.
    pub fn open(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.notify_one();
        }
    }

    pub fn fragments(&self) -> Vec<WireFragment> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Fragment(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    fn settings_result(&self) -> ControllerResult<()> {
        if self.fail_settings.load(Ordering::SeqCst) {
            Err(ControllerError::HttpStatus(500, "settings rejected".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MatrixController for MockController {
    async fn set_brightness(&self, brightness: u8) -> ControllerResult<()> {
        self.settings_result()?;
        self.calls.lock().push(Call::Brightness(brightness));
        Ok(())
    }

    async fn set_speed(&self, frame_delay_ms: u32) -> ControllerResult<()> {
        self.settings_result()?;
        self.calls.lock().push(Call::Speed(frame_delay_ms));
        Ok(())
    }

    async fn send_fragment(&self, fragment: &WireFragment) -> ControllerResult<()> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }

        let attempt = self.fragments_attempted.fetch_add(1, Ordering::SeqCst);
        if *self.fail_fragment.lock() == Some(attempt) {
            return Err(ControllerError::HttpStatus(502, format!("fragment {attempt} lost")));
        }
        self.calls.lock().push(Call::Fragment(fragment.clone()));
        Ok(())
    }
}
