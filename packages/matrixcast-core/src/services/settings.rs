//! Device settings guard.
//!
//! Validates brightness and speed values, clamps them into the range the
//! controller accepts, pushes them, and remembers the last value the
//! controller accepted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::controller::MatrixController;
use crate::error::{MatrixError, MatrixResult};
use crate::events::{EventEmitter, SettingsEvent};
use crate::protocol_constants::{
    DEFAULT_BRIGHTNESS, DEFAULT_SPEED_MS, MAX_BRIGHTNESS, MAX_SPEED_MS, MIN_BRIGHTNESS,
    MIN_SPEED_MS,
};
use crate::utils::now_millis;

/// Last values accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettings {
    pub brightness: u8,
    pub speed_ms: u32,
}

impl DeviceSettings {
    /// Frame delay used to resolve animation fragment delays.
    #[must_use]
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.speed_ms))
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            brightness: DEFAULT_BRIGHTNESS,
            speed_ms: DEFAULT_SPEED_MS,
        }
    }
}

/// A setting value as supplied by a client: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(f64),
    Text(String),
}

impl SettingValue {
    /// Parses, rounds and saturates the value into `min..=max`.
    ///
    /// # Errors
    /// [`MatrixError::InvalidInput`] if the value is not a finite number.
    pub fn clamp_to(&self, min: u32, max: u32) -> MatrixResult<u32> {
        let number = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| MatrixError::InvalidInput(format!("{self} is not a number")))?,
        };

        if !number.is_finite() {
            return Err(MatrixError::InvalidInput(format!("{self} is not a number")));
        }

        Ok(number.round().clamp(f64::from(min), f64::from(max)) as u32)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Clamps, pushes and remembers device settings.
pub struct SettingsGuard {
    controller: Arc<dyn MatrixController>,
    emitter: Arc<dyn EventEmitter>,
    current: RwLock<DeviceSettings>,
    /// Serializes pushes so the remembered value matches the last accepted one.
    update_lock: Mutex<()>,
}

impl SettingsGuard {
    pub fn new(controller: Arc<dyn MatrixController>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            controller,
            emitter,
            current: RwLock::new(DeviceSettings::default()),
            update_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn current(&self) -> DeviceSettings {
        *self.current.read()
    }

    /// Clamps `value` into `1..=255`, pushes it, and remembers it.
    ///
    /// Out-of-range numbers saturate. On a failed push the previous value is
    /// kept and the transport error is returned.
    pub async fn set_brightness(&self, value: &SettingValue) -> MatrixResult<u8> {
        let brightness =
            value.clamp_to(u32::from(MIN_BRIGHTNESS), u32::from(MAX_BRIGHTNESS))? as u8;

        let _update = self.update_lock.lock().await;
        self.controller.set_brightness(brightness).await.map_err(|e| {
            log::warn!("[Settings] Brightness {brightness} not applied: {e}");
            MatrixError::from(e)
        })?;

        self.current.write().brightness = brightness;
        log::info!("[Settings] Brightness set to {brightness}");
        self.emitter.emit_settings(SettingsEvent::BrightnessChanged {
            brightness,
            timestamp: now_millis(),
        });
        Ok(brightness)
    }

    /// Clamps `value` into `0..=60000` ms, pushes it, and remembers it.
    pub async fn set_speed(&self, value: &SettingValue) -> MatrixResult<u32> {
        let speed_ms = value.clamp_to(MIN_SPEED_MS, MAX_SPEED_MS)?;

        let _update = self.update_lock.lock().await;
        self.controller.set_speed(speed_ms).await.map_err(|e| {
            log::warn!("[Settings] Speed {speed_ms}ms not applied: {e}");
            MatrixError::from(e)
        })?;

        self.current.write().speed_ms = speed_ms;
        log::info!("[Settings] Speed set to {speed_ms}ms");
        self.emitter.emit_settings(SettingsEvent::SpeedChanged {
            speed_ms,
            timestamp: now_millis(),
        });
        Ok(speed_ms)
    }

    /// Pushes the remembered brightness again.
    pub async fn push_brightness(&self) -> MatrixResult<()> {
        let _update = self.update_lock.lock().await;
        let brightness = self.current.read().brightness;
        self.controller.set_brightness(brightness).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::controller::mock::{Call, MockController};
    use crate::events::NoopEventEmitter;

    fn guard(controller: Arc<MockController>) -> SettingsGuard {
        SettingsGuard::new(controller, Arc::new(NoopEventEmitter))
    }

    #[test]
    fn values_round_and_saturate() {
        assert_eq!(SettingValue::from(0i64).clamp_to(1, 255).unwrap(), 1);
        assert_eq!(SettingValue::from(300i64).clamp_to(1, 255).unwrap(), 255);
        assert_eq!(SettingValue::from(-5.0).clamp_to(0, 60_000).unwrap(), 0);
        assert_eq!(SettingValue::from(99.6).clamp_to(1, 255).unwrap(), 100);
        assert_eq!(SettingValue::from(" 42 ").clamp_to(1, 255).unwrap(), 42);
    }

    #[test]
    fn non_numbers_are_invalid_input() {
        for raw in ["x", "", "NaN", "inf", "12px"] {
            let err = SettingValue::from(raw).clamp_to(1, 255).unwrap_err();
            assert!(matches!(err, MatrixError::InvalidInput(_)), "{raw}");
        }
        assert!(SettingValue::from(f64::NAN).clamp_to(1, 255).is_err());
    }

    #[test]
    fn accepts_json_numbers_and_strings() {
        let n: SettingValue = serde_json::from_str("12.5").unwrap();
        let s: SettingValue = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(n, SettingValue::Number(12.5));
        assert_eq!(s, SettingValue::Text("7".into()));
    }

    #[tokio::test]
    async fn brightness_is_clamped_pushed_and_remembered() {
        let controller = MockController::new();
        let settings = guard(controller.clone());

        assert_eq!(settings.set_brightness(&0i64.into()).await.unwrap(), 1);
        assert_eq!(settings.set_brightness(&300i64.into()).await.unwrap(), 255);

        assert_eq!(settings.current().brightness, 255);
        assert_eq!(
            *controller.calls.lock(),
            vec![Call::Brightness(1), Call::Brightness(255)]
        );
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_controller() {
        let controller = MockController::new();
        let settings = guard(controller.clone());

        let err = settings.set_brightness(&"x".into()).await.unwrap_err();
        assert!(matches!(err, MatrixError::InvalidInput(_)));
        assert!(controller.calls.lock().is_empty());
        assert_eq!(settings.current(), DeviceSettings::default());
    }

    #[tokio::test]
    async fn failed_push_keeps_previous_value() {
        let controller = MockController::new();
        let settings = guard(controller.clone());
        settings.set_speed(&250i64.into()).await.unwrap();

        controller.fail_settings.store(true, Ordering::SeqCst);
        let err = settings.set_speed(&900i64.into()).await.unwrap_err();

        assert!(matches!(err, MatrixError::Delivery(_)));
        assert_eq!(settings.current().speed_ms, 250);
        assert_eq!(settings.current().frame_delay(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn speed_saturates_at_one_minute() {
        let settings = guard(MockController::new());
        assert_eq!(settings.set_speed(&1e9.into()).await.unwrap(), 60_000);
    }
}
