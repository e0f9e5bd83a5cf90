//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the matrix controller firmware and changing
//! them would break compatibility with deployed devices.

// ─────────────────────────────────────────────────────────────────────────────
// Controller Endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Endpoint accepting `{"brightness": n}`.
pub const BRIGHTNESS_ENDPOINT: &str = "/setBrightness";

/// Endpoint accepting `{"frameDelay": ms}`.
pub const SPEED_ENDPOINT: &str = "/setSpeed";

/// Endpoint accepting a static `{"seg":{"i":[...]}}` fragment.
pub const PICTURE_ENDPOINT: &str = "/setPicture";

/// Endpoint accepting one animation fragment envelope.
pub const ANIMATION_FRAGMENT_ENDPOINT: &str = "/setAnimationFragment";

// ─────────────────────────────────────────────────────────────────────────────
// Device Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Brightness applied before any value has been set.
pub const DEFAULT_BRIGHTNESS: u8 = 20;

/// Lowest brightness the controller accepts (0 would switch the matrix off).
pub const MIN_BRIGHTNESS: u8 = 1;

/// Highest brightness the controller accepts.
pub const MAX_BRIGHTNESS: u8 = 255;

/// Frame delay applied before any value has been set (ms).
pub const DEFAULT_SPEED_MS: u32 = 500;

/// Shortest frame delay (ms).
pub const MIN_SPEED_MS: u32 = 0;

/// Longest frame delay (ms).
pub const MAX_SPEED_MS: u32 = 60_000;

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Default upper bound on color/id entries per fragment.
///
/// The controller parses each request into a fixed-size buffer; 256 entries
/// covers a full 16x16 panel in one request.
pub const DEFAULT_MAX_FRAGMENT_ELEMENTS: usize = 256;

/// Opacity at or above which a pixel keeps its color.
pub const OPAQUE_ALPHA: u8 = 255;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for controller HTTP requests (seconds).
pub const CONTROLLER_TIMEOUT_SECS: u64 = 10;

/// Maximum accepted upload body (bytes).
pub const MAX_UPLOAD_BODY_SIZE: usize = 32 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier returned by the health endpoint.
pub const SERVICE_ID: &str = "matrixcast";
