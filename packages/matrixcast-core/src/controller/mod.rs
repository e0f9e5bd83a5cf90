//! Client side of the pixel-matrix controller protocol.
//!
//! The controller accepts one JSON body per call and must receive fragments
//! one at a time, in order. Services talk to it through the
//! [`MatrixController`] trait so tests can swap in a recording mock.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpMatrixController;

use async_trait::async_trait;
use thiserror::Error;

use crate::codec::WireFragment;

/// Errors that can occur while talking to the matrix controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// HTTP request to the controller failed (connect, timeout, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Controller answered with a non-success status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Convenient Result alias for controller calls.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Operations understood by the matrix controller.
#[async_trait]
pub trait MatrixController: Send + Sync {
    /// Sets display brightness (`1..=255`).
    async fn set_brightness(&self, brightness: u8) -> ControllerResult<()>;

    /// Sets the animation frame delay in milliseconds.
    async fn set_speed(&self, frame_delay_ms: u32) -> ControllerResult<()>;

    /// Sends one rendered fragment and waits for the controller to accept it.
    async fn send_fragment(&self, fragment: &WireFragment) -> ControllerResult<()>;
}
