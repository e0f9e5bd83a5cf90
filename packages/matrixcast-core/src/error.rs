//! Centralized error types for the MatrixCast core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::codec::{CodecError, DecodeError};
use crate::controller::ControllerError;
use crate::store::StoreError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DecodeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "raster_read_failed",
            Self::Image(_) => "unsupported_raster",
            Self::NoFrames => "raster_has_no_frames",
        }
    }
}

impl ErrorCode for ControllerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "controller_request_failed",
            Self::HttpStatus(_, _) => "controller_error_status",
            Self::Encode(_) => "controller_body_encoding_failed",
        }
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateKey(_) => "duplicate_key",
            Self::Io(_) => "store_io_failed",
            Self::Serialization(_) => "store_corrupt_record",
        }
    }
}

/// Application-wide error type for the MatrixCast server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum MatrixError {
    /// Uploaded file could not be parsed as a supported raster format.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Two grids of one animation differ in length (internal invariant violation).
    #[error("Grid size mismatch: {0}")]
    GridSizeMismatch(String),

    /// Another delivery job is already sending to the controller.
    #[error("A picture is already being applied")]
    Busy,

    /// Requested picture id does not exist.
    #[error("Picture not found: {0}")]
    NotFound(String),

    /// Transport failure while talking to the matrix controller.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Client sent a value that is not usable (e.g. non-numeric setting).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A record with the same id already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Persistence or file-system failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Server configuration error (missing or invalid settings).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatrixError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::GridSizeMismatch(_) => "grid_size_mismatch",
            Self::Busy => "busy",
            Self::NotFound(_) => "not_found",
            Self::Delivery(_) => "delivery_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::Storage(_) => "storage_error",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Busy | Self::DuplicateKey(_) => StatusCode::CONFLICT,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type MatrixResult<T> = Result<T, MatrixError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for MatrixError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DecodeError> for MatrixError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<CodecError> for MatrixError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::GridSizeMismatch { .. } => Self::GridSizeMismatch(err.to_string()),
            CodecError::NoFrames | CodecError::UnresolvedDelay { .. } => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<ControllerError> for MatrixError {
    fn from(err: ControllerError) -> Self {
        Self::Delivery(err.to_string())
    }
}

impl From<StoreError> for MatrixError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(id) => Self::DuplicateKey(id),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_conflict() {
        let err = MatrixError::Busy;
        assert_eq!(err.code(), "busy");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = MatrixError::NotFound("abc".into());
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn delivery_maps_to_500() {
        let err = MatrixError::Delivery("connection refused".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn duplicate_store_key_is_lifted_to_duplicate_key() {
        let err: MatrixError = StoreError::DuplicateKey("id-1".into()).into();
        assert!(matches!(err, MatrixError::DuplicateKey(ref id) if id == "id-1"));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn grid_mismatch_keeps_its_own_variant() {
        let err: MatrixError = CodecError::GridSizeMismatch {
            previous: 4,
            current: 9,
        }
        .into();
        assert_eq!(err.code(), "grid_size_mismatch");
    }
}
