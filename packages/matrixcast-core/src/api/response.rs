//! JSON bodies returned by the picture handlers.
//!
//! Upload rejections use the `{ error, message, status }` shape of
//! [`MatrixError`](crate::MatrixError) responses and add an `errors` list
//! naming each refused file.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::services::IngestedPicture;

/// One file of a multipart upload that was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRejection {
    pub file: String,
    pub error: String,
}

impl FileRejection {
    pub fn new(file: impl Into<String>, error: impl Display) -> Self {
        Self {
            file: file.into(),
            error: error.to_string(),
        }
    }
}

#[derive(Serialize)]
struct UploadRejection<'a> {
    error: &'a str,
    message: String,
    status: u16,
    errors: &'a [FileRejection],
}

pub fn json_ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// `{ "success": true }`
pub fn acknowledged() -> Response {
    json_ok(json!({ "success": true }))
}

/// 400 for an upload that stored nothing.
pub fn upload_rejected(code: &str, message: impl Display, errors: &[FileRejection]) -> Response {
    let status = StatusCode::BAD_REQUEST;
    let body = UploadRejection {
        error: code,
        message: message.to_string(),
        status: status.as_u16(),
        errors,
    };
    (status, Json(body)).into_response()
}

/// Lists the stored pictures together with any files refused alongside them.
pub fn upload_accepted(pictures: &[IngestedPicture], errors: &[FileRejection]) -> Response {
    let uuids: Vec<&str> = pictures.iter().map(|p| p.id.as_str()).collect();
    json_ok(json!({
        "message": "Files uploaded",
        "uuids": uuids,
        "pictures": pictures,
        "errors": errors,
    }))
}
