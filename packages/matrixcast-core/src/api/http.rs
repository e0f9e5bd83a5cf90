//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::response::{
    acknowledged, json_ok, upload_accepted, upload_rejected, FileRejection,
};
use crate::api::AppState;
use crate::error::{MatrixError, MatrixResult};
use crate::protocol_constants::{MAX_UPLOAD_BODY_SIZE, SERVICE_ID};
use crate::services::{ApplyOptions, DeliverySummary, IngestedPicture, Progress, SettingValue};

/// Multipart field carrying uploaded files.
const UPLOAD_FIELD: &str = "pictures";

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct ApplyQuery {
    brightness: Option<String>,
    speed: Option<String>,
}

impl ApplyQuery {
    /// Empty query values count as absent.
    fn into_options(self) -> ApplyOptions {
        let value = |raw: Option<String>| {
            raw.filter(|v| !v.trim().is_empty())
                .map(SettingValue::Text)
        };
        ApplyOptions {
            brightness: value(self.brightness),
            speed: value(self.speed),
        }
    }
}

#[derive(Deserialize)]
struct SettingRequest {
    value: SettingValue,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let previews = ServeDir::new(&state.config.image_dir);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/", get(list_pictures))
        .route("/api/random", get(random_picture))
        .route("/api/upload", post(upload_pictures))
        .route(
            "/api/picture/{id}",
            get(describe_picture).delete(delete_picture),
        )
        .route("/api/apply/status", get(apply_status))
        .route("/api/apply/{id}", post(apply_picture))
        .route("/api/settings", get(get_settings))
        .route("/api/settings/brightness", post(set_brightness))
        .route("/api/settings/speed", post(set_speed))
        .route("/api/checkIntegrity", get(check_integrity))
        .nest_service("/pictures", previews)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
async fn health_check() -> impl IntoResponse {
    json_ok(json!({
        "status": "ok",
        "service": SERVICE_ID,
    }))
}

async fn list_pictures(State(state): State<AppState>) -> MatrixResult<impl IntoResponse> {
    Ok(json_ok(state.library.list_ids().await?))
}

async fn random_picture(State(state): State<AppState>) -> MatrixResult<impl IntoResponse> {
    Ok(json_ok(state.library.random_id().await?))
}

async fn describe_picture(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MatrixResult<impl IntoResponse> {
    Ok(json_ok(state.library.describe(&id).await?))
}

async fn delete_picture(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MatrixResult<impl IntoResponse> {
    state.library.delete(&id).await?;
    Ok(acknowledged())
}

/// Ingests every `pictures` field of a multipart upload.
///
/// Each file succeeds or fails on its own. The request fails with 400 only
/// when no file was stored.
async fn upload_pictures(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut pictures: Vec<IngestedPicture> = Vec::new();
    let mut errors: Vec<FileRejection> = Vec::new();
    let mut accepted: Vec<(String, Bytes)> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                log::warn!("[Server] Malformed upload: {}", e);
                return upload_rejected("invalid_multipart", e, &errors);
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file = field.file_name().unwrap_or("upload").to_string();
        let is_image = field
            .content_type()
            .is_some_and(|mime| mime.starts_with("image/"));
        if !is_image {
            let error = format!(
                "unsupported content type {}",
                field.content_type().unwrap_or("(none)")
            );
            errors.push(FileRejection::new(file, error));
            continue;
        }

        match field.bytes().await {
            Ok(data) => accepted.push((file, data)),
            Err(e) => errors.push(FileRejection::new(file, e)),
        }
    }

    // Files are independent, so they encode concurrently.
    let ingested = join_all(accepted.into_iter().map(|(file, data)| {
        let ingest = Arc::clone(&state.ingest);
        async move {
            let result = ingest.ingest(&file, data).await;
            (file, result)
        }
    }))
    .await;

    for (file, result) in ingested {
        match result {
            Ok(picture) => pictures.push(picture),
            Err(e) => errors.push(FileRejection::new(file, e)),
        }
    }

    if pictures.is_empty() {
        return upload_rejected("no_picture_uploaded", "No picture uploaded", &errors);
    }

    upload_accepted(&pictures, &errors)
}

/// Sends a stored picture to the controller, streaming progress lines.
///
/// Errors raised before the first fragment keep their HTTP status. Once
/// lines are flowing the status is committed, so a failure ends the body
/// with `500 <message>` instead.
async fn apply_picture(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ApplyQuery>,
) -> Response {
    let options = query.into_options();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let delivery = Arc::clone(&state.delivery);
    let job = tokio::spawn(async move { delivery.apply(&id, options, tx).await });

    let Some(first) = rx.recv().await else {
        return match join_job(job).await {
            Ok(summary) => progress_response(Body::from(done_line(summary))),
            Err(e) => e.into_response(),
        };
    };

    let lines = async_stream::stream! {
        yield Ok::<_, Infallible>(Bytes::from(progress_line(first)));
        while let Some(update) = rx.recv().await {
            yield Ok(Bytes::from(progress_line(update)));
        }
        let last = match join_job(job).await {
            Ok(summary) => done_line(summary),
            Err(e) => format!("500 {e}\n"),
        };
        yield Ok(Bytes::from(last));
    };

    progress_response(Body::from_stream(lines))
}

async fn join_job(job: JoinHandle<MatrixResult<DeliverySummary>>) -> MatrixResult<DeliverySummary> {
    job.await
        .map_err(|e| MatrixError::Internal(format!("delivery task failed: {e}")))?
}

fn progress_line(progress: Progress) -> String {
    format!("{} of {}\n", progress.index, progress.total)
}

fn done_line(summary: DeliverySummary) -> String {
    format!("{0} of {0}\n", summary.total)
}

fn progress_response(body: Body) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

async fn apply_status(State(state): State<AppState>) -> impl IntoResponse {
    json_ok(state.delivery.last_job())
}

async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    json_ok(state.settings.current())
}

async fn set_brightness(
    State(state): State<AppState>,
    Json(payload): Json<SettingRequest>,
) -> MatrixResult<impl IntoResponse> {
    state.settings.set_brightness(&payload.value).await?;
    Ok(json_ok(state.settings.current()))
}

async fn set_speed(
    State(state): State<AppState>,
    Json(payload): Json<SettingRequest>,
) -> MatrixResult<impl IntoResponse> {
    state.settings.set_speed(&payload.value).await?;
    Ok(json_ok(state.settings.current()))
}

async fn check_integrity(State(state): State<AppState>) -> MatrixResult<impl IntoResponse> {
    Ok(json_ok(state.integrity.check().await?))
}
