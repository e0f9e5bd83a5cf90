use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ControllerError, ControllerResult, MatrixController};
use crate::codec::WireFragment;
use crate::protocol_constants::{BRIGHTNESS_ENDPOINT, SPEED_ENDPOINT};

/// [`MatrixController`] speaking JSON over HTTP.
#[derive(Clone)]
pub struct HttpMatrixController {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpMatrixController {
    /// Creates a client for the controller at `base_url` (e.g. `http://10.0.0.7`).
    pub fn new(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs a JSON body and checks the response status.
    async fn post_json(&self, endpoint: &str, body: &Value) -> ControllerResult<()> {
        let url = format!("{}{}", self.base_url, endpoint);
        let payload = serde_json::to_vec(body)?;

        log::debug!("[Controller] {} <- {} bytes", endpoint, payload.len());

        let start = Instant::now();
        let res = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(payload)
            .timeout(self.timeout)
            .send()
            .await;

        log::info!(
            "[Controller] {} completed in {:?}: {:?}",
            endpoint,
            start.elapsed(),
            res.as_ref().map(|r| r.status())
        );

        let res = res?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ControllerError::HttpStatus(status.as_u16(), text));
        }

        Ok(())
    }
}

#[async_trait]
impl MatrixController for HttpMatrixController {
    async fn set_brightness(&self, brightness: u8) -> ControllerResult<()> {
        self.post_json(BRIGHTNESS_ENDPOINT, &json!({ "brightness": brightness }))
            .await
    }

    async fn set_speed(&self, frame_delay_ms: u32) -> ControllerResult<()> {
        self.post_json(SPEED_ENDPOINT, &json!({ "frameDelay": frame_delay_ms }))
            .await
    }

    async fn send_fragment(&self, fragment: &WireFragment) -> ControllerResult<()> {
        self.post_json(fragment.endpoint(), fragment.body()).await
    }
}
