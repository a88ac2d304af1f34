//! HTTP façade client
//!
//! The façade wraps the screen-reader automation library and exposes its
//! primitives 1:1. Every endpoint answers with the same JSON envelope.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, trace};

use crate::{DriverError, Result, ScreenReader};

/// Envelope returned by every façade endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacadeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_item: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl FacadeResponse {
    fn into_result(self, endpoint: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(DriverError::Rejected(
                self.error
                    .unwrap_or_else(|| format!("{} failed without an error message", endpoint)),
            ))
        }
    }
}

/// `GET /health` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub voice_over_running: bool,
}

/// [`ScreenReader`] backed by the HTTP façade
pub struct HttpScreenReader {
    client: Client,
    base_url: String,
}

impl HttpScreenReader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<FacadeResponse> {
        trace!("◆ POST {}", endpoint);
        let response = self.client.post(self.url(endpoint)).json(&body).send().await?;
        Self::decode(endpoint, response).await
    }

    async fn get(&self, endpoint: &str) -> Result<FacadeResponse> {
        trace!("◆ GET {}", endpoint);
        let response = self.client.get(self.url(endpoint)).send().await?;
        Self::decode(endpoint, response).await
    }

    async fn decode(endpoint: &str, response: reqwest::Response) -> Result<FacadeResponse> {
        let status = response.status();
        let text = response.text().await?;
        let envelope: FacadeResponse = serde_json::from_str(&text).map_err(|e| {
            DriverError::InvalidResponse(format!("{} ({}): {}", endpoint, status, e))
        })?;
        envelope.into_result(endpoint)
    }

    /// Probe the façade; does not require a started reader
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.client.get(self.url("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Rejected(format!("health check returned {}", status)));
        }
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| DriverError::InvalidResponse(format!("/health: {}", e)))
    }

    /// Launch an application by name so navigation starts inside it
    pub async fn open_app(&self, app_name: &str) -> Result<()> {
        debug!("◆ Opening application {}", app_name);
        self.post("/system/open-app", json!({ "appName": app_name }))
            .await
            .map(|_| ())
    }

    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.post("/system/press-key", json!({ "key": key }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ScreenReader for HttpScreenReader {
    async fn start(&self) -> Result<()> {
        self.post("/voiceover/start", json!({})).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.post("/voiceover/stop", json!({})).await.map(|_| ())
    }

    async fn read_current(&self) -> Result<String> {
        let response = self.get("/voiceover/current").await?;
        Ok(response.current_item.unwrap_or_default())
    }

    async fn move_next(&self) -> Result<()> {
        self.post("/voiceover/next", json!({})).await.map(|_| ())
    }

    async fn move_previous(&self) -> Result<()> {
        self.post("/voiceover/previous", json!({})).await.map(|_| ())
    }

    async fn activate(&self) -> Result<()> {
        self.post("/voiceover/click", json!({})).await.map(|_| ())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.post("/voiceover/type", json!({ "text": text }))
            .await
            .map(|_| ())
    }
}
