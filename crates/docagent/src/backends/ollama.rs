//! Minimal client for Ollama-compatible model servers.
//!
//! Only the two endpoints the backends need: `POST /api/generate` (non-streaming) and
//! `GET /api/tags` as a liveness probe.

use crate::core::io;
use crate::{AgentError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Environment variable overriding every backend's `base_url`.
pub const BASE_URL_ENV: &str = "OLLAMA_BASE_URL";

/// Timeout of the `/api/tags` liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<RequestOptions>,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            prompt,
            images: Vec::new(),
            stream: false,
            options: None,
        }
    }

    pub fn with_image(mut self, image_base64: String) -> Self {
        self.images.push(image_base64);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.options = temperature.map(|temperature| RequestOptions { temperature });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestOptions {
    pub temperature: f32,
}

/// Response of a non-streaming generate call. Missing counters default to 0.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub eval_count: u64,
    #[serde(default)]
    pub prompt_eval_count: u64,
}

/// Connection settings shared by the Ollama-backed plugins, read from their `config` block.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl OllamaSettings {
    /// Read settings from a plugin config block, then apply environment overrides.
    ///
    /// `OLLAMA_BASE_URL` and `model_env` win over the config block. The model falls back to
    /// `default_model` when neither names one.
    pub fn from_config(config: &Value, model_env: &str, default_model: &str) -> Result<Self> {
        let mut settings: OllamaSettings = match config {
            Value::Null => serde_json::from_value(Value::Object(Default::default()))?,
            other => serde_json::from_value(other.clone())
                .map_err(|e| AgentError::config_with_source("Invalid Ollama backend config", e))?,
        };

        if let Some(base_url) = non_empty_env(BASE_URL_ENV) {
            settings.base_url = base_url;
        }
        if let Some(model) = non_empty_env(model_env) {
            settings.model = Some(model);
        }
        if settings.model.as_deref().is_none_or(str::is_empty) {
            settings.model = Some(default_model.to_string());
        }
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();

        if settings.base_url.is_empty() {
            return Err(AgentError::config("Ollama base_url cannot be empty"));
        }
        Ok(settings)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// HTTP client bound to one model server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    probe: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AgentError::config_with_source("Failed to build HTTP client", e))?;
        let probe = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| AgentError::config_with_source("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            probe,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &OllamaSettings) -> Result<Self> {
        Self::new(&settings.base_url, settings.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run a non-streaming generation.
    ///
    /// # Errors
    ///
    /// `RemoteCall` for transport failures, non-2xx statuses and undecodable bodies.
    pub async fn generate(&self, request: &GenerateRequest<'_>) -> Result<GenerateResponse> {
        let url = self.endpoint("/api/generate");
        tracing::debug!(
            url = %url,
            model = request.model,
            images = request.images.len(),
            "Sending generate request"
        );

        let response = self.http.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::remote_call(url, format!("status {}: {}", status, body)));
        }

        let body: GenerateResponse = response.json().await?;
        tracing::debug!(
            eval_count = body.eval_count,
            prompt_eval_count = body.prompt_eval_count,
            "Generate request completed"
        );
        Ok(body)
    }

    /// `true` iff `GET /api/tags` answers with a 2xx status within the probe timeout.
    pub async fn is_reachable(&self) -> bool {
        let url = self.endpoint("/api/tags");
        match self.probe.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Liveness probe failed");
                false
            }
        }
    }
}

/// Base64-encode raw image bytes for the `images` field.
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Read and base64-encode an image file.
pub async fn encode_image_file(path: &Path) -> Result<String> {
    let bytes = io::read_document(path).await?;
    Ok(encode_image(&bytes))
}
