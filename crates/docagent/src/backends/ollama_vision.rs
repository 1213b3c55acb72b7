//! Vision LLM provider backed by an Ollama-compatible server (Qwen3-VL and similar models).

use crate::backends::ollama::{self, GenerateRequest, GenerateResponse, OllamaClient, OllamaSettings};
use crate::plugins::{Lifecycle, LlmProvider, Plugin, PluginState, VisionLlmProvider};
use crate::types::{GenerateOptions, LlmResponse};
use crate::{AgentError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Environment variable overriding the configured model.
pub const MODEL_ENV: &str = "QWEN3_VL_MODEL";
pub const DEFAULT_MODEL: &str = "qwen3-vl";

struct Connection {
    client: OllamaClient,
    model: String,
}

pub struct OllamaVisionProvider {
    lifecycle: Lifecycle,
    connection: RwLock<Option<Arc<Connection>>>,
}

impl OllamaVisionProvider {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            connection: RwLock::new(None),
        }
    }

    fn connection(&self) -> Result<Arc<Connection>> {
        self.connection
            .read()
            .map_err(|e| AgentError::LockPoisoned(e.to_string()))?
            .clone()
            .ok_or_else(|| AgentError::Other(format!("{} provider is not initialized", self.name())))
    }

    fn to_response(&self, model: &str, body: GenerateResponse, with_image: bool) -> LlmResponse {
        let mut response = LlmResponse::new(body.response, body.eval_count);
        let metadata = &mut response.metadata;
        metadata.insert("model".to_string(), Value::String(model.to_string()));
        metadata.insert("provider".to_string(), Value::String(self.name().to_string()));
        if with_image {
            metadata.insert("with_image".to_string(), Value::Bool(true));
        }
        metadata.insert("prompt_tokens".to_string(), body.prompt_eval_count.into());
        metadata.insert("completion_tokens".to_string(), body.eval_count.into());
        response
    }
}

impl Default for OllamaVisionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for OllamaVisionProvider {
    fn name(&self) -> &str {
        "ollama-vision"
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn state(&self) -> PluginState {
        self.lifecycle.get()
    }

    fn initialize(&self, config: &Value) -> Result<()> {
        let settings = OllamaSettings::from_config(config, MODEL_ENV, DEFAULT_MODEL)
            .inspect_err(|_| self.lifecycle.set(PluginState::Failed))?;
        let client = OllamaClient::from_settings(&settings).inspect_err(|_| self.lifecycle.set(PluginState::Failed))?;

        tracing::info!(base_url = client.base_url(), model = settings.model(), "Vision provider initialized");
        *self
            .connection
            .write()
            .map_err(|e| AgentError::LockPoisoned(e.to_string()))? = Some(Arc::new(Connection {
            client,
            model: settings.model().to_string(),
        }));
        self.lifecycle.set(PluginState::Initialized);
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.connection
            .write()
            .map_err(|e| AgentError::LockPoisoned(e.to_string()))?
            .take();
        self.lifecycle.set(PluginState::CleanedUp);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.connection() {
            Ok(connection) => connection.client.is_reachable().await,
            Err(_) => false,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaVisionProvider {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<LlmResponse> {
        let connection = self.connection()?;
        let request = GenerateRequest::new(&connection.model, prompt).with_temperature(options.temperature);

        let body = connection.client.generate(&request).await.inspect_err(|e| {
            tracing::error!(provider = self.name(), error = %e, "Generation failed");
        })?;
        Ok(self.to_response(&connection.model, body, false))
    }

    fn model(&self) -> Option<String> {
        self.connection().ok().map(|connection| connection.model.clone())
    }

    fn as_vision(&self) -> Option<&dyn VisionLlmProvider> {
        Some(self)
    }
}

#[async_trait]
impl VisionLlmProvider for OllamaVisionProvider {
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &Path,
        options: &GenerateOptions,
    ) -> Result<LlmResponse> {
        let connection = self.connection()?;
        let image = ollama::encode_image_file(image).await?;
        let request = GenerateRequest::new(&connection.model, prompt)
            .with_image(image)
            .with_temperature(options.temperature);

        let body = connection.client.generate(&request).await.inspect_err(|e| {
            tracing::error!(provider = self.name(), error = %e, "Image generation failed");
        })?;
        Ok(self.to_response(&connection.model, body, true))
    }
}
