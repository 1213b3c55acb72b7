//! GLM-OCR engine served through an Ollama-compatible endpoint.
//!
//! Plain recognition sends one of the task prompts. When [`OcrOptions::schema`] is set the
//! engine switches to schema-guided extraction: the prompt embeds the schema, the result is
//! tagged `task: structured_extraction` and the parsed model output lands in
//! `metadata.structured_data` (`null` if it is not JSON).

use crate::backends::ollama::{self, GenerateRequest, OllamaClient, OllamaSettings};
use crate::plugins::{Lifecycle, OcrEngine, Plugin, PluginState};
use crate::prompts;
use crate::types::{OcrOptions, OcrResult};
use crate::{AgentError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Environment variable overriding the configured model.
pub const MODEL_ENV: &str = "GLM_OCR_MODEL";
pub const DEFAULT_MODEL: &str = "glm-ocr";

/// The model reports no per-token confidence; results carry this fixed value.
const FIXED_CONFIDENCE: f64 = 0.9;

const STRUCTURED_TASK: &str = "structured_extraction";

struct Connection {
    client: OllamaClient,
    model: String,
}

fn connect(config: &Value) -> Result<Connection> {
    let settings = OllamaSettings::from_config(config, MODEL_ENV, DEFAULT_MODEL)?;
    Ok(Connection {
        client: OllamaClient::from_settings(&settings)?,
        model: settings.model().to_string(),
    })
}

pub struct GlmOcrEngine {
    lifecycle: Lifecycle,
    connection: RwLock<Option<Arc<Connection>>>,
}

impl GlmOcrEngine {
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
            .ok_or_else(|| AgentError::ocr("glm-ocr engine is not initialized"))
    }
}

impl Default for GlmOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for GlmOcrEngine {
    fn name(&self) -> &str {
        "glm-ocr"
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn state(&self) -> PluginState {
        self.lifecycle.get()
    }

    fn initialize(&self, config: &Value) -> Result<()> {
        let connection = connect(config).inspect_err(|_| self.lifecycle.set(PluginState::Failed))?;

        tracing::info!(
            base_url = connection.client.base_url(),
            model = %connection.model,
            "GLM-OCR engine initialized"
        );
        *self
            .connection
            .write()
            .map_err(|e| AgentError::LockPoisoned(e.to_string()))? = Some(Arc::new(connection));
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

    fn description(&self) -> &str {
        "GLM-OCR vision model for text, formula and table recognition"
    }
}

#[async_trait]
impl OcrEngine for GlmOcrEngine {
    async fn process(&self, path: &Path, options: &OcrOptions) -> Result<OcrResult> {
        let connection = self.connection()?;
        let image = ollama::encode_image_file(path).await?;

        let prompt = build_prompt(options)?;

        let request = GenerateRequest::new(&connection.model, &prompt).with_image(image);
        let response = connection.client.generate(&request).await?;

        let mut result = build_result(response.response, &connection.model, options);
        result.set_engine(self.name());
        Ok(result)
    }
}

fn build_prompt(options: &OcrOptions) -> Result<String> {
    Ok(match &options.schema {
        Some(schema) => prompts::schema_prompt(&serde_json::to_string_pretty(schema)?),
        None => prompts::ocr_task_prompt(options.task).to_string(),
    })
}

fn build_result(text: String, model: &str, options: &OcrOptions) -> OcrResult {
    let mut result = OcrResult::new(text);
    result.confidence = FIXED_CONFIDENCE;

    let task = match options.schema {
        Some(_) => STRUCTURED_TASK,
        None => options.task.as_str(),
    };
    let metadata = &mut result.metadata;
    metadata.insert("task".to_string(), Value::String(task.to_string()));
    metadata.insert("model".to_string(), Value::String(model.to_string()));

    if options.schema.is_some() {
        let structured = parse_structured_output(&result.text).unwrap_or(Value::Null);
        result.metadata.insert("structured_data".to_string(), structured);
    }
    result
}

/// Parse model output as JSON, tolerating a surrounding markdown code fence.
fn parse_structured_output(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))?
        .strip_suffix("```")?;
    serde_json::from_str(inner.trim()).ok()
}
