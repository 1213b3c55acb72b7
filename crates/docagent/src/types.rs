//! Result and request types shared by every backend.
//!
//! [`OcrResult`] and [`LlmResponse`] are the stable, JSON-serializable result surface of the
//! agent. They are plain values created per request and owned by the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::AgentError;

/// Open key-value metadata attached to results.
pub type Metadata = Map<String, Value>;

/// Axis-aligned bounding box `[x1, y1, x2, y2]` in image pixel coordinates.
///
/// Serializes as a plain four element array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox(pub [f64; 4]);

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self([x1, y1, x2, y2])
    }

    pub fn x1(&self) -> f64 {
        self.0[0]
    }

    pub fn y1(&self) -> f64 {
        self.0[1]
    }

    pub fn x2(&self) -> f64 {
        self.0[2]
    }

    pub fn y2(&self) -> f64 {
        self.0[3]
    }

    /// Union of two boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.x1().min(other.x1()),
            self.y1().min(other.y1()),
            self.x2().max(other.x2()),
            self.y2().max(other.y2()),
        )
    }
}

/// A positioned unit of text reported by an OCR engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub bbox: BoundingBox,
    #[serde(default)]
    pub text: String,
    /// Block type tag such as `text`, `table`, `formula` or `figure`.
    #[serde(rename = "type", default = "default_block_type")]
    pub block_type: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub page: usize,
}

fn default_block_type() -> String {
    "text".to_string()
}

/// A layout box normalized for block-level processing, with its extraction order as `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub id: usize,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(rename = "type", default = "default_block_type")]
    pub block_type: String,
    #[serde(default)]
    pub page: usize,
}

impl LayoutBlock {
    pub fn from_box(id: usize, layout_box: &LayoutBox) -> Self {
        Self {
            id,
            bbox: layout_box.bbox,
            text: layout_box.text.clone(),
            confidence: layout_box.confidence,
            block_type: layout_box.block_type.clone(),
            page: layout_box.page,
        }
    }
}

/// Result of an OCR request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    #[serde(default)]
    pub boxes: Vec<LayoutBox>,
    /// Aggregate confidence in `[0.0, 1.0]`.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl OcrResult {
    /// A result with the given text, no boxes and zero confidence.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            boxes: Vec::new(),
            confidence: 0.0,
            metadata: Metadata::new(),
        }
    }

    /// The zero-confidence marker used for a failed item inside a batch.
    pub fn error_marker(engine: &str, error: &AgentError) -> Self {
        let mut result = Self::new("");
        result.set_engine(engine);
        result
            .metadata
            .insert("error".to_string(), Value::String(error.to_string()));
        result
    }

    /// Provenance engine name, if recorded.
    pub fn engine(&self) -> Option<&str> {
        self.metadata.get("engine").and_then(Value::as_str)
    }

    pub fn set_engine(&mut self, engine: &str) {
        self.metadata
            .insert("engine".to_string(), Value::String(engine.to_string()));
    }

    /// Error message recorded by a batch failure marker.
    pub fn error(&self) -> Option<&str> {
        self.metadata.get("error").and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.metadata.contains_key("error")
    }
}

/// Response from an LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    /// Completion tokens reported by the backend, 0 if unknown.
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl LlmResponse {
    pub fn new(text: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            text: text.into(),
            tokens_used,
            metadata: Metadata::new(),
        }
    }
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// Recognition task requested from an OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrTask {
    #[default]
    Text,
    Formula,
    Table,
}

impl OcrTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrTask::Text => "text",
            OcrTask::Formula => "formula",
            OcrTask::Table => "table",
        }
    }
}

impl FromStr for OcrTask {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OcrTask::Text),
            "formula" => Ok(OcrTask::Formula),
            "table" => Ok(OcrTask::Table),
            other => Err(AgentError::validation(format!(
                "Unknown OCR task '{}': expected text, formula or table",
                other
            ))),
        }
    }
}

/// Per-request options for OCR engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOptions {
    #[serde(default)]
    pub task: OcrTask,
    /// JSON schema guiding structured extraction, for engines that support it.
    #[serde(default)]
    pub schema: Option<Value>,
    /// Language hint (e.g. `eng`), for engines that support it.
    #[serde(default)]
    pub language: Option<String>,
}

impl OcrOptions {
    pub fn with_task(task: OcrTask) -> Self {
        Self {
            task,
            ..Default::default()
        }
    }
}

/// Per-request options for LLM generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Request mode of the OCR pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Single OCR engine pass.
    #[default]
    Fast,
    /// Layout extraction plus two-pass vision-LLM reasoning.
    Thinking,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Fast => write!(f, "fast"),
            ProcessingMode::Thinking => write!(f, "thinking"),
        }
    }
}

impl FromStr for ProcessingMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(ProcessingMode::Fast),
            "thinking" => Ok(ProcessingMode::Thinking),
            other => Err(AgentError::validation(format!(
                "Mode must be 'fast' or 'thinking', got '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bbox_serializes_as_array() {
        let bbox = BoundingBox::new(0.0, 50.0, 10.0, 60.0);
        assert_eq!(serde_json::to_value(bbox).unwrap(), json!([0.0, 50.0, 10.0, 60.0]));
    }

    #[test]
    fn test_layout_box_json_shape() {
        let value = json!({"bbox": [1, 2, 3, 4], "text": "Total", "type": "table", "confidence": 0.9, "page": 1});
        let layout_box: LayoutBox = serde_json::from_value(value).unwrap();
        assert_eq!(layout_box.block_type, "table");
        assert_eq!(layout_box.bbox.y1(), 2.0);

        let defaults: LayoutBox = serde_json::from_value(json!({"bbox": [0, 0, 1, 1]})).unwrap();
        assert_eq!(defaults.block_type, "text");
        assert_eq!(defaults.confidence, 0.0);
    }

    #[test]
    fn test_ocr_result_json_shape() {
        let mut result = OcrResult::new("hello");
        result.confidence = 0.9;
        result.set_engine("glm");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["text"], "hello");
        assert_eq!(value["boxes"], json!([]));
        assert_eq!(value["metadata"]["engine"], "glm");
    }

    #[test]
    fn test_error_marker() {
        let marker = OcrResult::error_marker("glm", &AgentError::ocr("boom"));
        assert_eq!(marker.text, "");
        assert_eq!(marker.confidence, 0.0);
        assert_eq!(marker.engine(), Some("glm"));
        assert_eq!(marker.error(), Some("OCR error: boom"));
        assert!(marker.is_error());
    }

    #[test]
    fn test_processing_mode_parse() {
        assert_eq!("fast".parse::<ProcessingMode>().unwrap(), ProcessingMode::Fast);
        assert_eq!("Thinking".parse::<ProcessingMode>().unwrap(), ProcessingMode::Thinking);
        assert!("slow".parse::<ProcessingMode>().is_err());
        assert_eq!(ProcessingMode::Thinking.to_string(), "thinking");
    }

    #[test]
    fn test_ocr_task_parse() {
        assert_eq!("table".parse::<OcrTask>().unwrap(), OcrTask::Table);
        assert_eq!(OcrTask::default().as_str(), "text");
        assert!("handwriting".parse::<OcrTask>().is_err());
    }
}
