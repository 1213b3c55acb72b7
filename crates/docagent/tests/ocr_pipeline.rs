//! Fast and thinking mode OCR pipeline tests with mock engines and a mock vision LLM.

use async_trait::async_trait;
use docagent::plugins::{Lifecycle, LlmProvider, OcrEngine, Plugin, PluginState, VisionLlmProvider};
use docagent::types::{BoundingBox, LayoutBlock, LayoutBox};
use docagent::{
    AgentError, GenerateOptions, LlmResponse, OcrOptions, OcrProcessor, OcrResult, ProcessingMode, Result,
};
use image::{ImageBuffer, ImageFormat, Rgb};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

fn sample_png(width: u32, height: u32) -> NamedTempFile {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgb([20u8, 20u8, 20u8])
        } else {
            Rgb([240u8, 240u8, 240u8])
        }
    });
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    img.save_with_format(file.path(), ImageFormat::Png).unwrap();
    file
}

struct ScriptedEngine {
    name: &'static str,
    lifecycle: Lifecycle,
    healthy: bool,
    layout: bool,
    calls: Mutex<Vec<PathBuf>>,
}

impl ScriptedEngine {
    fn new(name: &'static str, healthy: bool, layout: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            lifecycle: Lifecycle::new(),
            healthy,
            layout,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Plugin for ScriptedEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn state(&self) -> PluginState {
        self.lifecycle.get()
    }

    fn initialize(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}

#[async_trait]
impl OcrEngine for ScriptedEngine {
    async fn process(&self, path: &Path, _options: &OcrOptions) -> Result<OcrResult> {
        self.calls.lock().unwrap().push(path.to_path_buf());

        if path.extension().and_then(|e| e.to_str()) == Some("bad") {
            return Err(AgentError::ocr("unreadable input"));
        }

        if !self.layout {
            let mut result = OcrResult::new(format!("plain text from {}", self.name));
            result.confidence = 0.9;
            return Ok(result);
        }

        let mut result = OcrResult::new("ignored");
        result.boxes = vec![
            LayoutBox {
                bbox: BoundingBox::new(0.0, 40.0, 60.0, 60.0),
                text: "Pressure 4.2 bar".to_string(),
                block_type: "text".to_string(),
                confidence: 0.8,
                page: 0,
            },
            LayoutBox {
                bbox: BoundingBox::new(0.0, 0.0, 60.0, 20.0),
                text: "PUMP STATION 3".to_string(),
                block_type: "title".to_string(),
                confidence: 1.0,
                page: 0,
            },
        ];
        Ok(result)
    }

    fn supports_layout(&self) -> bool {
        self.layout
    }
}

/// Answers image prompts with an extraction and text prompts with an analysis.
struct MockVision {
    lifecycle: Lifecycle,
    healthy: bool,
    fail_analysis: bool,
    prompts: Mutex<Vec<(String, bool)>>,
}

impl MockVision {
    fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            healthy,
            fail_analysis: false,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Plugin for MockVision {
    fn name(&self) -> &str {
        "mock-vision"
    }

    fn version(&self) -> String {
        "2.0.0".to_string()
    }

    fn state(&self) -> PluginState {
        self.lifecycle.get()
    }

    fn initialize(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}

#[async_trait]
impl LlmProvider for MockVision {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push((prompt.to_string(), false));
        if self.fail_analysis {
            return Err(AgentError::remote_call("http://mock/api/generate", "model unloaded"));
        }
        Ok(LlmResponse::new("analysis: station nominal", 40))
    }

    fn model(&self) -> Option<String> {
        Some("mock-vl:7b".to_string())
    }

    fn as_vision(&self) -> Option<&dyn VisionLlmProvider> {
        Some(self)
    }
}

#[async_trait]
impl VisionLlmProvider for MockVision {
    async fn generate_with_image(
        &self,
        prompt: &str,
        _image: &Path,
        _options: &GenerateOptions,
    ) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push((prompt.to_string(), true));
        Ok(LlmResponse::new("extraction: pump station, 4.2 bar", 120))
    }
}

/// Text-only provider.
struct BlindLlm {
    lifecycle: Lifecycle,
}

#[async_trait]
impl Plugin for BlindLlm {
    fn name(&self) -> &str {
        "blind"
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn state(&self) -> PluginState {
        self.lifecycle.get()
    }

    fn initialize(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl LlmProvider for BlindLlm {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<LlmResponse> {
        Ok(LlmResponse::new("text only", 1))
    }
}

/// Vision provider with its own single-call block structuring.
struct StructuringVision {
    lifecycle: Lifecycle,
    received: Mutex<Vec<String>>,
}

#[async_trait]
impl Plugin for StructuringVision {
    fn name(&self) -> &str {
        "structuring"
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn state(&self) -> PluginState {
        self.lifecycle.get()
    }

    fn initialize(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl LlmProvider for StructuringVision {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<LlmResponse> {
        Ok(LlmResponse::new("default-pass2", 1))
    }

    fn model(&self) -> Option<String> {
        Some("base-vl".to_string())
    }

    fn as_vision(&self) -> Option<&dyn VisionLlmProvider> {
        Some(self)
    }
}

#[async_trait]
impl VisionLlmProvider for StructuringVision {
    async fn generate_with_image(
        &self,
        _prompt: &str,
        _image: &Path,
        _options: &GenerateOptions,
    ) -> Result<LlmResponse> {
        Ok(LlmResponse::new("default-pass1", 1))
    }

    async fn structure_blocks(
        &self,
        _image: &Path,
        blocks: &[LayoutBlock],
        _options: &GenerateOptions,
    ) -> Result<LlmResponse> {
        self.received
            .lock()
            .unwrap()
            .extend(blocks.iter().map(|b| b.text.clone()));
        let mut response = LlmResponse::new("custom-structure", 33);
        response
            .metadata
            .insert("model".to_string(), Value::String("structuring-vl".to_string()));
        Ok(response)
    }
}

fn engines(list: Vec<Arc<ScriptedEngine>>) -> IndexMap<String, Arc<dyn OcrEngine>> {
    list.into_iter()
        .map(|engine| (engine.name.to_string(), engine as Arc<dyn OcrEngine>))
        .collect()
}

#[tokio::test]
async fn test_fast_mode_prefers_healthy_active_engine() {
    let file = sample_png(32, 32);
    let first = ScriptedEngine::new("first", true, false);
    let second = ScriptedEngine::new("second", true, false);
    let processor = OcrProcessor::new(engines(vec![first.clone(), second.clone()])).with_active_engine("second");

    let result = processor.process(file.path(), ProcessingMode::Fast).await.unwrap();

    assert_eq!(result.text, "plain text from second");
    assert_eq!(result.engine(), Some("second"));
    assert_eq!(result.metadata["mode"], "fast");
    assert!(first.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fast_mode_falls_back_when_active_is_unhealthy() {
    let file = sample_png(32, 32);
    let processor = OcrProcessor::new(engines(vec![
        ScriptedEngine::new("down", false, false),
        ScriptedEngine::new("up", true, false),
    ]))
    .with_active_engine("down");

    let result = processor.process_fast(file.path()).await.unwrap();
    assert_eq!(result.engine(), Some("up"));
}

#[tokio::test]
async fn test_fast_mode_without_usable_engine() {
    let file = sample_png(8, 8);

    let err = OcrProcessor::new(IndexMap::new())
        .process_fast(file.path())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::NoEngineAvailable(_)));

    let err = OcrProcessor::new(engines(vec![ScriptedEngine::new("down", false, false)]))
        .process_fast(file.path())
        .await
        .unwrap_err();
    match err {
        AgentError::NoEngineAvailable(message) => assert!(message.contains("none healthy")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_thinking_mode_runs_two_passes_over_layout_blocks() {
    let file = sample_png(64, 64);
    let plain = ScriptedEngine::new("plain", true, false);
    let layout = ScriptedEngine::new("layout", true, true);
    let vision = MockVision::new(true);

    let processor = OcrProcessor::new(engines(vec![plain.clone(), layout]))
        .with_llm("qwen", vision.clone() as Arc<dyn LlmProvider>);

    let result = processor.process(file.path(), ProcessingMode::Thinking).await.unwrap();

    assert_eq!(result.text, "analysis: station nominal");
    assert!((result.confidence - 0.9).abs() < 1e-9);
    assert_eq!(result.engine(), Some("layout"));
    assert_eq!(result.boxes.len(), 2);

    let metadata = &result.metadata;
    assert_eq!(metadata["mode"], "thinking");
    assert_eq!(metadata["blocks_count"], 2);
    assert_eq!(metadata["pass1_extraction"], "extraction: pump station, 4.2 bar");
    assert_eq!(metadata["pass1_tokens"], 120);
    assert_eq!(metadata["pass2_tokens"], 40);
    assert_eq!(metadata["total_tokens"], 160);
    assert_eq!(metadata["llm_provider"], "qwen");
    assert_eq!(metadata["llm_model"], "mock-vl:7b");
    assert!(metadata.get("degraded").is_none());

    let prompts = vision.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].1, "first pass must carry the image");
    assert!(prompts[0].0.contains("PUMP STATION 3"));
    assert!(prompts[0].0.contains("Pressure 4.2 bar"));
    assert!(!prompts[1].1, "second pass is text-only");
    assert!(prompts[1].0.contains("extraction: pump station, 4.2 bar"));

    assert!(plain.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_thinking_mode_uses_provider_block_structuring() {
    let file = sample_png(64, 64);
    let vision = Arc::new(StructuringVision {
        lifecycle: Lifecycle::new(),
        received: Mutex::new(Vec::new()),
    });

    let processor = OcrProcessor::new(engines(vec![ScriptedEngine::new("layout", true, true)]))
        .with_llm("custom", vision.clone() as Arc<dyn LlmProvider>);

    let result = processor.process_thinking(file.path()).await.unwrap();

    assert_eq!(result.text, "custom-structure");
    assert_eq!(result.metadata["total_tokens"], 33);
    assert_eq!(result.metadata["llm_provider"], "custom");
    assert_eq!(result.metadata["llm_model"], "structuring-vl");
    assert!(result.metadata.get("pass1_extraction").is_none());
    assert!(result.metadata.get("pass1_tokens").is_none());
    assert_eq!(vision.received.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_thinking_mode_without_layout_uses_whole_page_block() {
    let file = sample_png(120, 80);
    let processor = OcrProcessor::new(engines(vec![ScriptedEngine::new("plain", true, false)]))
        .with_llm("qwen", MockVision::new(true) as Arc<dyn LlmProvider>);

    let result = processor.process_thinking(file.path()).await.unwrap();

    assert_eq!(result.metadata["blocks_count"], 1);
    assert_eq!(result.boxes[0].block_type, "page");
    assert_eq!(result.boxes[0].bbox, BoundingBox::new(0.0, 0.0, 120.0, 80.0));
    assert_eq!(result.boxes[0].text, "plain text from plain");
    assert_eq!(result.engine(), Some("plain"));
}

#[tokio::test]
async fn test_thinking_mode_degrades_without_vision_llm() {
    let file = sample_png(32, 32);
    let layout = || engines(vec![ScriptedEngine::new("layout", true, true)]);

    let no_llm = OcrProcessor::new(layout()).process_thinking(file.path()).await.unwrap();
    assert_eq!(no_llm.metadata["degraded"], true);
    assert_eq!(no_llm.text, "PUMP STATION 3\n\nPressure 4.2 bar");
    assert!((no_llm.confidence - 0.9).abs() < 1e-9);

    let blind = OcrProcessor::new(layout())
        .with_llm(
            "blind",
            Arc::new(BlindLlm {
                lifecycle: Lifecycle::new(),
            }) as Arc<dyn LlmProvider>,
        )
        .process_thinking(file.path())
        .await
        .unwrap();
    assert_eq!(blind.metadata["degraded"], true);
    assert!(
        blind.metadata["degraded_reason"]
            .as_str()
            .unwrap()
            .contains("no vision capability")
    );

    let sick = OcrProcessor::new(layout())
        .with_llm("qwen", MockVision::new(false) as Arc<dyn LlmProvider>)
        .process_thinking(file.path())
        .await
        .unwrap();
    assert_eq!(sick.metadata["degraded"], true);
}

#[tokio::test]
async fn test_thinking_mode_propagates_llm_failure() {
    let file = sample_png(32, 32);
    let vision = Arc::new(MockVision {
        lifecycle: Lifecycle::new(),
        healthy: true,
        fail_analysis: true,
        prompts: Mutex::new(Vec::new()),
    });
    let processor = OcrProcessor::new(engines(vec![ScriptedEngine::new("layout", true, true)]))
        .with_llm("qwen", vision as Arc<dyn LlmProvider>);

    let err = processor.process_thinking(file.path()).await.unwrap_err();
    assert!(matches!(err, AgentError::RemoteCall { .. }));
}

#[tokio::test]
async fn test_batch_keeps_one_result_per_input() {
    let engine = ScriptedEngine::new("plain", true, false);
    let paths = vec![PathBuf::from("page-1.png"), PathBuf::from("page-2.bad")];

    let results = engine.batch_process(&paths, &OcrOptions::default()).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(!results[0].is_error());
    assert_eq!(results[0].text, "plain text from plain");
    assert!(results[1].is_error());
    assert_eq!(results[1].confidence, 0.0);
    assert_eq!(results[1].engine(), Some("plain"));
    assert!(results[1].error().unwrap().contains("unreadable input"));
}
