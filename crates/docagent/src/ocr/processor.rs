//! Request-level OCR pipeline.
//!
//! Two modes:
//!
//! - **fast**: one pass through the best available engine
//! - **thinking**: layout extraction, then an image-conditioned extraction pass and a
//!   text-only analysis pass on a vision LLM
//!
//! Thinking mode degrades to the OCR-only result, flagged with `metadata.degraded`, when no
//! usable vision LLM is present.

use crate::ocr::layout::LayoutProcessor;
use crate::plugins::{LlmProvider, OcrEngine, VisionLlmProvider};
use crate::types::{BoundingBox, GenerateOptions, LayoutBlock, LayoutBox, OcrOptions, OcrResult, ProcessingMode};
use crate::{AgentError, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Default bound on each engine liveness probe during engine selection.
pub const DEFAULT_SELECTION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

type NamedEngine = (String, Arc<dyn OcrEngine>);

/// Dispatches OCR requests over a set of engines and an optional LLM.
///
/// Built per request (or per batch) from the current registry contents, so it never goes
/// stale when plugins are replaced.
pub struct OcrProcessor {
    engines: IndexMap<String, Arc<dyn OcrEngine>>,
    active: Option<String>,
    llm: Option<(String, Arc<dyn LlmProvider>)>,
    options: OcrOptions,
    generate_options: GenerateOptions,
    probe_timeout: Duration,
}

impl OcrProcessor {
    /// Engines keyed by registry name, in preference order.
    pub fn new(engines: IndexMap<String, Arc<dyn OcrEngine>>) -> Self {
        Self {
            engines,
            active: None,
            llm: None,
            options: OcrOptions::default(),
            generate_options: GenerateOptions::default(),
            probe_timeout: DEFAULT_SELECTION_PROBE_TIMEOUT,
        }
    }

    /// Prefer `name` when it is healthy.
    pub fn with_active_engine(mut self, name: impl Into<String>) -> Self {
        self.active = Some(name.into());
        self
    }

    pub fn with_llm(mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some((name.into(), provider));
        self
    }

    pub fn with_options(mut self, options: OcrOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_generate_options(mut self, options: GenerateOptions) -> Self {
        self.generate_options = options;
        self
    }

    /// Bound on each engine health probe; a probe that overruns counts as unhealthy.
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }

    pub async fn process(&self, path: &Path, mode: ProcessingMode) -> Result<OcrResult> {
        match mode {
            ProcessingMode::Fast => self.process_fast(path).await,
            ProcessingMode::Thinking => self.process_thinking(path).await,
        }
    }

    /// Single pass through the active engine if healthy, else the first healthy engine.
    ///
    /// The active engine is probed on its own first; the others are only probed when it is
    /// missing or unhealthy.
    ///
    /// # Errors
    ///
    /// `NoEngineAvailable` when no engine is healthy; engine errors propagate.
    pub async fn process_fast(&self, path: &Path) -> Result<OcrResult> {
        let (name, engine) = match self.healthy_active_engine().await {
            Some(active) => active,
            None => {
                let healthy = self.healthy_engines().await;
                let (name, engine) = self.select_engine(&healthy)?;
                (name.to_string(), Arc::clone(engine))
            }
        };
        tracing::info!(engine = %name, path = %path.display(), "Fast OCR");

        let mut result = engine.process(path, &self.options).await?;
        result.set_engine(&name);
        result
            .metadata
            .insert("mode".to_string(), Value::String(ProcessingMode::Fast.to_string()));
        Ok(result)
    }

    /// Layout extraction followed by two-pass vision-LLM reasoning.
    ///
    /// The blocks go through [`VisionLlmProvider::structure_blocks`], so providers that
    /// override it control both passes. The result text is the provider's response;
    /// `confidence` always comes from OCR. Metadata carries `total_tokens`, `llm_provider`,
    /// `llm_model` and `blocks_count`, plus `pass1_extraction`, `pass1_tokens` and
    /// `pass2_tokens` when the provider reports them.
    ///
    /// # Errors
    ///
    /// `NoEngineAvailable` when no engine is healthy. LLM failures during either pass
    /// propagate.
    pub async fn process_thinking(&self, path: &Path) -> Result<OcrResult> {
        let healthy = self.healthy_engines().await;
        let (selected_name, selected) = self.select_engine(&healthy)?;

        let (layout_name, layout_engine) = match healthy.iter().find(|(_, engine)| engine.supports_layout()) {
            Some((name, engine)) => (name.clone(), Arc::clone(engine)),
            None => (selected_name.to_string(), Arc::clone(selected)),
        };
        tracing::info!(layout_engine = %layout_name, path = %path.display(), "Thinking OCR: layout extraction");

        let layout = LayoutProcessor::new(layout_engine).with_options(self.options.clone());
        let mut blocks = layout.extract_layout_blocks(path).await;

        let mut base = if blocks.is_empty() {
            tracing::info!(engine = %selected_name, "No layout blocks, falling back to direct OCR");
            let mut direct = selected.process(path, &self.options).await?;
            blocks.push(page_block(path, &direct));
            direct.boxes = blocks.iter().map(to_layout_box).collect();
            direct.set_engine(selected_name);
            direct
        } else {
            let merged = LayoutProcessor::merge_block_results(&blocks);
            let mut result = OcrResult::new(merged.text);
            result.confidence = merged.confidence;
            result.boxes = blocks.iter().map(to_layout_box).collect();
            result.set_engine(&layout_name);
            result
        };

        let metadata = &mut base.metadata;
        metadata.insert("mode".to_string(), Value::String(ProcessingMode::Thinking.to_string()));
        metadata.insert("blocks_count".to_string(), blocks.len().into());

        let Some((llm_name, llm)) = &self.llm else {
            return Ok(degrade(base, "no LLM provider configured".to_string()));
        };
        let Some(vision) = llm.as_vision() else {
            return Ok(degrade(base, format!("LLM provider '{}' has no vision capability", llm_name)));
        };
        if !llm.health_check().await {
            return Ok(degrade(base, format!("LLM provider '{}' is not healthy", llm_name)));
        }

        let mut structured = vision
            .structure_blocks(path, &blocks, &self.generate_options)
            .await
            .inspect_err(|e| tracing::error!(provider = %llm_name, error = %e, "Thinking pipeline failed"))?;

        let total_tokens = structured.tokens_used;
        base.text = structured.text;
        let metadata = &mut base.metadata;
        for key in ["pass1_extraction", "pass1_tokens", "pass2_tokens"] {
            if let Some(value) = structured.metadata.remove(key) {
                metadata.insert(key.to_string(), value);
            }
        }
        metadata.insert("total_tokens".to_string(), total_tokens.into());
        metadata.insert("llm_provider".to_string(), Value::String(llm_name.clone()));
        let model = match structured.metadata.remove("model") {
            Some(Value::String(model)) => Some(model),
            _ => llm.model(),
        };
        metadata.insert("llm_model".to_string(), model.map(Value::String).unwrap_or(Value::Null));

        tracing::info!(provider = %llm_name, total_tokens, "Thinking OCR finished");
        Ok(base)
    }

    async fn healthy_active_engine(&self) -> Option<NamedEngine> {
        let name = self.active.as_deref()?;
        let engine = self.engines.get(name)?;
        probe(name, engine.as_ref(), self.probe_timeout)
            .await
            .then(|| (name.to_string(), Arc::clone(engine)))
    }

    /// Healthy engines in preference order.
    ///
    /// All engines are probed concurrently, each bounded by the probe timeout, so one hung
    /// engine costs at most one timeout.
    async fn healthy_engines(&self) -> Vec<NamedEngine> {
        let mut tasks = JoinSet::new();
        for (index, (name, engine)) in self.engines.iter().enumerate() {
            let (name, engine) = (name.clone(), Arc::clone(engine));
            let probe_timeout = self.probe_timeout;
            tasks.spawn(async move {
                let healthy = probe(&name, engine.as_ref(), probe_timeout).await;
                (index, name, engine, healthy)
            });
        }

        let mut healthy = Vec::with_capacity(self.engines.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, name, engine, true)) => healthy.push((index, name, engine)),
                Ok(_) => {}
                Err(join_err) => tracing::warn!(error = %join_err, "Engine health probe task failed"),
            }
        }
        healthy.sort_by_key(|(index, _, _)| *index);
        healthy.into_iter().map(|(_, name, engine)| (name, engine)).collect()
    }

    fn select_engine<'a>(&self, healthy: &'a [NamedEngine]) -> Result<(&'a str, &'a Arc<dyn OcrEngine>)> {
        if self.engines.is_empty() {
            return Err(AgentError::NoEngineAvailable("no OCR engines configured".to_string()));
        }

        let preferred = self
            .active
            .as_deref()
            .and_then(|active| healthy.iter().find(|(name, _)| name == active));

        match preferred.or_else(|| healthy.first()) {
            Some((name, engine)) => Ok((name.as_str(), engine)),
            None => Err(AgentError::NoEngineAvailable(format!(
                "{} engine(s) configured, none healthy",
                self.engines.len()
            ))),
        }
    }
}

async fn probe(name: &str, engine: &dyn OcrEngine, probe_timeout: Duration) -> bool {
    match tokio::time::timeout(probe_timeout, engine.health_check()).await {
        Ok(true) => true,
        Ok(false) => {
            tracing::debug!(engine = %name, "Engine unhealthy");
            false
        }
        Err(_) => {
            tracing::warn!(engine = %name, "Engine health probe timed out");
            false
        }
    }
}

fn degrade(mut result: OcrResult, reason: String) -> OcrResult {
    tracing::warn!(reason = %reason, "Thinking mode degraded to OCR-only result");
    result.metadata.insert("degraded".to_string(), Value::Bool(true));
    result
        .metadata
        .insert("degraded_reason".to_string(), Value::String(reason));
    result
}

/// Whole-page block standing in for layout output.
fn page_block(path: &Path, result: &OcrResult) -> LayoutBlock {
    let bbox = image::image_dimensions(path)
        .map(|(w, h)| BoundingBox::new(0.0, 0.0, w as f64, h as f64))
        .unwrap_or_default();
    LayoutBlock {
        id: 0,
        bbox,
        text: result.text.clone(),
        confidence: result.confidence,
        block_type: "page".to_string(),
        page: 0,
    }
}

fn to_layout_box(block: &LayoutBlock) -> LayoutBox {
    LayoutBox {
        bbox: block.bbox,
        text: block.text.clone(),
        block_type: block.block_type.clone(),
        confidence: block.confidence,
        page: block.page,
    }
}
