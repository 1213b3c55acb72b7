//! LLM provider plugin traits.
//!
//! [`LlmProvider`] is the text capability. Providers that accept images additionally implement
//! [`VisionLlmProvider`] and expose it through [`LlmProvider::as_vision`], which is how the OCR
//! pipeline discovers vision support on an `Arc<dyn LlmProvider>`.

use crate::Result;
use crate::plugins::Plugin;
use crate::prompts;
use crate::types::{ChatMessage, GenerateOptions, LayoutBlock, LlmResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// Trait for text-generation plugins.
#[async_trait]
pub trait LlmProvider: Plugin {
    /// Complete a single prompt.
    ///
    /// # Errors
    ///
    /// `RemoteCall` if the backend cannot be reached or rejects the request.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<LlmResponse>;

    /// Multi-turn completion. The default flattens the turns into `role: content` lines.
    async fn chat(&self, messages: &[ChatMessage], options: &GenerateOptions) -> Result<LlmResponse> {
        self.generate(&prompts::flatten_chat(messages), options).await
    }

    /// Model identifier used for requests, if known.
    fn model(&self) -> Option<String> {
        None
    }

    /// Vision capability of this provider, if any.
    fn as_vision(&self) -> Option<&dyn VisionLlmProvider> {
        None
    }
}

/// Output of the two thinking passes.
#[derive(Debug, Clone)]
pub struct TwoPassOutcome {
    /// Image-conditioned extraction.
    pub extraction: LlmResponse,
    /// Text-only analysis of the extraction.
    pub analysis: LlmResponse,
}

impl TwoPassOutcome {
    pub fn total_tokens(&self) -> u64 {
        self.extraction.tokens_used + self.analysis.tokens_used
    }
}

/// Run extraction then analysis. Pass 2 starts only after pass 1 succeeded.
pub async fn run_two_pass<P: VisionLlmProvider + ?Sized>(
    provider: &P,
    image: &Path,
    raw_text: &str,
    options: &GenerateOptions,
) -> Result<TwoPassOutcome> {
    tracing::info!(provider = provider.name(), "Thinking pass 1: extraction");
    let extraction = provider.analyze_context(image, raw_text, options).await?;

    tracing::info!(provider = provider.name(), "Thinking pass 2: analysis");
    let analysis = provider
        .generate(&prompts::analysis_prompt(&extraction.text), options)
        .await?;

    Ok(TwoPassOutcome { extraction, analysis })
}

/// Join the non-empty texts of `blocks` with newlines, in the given order.
pub fn blocks_text(blocks: &[LayoutBlock]) -> String {
    blocks
        .iter()
        .filter(|b| !b.text.is_empty())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Image-conditioned extension of [`LlmProvider`].
#[async_trait]
pub trait VisionLlmProvider: LlmProvider {
    /// Complete a prompt with the image at `image` attached.
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &Path,
        options: &GenerateOptions,
    ) -> Result<LlmResponse>;

    /// Full extraction of the image, guided by previously recognized text.
    async fn analyze_context(&self, image: &Path, ocr_text: &str, options: &GenerateOptions) -> Result<LlmResponse> {
        self.generate_with_image(&prompts::extraction_prompt(ocr_text), image, options)
            .await
    }

    /// Describe switches, gauges, lights and similar state indicators in the image.
    async fn detect_visual_elements(&self, image: &Path, options: &GenerateOptions) -> Result<LlmResponse> {
        self.generate_with_image(prompts::VISUAL_ELEMENTS_PROMPT, image, options)
            .await
    }

    /// Merge OCR text and a visual description into one account (text-only).
    async fn integrate_results(
        &self,
        ocr_text: &str,
        visual_description: &str,
        options: &GenerateOptions,
    ) -> Result<LlmResponse> {
        self.generate(&prompts::integration_prompt(ocr_text, visual_description), options)
            .await
    }

    /// Two-pass reasoning over layout blocks.
    ///
    /// Returns the pass 2 text with summed token usage. Metadata carries `mode`,
    /// `pass1_tokens`, `pass2_tokens` and the pass 1 text as `pass1_extraction`.
    async fn structure_blocks(
        &self,
        image: &Path,
        blocks: &[LayoutBlock],
        options: &GenerateOptions,
    ) -> Result<LlmResponse> {
        let full_text = blocks_text(blocks);
        let outcome = run_two_pass(self, image, &full_text, options).await?;

        let mut response = LlmResponse::new(outcome.analysis.text.clone(), outcome.total_tokens());
        let metadata = &mut response.metadata;
        if let Some(model) = self.model() {
            metadata.insert("model".to_string(), Value::String(model));
        }
        metadata.insert("provider".to_string(), Value::String(self.name().to_string()));
        metadata.insert("mode".to_string(), Value::String("two-pass-thinking".to_string()));
        metadata.insert("pass1_tokens".to_string(), outcome.extraction.tokens_used.into());
        metadata.insert("pass2_tokens".to_string(), outcome.analysis.tokens_used.into());
        metadata.insert(
            "pass1_extraction".to_string(),
            Value::String(outcome.extraction.text),
        );
        Ok(response)
    }
}
