//! OCR engine plugin trait.
//!
//! This module defines the capability trait for OCR engines. OCR engines are the only plugins
//! with a generic processing entry point, so [`Agent::execute`](crate::Agent::execute)
//! dispatches to them.

use crate::Result;
use crate::plugins::Plugin;
use crate::types::{OcrOptions, OcrResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Trait for OCR engine plugins.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docagent::plugins::{Lifecycle, OcrEngine, Plugin, PluginState};
/// use docagent::{OcrOptions, OcrResult, Result};
/// use serde_json::Value;
/// use std::path::Path;
///
/// struct FixedTextEngine {
///     lifecycle: Lifecycle,
/// }
///
/// #[async_trait]
/// impl Plugin for FixedTextEngine {
///     fn name(&self) -> &str { "fixed" }
///     fn version(&self) -> String { "1.0.0".to_string() }
///     fn state(&self) -> PluginState { self.lifecycle.get() }
///     fn initialize(&self, _config: &Value) -> Result<()> {
///         self.lifecycle.set(PluginState::Initialized);
///         Ok(())
///     }
///     fn shutdown(&self) -> Result<()> { Ok(()) }
///     async fn health_check(&self) -> bool { true }
/// }
///
/// #[async_trait]
/// impl OcrEngine for FixedTextEngine {
///     async fn process(&self, _path: &Path, _options: &OcrOptions) -> Result<OcrResult> {
///         let mut result = OcrResult::new("hello");
///         result.confidence = 1.0;
///         result.set_engine(self.name());
///         Ok(result)
///     }
/// }
/// ```
#[async_trait]
pub trait OcrEngine: Plugin {
    /// Recognize text in the image at `path`.
    ///
    /// # Errors
    ///
    /// `Validation` for a missing input file, `RemoteCall` or `Ocr` for backend failures.
    async fn process(&self, path: &Path, options: &OcrOptions) -> Result<OcrResult>;

    /// Process several inputs, one after another.
    ///
    /// A failing item becomes an [`OcrResult::error_marker`] in its slot so the output always
    /// has one entry per input. Only a poisoned lock aborts the batch.
    async fn batch_process(&self, paths: &[PathBuf], options: &OcrOptions) -> Result<Vec<OcrResult>> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            match self.process(path, options).await {
                Ok(result) => results.push(result),
                Err(e) if e.is_isolatable() => {
                    tracing::warn!(
                        engine = self.name(),
                        path = %path.display(),
                        error = %e,
                        "Batch item failed"
                    );
                    results.push(OcrResult::error_marker(self.name(), &e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Whether [`process`](OcrEngine::process) returns positioned `boxes`.
    ///
    /// Layout-capable engines drive the block extraction of thinking mode.
    fn supports_layout(&self) -> bool {
        false
    }
}
