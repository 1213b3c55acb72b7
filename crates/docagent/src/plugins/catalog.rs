//! Class identity resolution.
//!
//! Configuration names plugin implementations by a `class` string. The [`PluginCatalog`] maps
//! those strings to factory closures, populated at start-up. Custom plugins are added with
//! [`PluginCatalog::register`] before the agent is built.

use crate::Result;
use crate::plugins::ServicePlugin;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh, uninitialized plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Result<ServicePlugin> + Send + Sync>;

/// Class identity of the GLM-OCR remote engine.
pub const GLM_OCR_CLASS: &str = "glm-ocr";
/// Class identity of the Tesseract CLI layout engine.
pub const TESSERACT_CLASS: &str = "tesseract";
/// Class identity of the Ollama vision LLM provider.
pub const OLLAMA_VISION_CLASS: &str = "ollama-vision";
/// Alias of [`OLLAMA_VISION_CLASS`] kept for configs written against Qwen3-VL.
pub const QWEN3_VL_CLASS: &str = "qwen3-vl";

#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: HashMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with every backend compiled into this build.
    pub fn with_builtins() -> Self {
        #[allow(unused_mut)]
        let mut catalog = Self::new();

        #[cfg(feature = "ollama")]
        {
            use crate::backends::{GlmOcrEngine, OllamaVisionProvider};

            catalog.register(GLM_OCR_CLASS, || Ok(ServicePlugin::Ocr(Arc::new(GlmOcrEngine::new()))));
            for class in [OLLAMA_VISION_CLASS, QWEN3_VL_CLASS] {
                catalog.register(class, || Ok(ServicePlugin::Llm(Arc::new(OllamaVisionProvider::new()))));
            }
        }

        #[cfg(feature = "tesseract")]
        {
            use crate::backends::TesseractEngine;

            catalog.register(TESSERACT_CLASS, || Ok(ServicePlugin::Ocr(Arc::new(TesseractEngine::new()))));
        }

        catalog
    }

    /// Map `class` to `factory`, replacing any previous mapping.
    pub fn register<F>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<ServicePlugin> + Send + Sync + 'static,
    {
        self.factories.insert(class.into(), Arc::new(factory));
    }

    pub fn resolve(&self, class: &str) -> Option<PluginFactory> {
        self.factories.get(class).cloned()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Known class identities, sorted.
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.factories.keys().cloned().collect();
        classes.sort();
        classes
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("classes", &self.classes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgentError;

    #[test]
    fn test_empty_catalog() {
        let catalog = PluginCatalog::new();
        assert!(catalog.classes().is_empty());
        assert!(catalog.resolve("glm-ocr").is_none());
    }

    #[test]
    fn test_register_and_resolve() {
        let mut catalog = PluginCatalog::new();
        catalog.register("broken", || Err(AgentError::config("no")));

        assert!(catalog.contains("broken"));
        let factory = catalog.resolve("broken").unwrap();
        assert!(factory().is_err());
    }

    #[cfg(all(feature = "ollama", feature = "tesseract"))]
    #[test]
    fn test_builtins_are_resolvable() {
        let catalog = PluginCatalog::with_builtins();
        assert_eq!(
            catalog.classes(),
            vec!["glm-ocr", "ollama-vision", "qwen3-vl", "tesseract"]
        );

        let glm = catalog.resolve(GLM_OCR_CLASS).unwrap()().unwrap();
        assert_eq!(glm.kind(), "ocr");
        assert_eq!(glm.name(), "glm-ocr");

        let vision = catalog.resolve(QWEN3_VL_CLASS).unwrap()().unwrap();
        assert_eq!(vision.kind(), "llm");
        assert!(vision.supports_vision());
    }
}
