//! Plugin system.
//!
//! Plugins come in two capability families:
//!
//! - [`OcrEngine`]: recognize text in images, the only generic processing capability
//! - [`LlmProvider`]: text generation, optionally extended by [`VisionLlmProvider`]
//!
//! All plugins implement the base [`Plugin`] trait. Live instances sit in a
//! [`ServiceRegistry`]; the [`PluginLoader`] fills it from configuration, resolving `class`
//! strings through a [`PluginCatalog`].
//!
//! # Registering a custom engine
//!
//! ```rust
//! use async_trait::async_trait;
//! use docagent::plugins::{Lifecycle, OcrEngine, Plugin, PluginCatalog, PluginState, ServicePlugin};
//! use docagent::{OcrOptions, OcrResult, Result};
//! use serde_json::Value;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! struct UpperEngine {
//!     lifecycle: Lifecycle,
//! }
//!
//! #[async_trait]
//! impl Plugin for UpperEngine {
//!     fn name(&self) -> &str { "upper" }
//!     fn version(&self) -> String { "1.0.0".to_string() }
//!     fn state(&self) -> PluginState { self.lifecycle.get() }
//!     fn initialize(&self, _config: &Value) -> Result<()> {
//!         self.lifecycle.set(PluginState::Initialized);
//!         Ok(())
//!     }
//!     fn shutdown(&self) -> Result<()> { Ok(()) }
//!     async fn health_check(&self) -> bool { true }
//! }
//!
//! #[async_trait]
//! impl OcrEngine for UpperEngine {
//!     async fn process(&self, path: &Path, _options: &OcrOptions) -> Result<OcrResult> {
//!         Ok(OcrResult::new(path.display().to_string().to_uppercase()))
//!     }
//! }
//!
//! let mut catalog = PluginCatalog::with_builtins();
//! catalog.register("upper", || {
//!     Ok(ServicePlugin::Ocr(Arc::new(UpperEngine { lifecycle: Lifecycle::new() })))
//! });
//! assert!(catalog.contains("upper"));
//! ```

pub mod catalog;
pub mod llm;
pub mod loader;
pub mod ocr;
pub mod registry;
pub mod traits;

pub use catalog::{PluginCatalog, PluginFactory};
pub use llm::{LlmProvider, TwoPassOutcome, VisionLlmProvider, run_two_pass};
pub use loader::{LoadFailure, LoadReport, PluginLoader};
pub use ocr::OcrEngine;
pub use registry::{RegistryEntry, ServicePlugin, ServiceRegistry, registry_key};
pub use traits::{Lifecycle, Plugin, PluginState};
