//! docagent - Pluggable Document OCR and Vision-LLM Agent
//!
//! docagent composes OCR engines and LLM providers from a configuration document. Plugins are
//! resolved by class name, initialized with their own config section and kept in a shared
//! registry; documents can then be read in a single fast OCR pass or in a thinking mode that
//! layers layout extraction and two-pass vision-LLM analysis on top.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docagent::{Agent, ProcessingMode};
//! use std::path::Path;
//!
//! # async fn run() -> docagent::Result<()> {
//! let agent = Agent::from_path("config/config.yaml")?;
//! let result = agent
//!     .process_document(Path::new("scan.png"), ProcessingMode::Fast)
//!     .await?;
//! println!("{} ({:.2})", result.text, result.confidence);
//! agent.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core** (`core`): configuration loading, environment interpolation, document I/O
//! - **Plugin System** (`plugins`): plugin traits, registry, class catalog and loader
//! - **Backends** (`backends`): GLM-OCR and vision LLM over Ollama, Tesseract CLI
//! - **OCR** (`ocr`): layout processing and the fast/thinking processor
//! - **Agent** (`agent`): the façade tying configuration and plugins together

pub mod agent;
pub mod backends;
pub mod core;
pub mod error;
pub mod ocr;
pub mod plugins;
pub mod prompts;
pub mod types;

pub use agent::{Agent, HealthReport, HealthStatus, PluginStatus};
pub use core::config::ConfigManager;
pub use error::{AgentError, Result};
pub use types::*;

pub use ocr::{LayoutProcessor, OcrProcessor};
pub use plugins::{LlmProvider, OcrEngine, Plugin, PluginCatalog, ServicePlugin, ServiceRegistry, VisionLlmProvider};
