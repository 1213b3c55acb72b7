//! Built-in plugin implementations.
//!
//! - `glm_ocr`: GLM-OCR over an Ollama-compatible endpoint (feature `ollama`)
//! - `ollama_vision`: vision LLM provider over the same endpoint (feature `ollama`)
//! - `tesseract`: Tesseract CLI engine with layout boxes (feature `tesseract`)

#[cfg(feature = "ollama")]
pub mod glm_ocr;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "ollama")]
pub mod ollama_vision;
#[cfg(feature = "tesseract")]
pub mod tesseract;

#[cfg(feature = "ollama")]
pub use glm_ocr::GlmOcrEngine;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaClient, OllamaSettings};
#[cfg(feature = "ollama")]
pub use ollama_vision::OllamaVisionProvider;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;
