//! OCR pipeline.
//!
//! [`OcrProcessor`] serves fast and thinking requests over the registered engines;
//! [`LayoutProcessor`] handles positioned blocks (extraction, cropping, reading-order merge).

pub mod layout;
pub mod processor;

pub use layout::{LayoutProcessor, MergedText};
pub use processor::OcrProcessor;
