//! Layout block extraction, cropping and reading-order merge.

use crate::core::io;
use crate::plugins::OcrEngine;
use crate::types::{BoundingBox, LayoutBlock, OcrOptions};
use crate::{AgentError, Result};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Text and mean confidence of merged blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedText {
    pub text: String,
    pub confidence: f64,
}

/// Turns a layout-capable engine's boxes into ordered blocks and back into text.
pub struct LayoutProcessor {
    engine: Arc<dyn OcrEngine>,
    options: OcrOptions,
}

impl LayoutProcessor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            options: OcrOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OcrOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine(&self) -> &Arc<dyn OcrEngine> {
        &self.engine
    }

    /// Extract positioned blocks from the image at `path`.
    ///
    /// Blocks get a zero-based `id` in extraction order. Engine failures are logged and yield
    /// an empty vector.
    pub async fn extract_layout_blocks(&self, path: &Path) -> Vec<LayoutBlock> {
        match self.engine.process(path, &self.options).await {
            Ok(result) => {
                let blocks: Vec<LayoutBlock> = result
                    .boxes
                    .iter()
                    .enumerate()
                    .map(|(id, layout_box)| LayoutBlock::from_box(id, layout_box))
                    .collect();
                tracing::info!(engine = self.engine.name(), blocks = blocks.len(), "Extracted layout blocks");
                blocks
            }
            Err(e) => {
                tracing::error!(engine = self.engine.name(), error = %e, "Layout extraction failed");
                Vec::new()
            }
        }
    }

    /// Crop the image at `path` to `bbox`, converted to RGB.
    ///
    /// The box is clamped to the image bounds.
    ///
    /// # Errors
    ///
    /// `Validation` if the file is missing, `ImageProcessing` if it cannot be decoded or the
    /// clamped region is empty.
    pub fn crop_image_block(path: &Path, bbox: &BoundingBox) -> Result<RgbImage> {
        io::validate_file_exists(path)?;
        let bytes = std::fs::read(path)?;
        let image = image::load_from_memory(&bytes).map_err(|e| AgentError::ImageProcessing {
            message: format!("Failed to decode image {}: {}", path.display(), e),
            source: Some(Box::new(e)),
        })?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let x1 = bbox.x1().max(0.0).floor().min(width as f64) as u32;
        let y1 = bbox.y1().max(0.0).floor().min(height as f64) as u32;
        let x2 = bbox.x2().max(0.0).ceil().min(width as f64) as u32;
        let y2 = bbox.y2().max(0.0).ceil().min(height as f64) as u32;

        if x2 <= x1 || y2 <= y1 {
            return Err(AgentError::image_processing(format!(
                "Empty crop region {:?} for {}x{} image",
                bbox.0, width, height
            )));
        }

        Ok(image::imageops::crop_imm(&rgb, x1, y1, x2 - x1, y2 - y1).to_image())
    }

    /// Crop `bbox` out of the image and write it to a persisted temporary PNG.
    ///
    /// The caller owns the returned file and must delete it.
    pub fn save_cropped_block(path: &Path, bbox: &BoundingBox) -> Result<PathBuf> {
        let cropped = Self::crop_image_block(path, bbox)?;

        let file = tempfile::Builder::new()
            .prefix("docagent-block-")
            .suffix(".png")
            .tempfile()?;
        cropped.save_with_format(file.path(), ImageFormat::Png)?;

        let (_, kept) = file.keep().map_err(|e| AgentError::Io(e.error))?;
        tracing::debug!(path = %kept.display(), "Saved cropped block");
        Ok(kept)
    }

    /// Merge block texts in reading order.
    ///
    /// Blocks are stably sorted by `(y1, x1)`. Non-empty texts are joined with a blank line and
    /// the confidence is the mean over those same blocks (0.0 if none).
    pub fn merge_block_results(blocks: &[LayoutBlock]) -> MergedText {
        let mut ordered: Vec<&LayoutBlock> = blocks.iter().collect();
        ordered.sort_by(|a, b| {
            a.bbox
                .y1()
                .total_cmp(&b.bbox.y1())
                .then(a.bbox.x1().total_cmp(&b.bbox.x1()))
        });

        let contributing: Vec<&LayoutBlock> = ordered.into_iter().filter(|b| !b.text.is_empty()).collect();

        let text = contributing
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let confidence = if contributing.is_empty() {
            0.0
        } else {
            contributing.iter().map(|b| b.confidence).sum::<f64>() / contributing.len() as f64
        };

        MergedText { text, confidence }
    }
}
