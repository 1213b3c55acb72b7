//! Layout-capable OCR engine driving the Tesseract command-line tool.
//!
//! Runs `tesseract <image> stdout -l <lang> --psm <n> tsv` and groups the word rows of the TSV
//! output into paragraph boxes.

use crate::core::io;
use crate::plugins::{Lifecycle, OcrEngine, Plugin, PluginState};
use crate::types::{BoundingBox, LayoutBox, OcrOptions, OcrResult};
use crate::{AgentError, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::RwLock;
use tokio::process::Command;

/// TSV parsing constants
pub const TSV_WORD_LEVEL: u32 = 5;
pub const TSV_MIN_FIELDS: usize = 12;

#[derive(Debug, Clone, Deserialize)]
struct TesseractSettings {
    #[serde(default = "default_binary")]
    binary: String,
    #[serde(default = "default_language")]
    language: String,
    /// Page segmentation mode.
    #[serde(default = "default_psm")]
    psm: u8,
    /// Words below this confidence (0-100) are dropped.
    #[serde(default)]
    min_confidence: f64,
}

fn default_binary() -> String {
    "tesseract".to_string()
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_psm() -> u8 {
    3
}

impl Default for TesseractSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            language: default_language(),
            psm: default_psm(),
            min_confidence: 0.0,
        }
    }
}

pub struct TesseractEngine {
    lifecycle: Lifecycle,
    settings: RwLock<TesseractSettings>,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            settings: RwLock::new(TesseractSettings::default()),
        }
    }

    fn settings(&self) -> Result<TesseractSettings> {
        self.settings
            .read()
            .map(|settings| settings.clone())
            .map_err(|e| AgentError::LockPoisoned(e.to_string()))
    }

    async fn run_tesseract(&self, settings: &TesseractSettings, image: &Path, language: &str) -> Result<String> {
        let output = Command::new(&settings.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", language])
            .args(["--psm", &settings.psm.to_string()])
            .arg("tsv")
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            Ok(output) => Err(AgentError::ocr(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AgentError::ocr(format!(
                "{} not found (install tesseract-ocr)",
                settings.binary
            ))),
            Err(e) => Err(AgentError::Io(e)),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn state(&self) -> PluginState {
        self.lifecycle.get()
    }

    fn initialize(&self, config: &Value) -> Result<()> {
        let settings: TesseractSettings = match config {
            Value::Null => TesseractSettings::default(),
            other => serde_json::from_value(other.clone()).map_err(|e| {
                self.lifecycle.set(PluginState::Failed);
                AgentError::config_with_source("Invalid tesseract config", e)
            })?,
        };

        if which::which(&settings.binary).is_err() {
            tracing::warn!(binary = %settings.binary, "Tesseract binary not found on PATH; engine will report unhealthy");
        }
        tracing::info!(language = %settings.language, psm = settings.psm, "Tesseract engine initialized");

        *self
            .settings
            .write()
            .map_err(|e| AgentError::LockPoisoned(e.to_string()))? = settings;
        self.lifecycle.set(PluginState::Initialized);
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.lifecycle.set(PluginState::CleanedUp);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        if !self.lifecycle.is_initialized() {
            return false;
        }
        match self.settings() {
            Ok(settings) => which::which(&settings.binary).is_ok(),
            Err(_) => false,
        }
    }

    fn description(&self) -> &str {
        "Tesseract CLI with paragraph-level layout boxes"
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn process(&self, path: &Path, options: &OcrOptions) -> Result<OcrResult> {
        io::validate_file_exists(path)?;
        let settings = self.settings()?;
        let language = options.language.as_deref().unwrap_or(&settings.language);

        let tsv = self.run_tesseract(&settings, path, language).await?;
        let boxes = parse_tsv(&tsv, settings.min_confidence);
        tracing::debug!(path = %path.display(), boxes = boxes.len(), "Tesseract finished");

        let text = boxes
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let confidence = if boxes.is_empty() {
            0.0
        } else {
            boxes.iter().map(|b| b.confidence).sum::<f64>() / boxes.len() as f64
        };

        let mut result = OcrResult::new(text);
        result.boxes = boxes;
        result.confidence = confidence;
        result.set_engine(self.name());
        result
            .metadata
            .insert("language".to_string(), Value::String(language.to_string()));
        Ok(result)
    }

    fn supports_layout(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct Paragraph {
    page: usize,
    bbox: Option<BoundingBox>,
    lines: IndexMap<u32, Vec<String>>,
    confidence_sum: f64,
    words: usize,
}

/// Group the word rows of Tesseract TSV output into paragraph boxes, in output order.
///
/// Box confidence is the mean word confidence scaled to `[0, 1]`; `page` is zero-based.
pub fn parse_tsv(tsv: &str, min_confidence: f64) -> Vec<LayoutBox> {
    let mut paragraphs: IndexMap<(u32, u32, u32), Paragraph> = IndexMap::new();

    for (line_num, line) in tsv.lines().enumerate() {
        if line_num == 0 && line.starts_with("level") {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }

        let level = fields[0].parse::<u32>().unwrap_or(0);
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let conf = fields[10].parse::<f64>().unwrap_or(-1.0);
        if conf < min_confidence || conf < 0.0 {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let number = |i: usize| fields[i].parse::<u32>().unwrap_or(0);
        let coord = |i: usize| fields[i].parse::<f64>().unwrap_or(0.0);
        let (left, top, width, height) = (coord(6), coord(7), coord(8), coord(9));
        let word_box = BoundingBox::new(left, top, left + width, top + height);

        let paragraph = paragraphs
            .entry((number(1), number(2), number(3)))
            .or_insert_with(|| Paragraph {
                page: number(1).saturating_sub(1) as usize,
                ..Default::default()
            });
        paragraph.bbox = Some(match paragraph.bbox {
            Some(bbox) => bbox.union(&word_box),
            None => word_box,
        });
        paragraph.lines.entry(number(4)).or_default().push(text.to_string());
        paragraph.confidence_sum += conf;
        paragraph.words += 1;
    }

    paragraphs
        .into_values()
        .filter_map(|p| {
            let bbox = p.bbox?;
            let text = p
                .lines
                .values()
                .map(|words| words.join(" "))
                .collect::<Vec<_>>()
                .join("\n");
            Some(LayoutBox {
                bbox,
                text,
                block_type: "text".to_string(),
                confidence: p.confidence_sum / p.words as f64 / 100.0,
                page: p.page,
            })
        })
        .collect()
}
