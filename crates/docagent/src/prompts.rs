//! Prompt templates for the OCR and vision-LLM backends.

use crate::types::{ChatMessage, OcrTask};

/// Prompt sent to GLM-OCR style models for each recognition task.
pub fn ocr_task_prompt(task: OcrTask) -> &'static str {
    match task {
        OcrTask::Text => "Text Recognition:",
        OcrTask::Formula => "Formula Recognition:",
        OcrTask::Table => "Table Recognition:",
    }
}

/// Prompt for schema-guided structured extraction.
pub fn schema_prompt(schema: &str) -> String {
    format!(
        "Please output the information in the image according to the following JSON format:\n{}",
        schema
    )
}

/// Flatten chat turns into a single `role: content` prompt, one turn per line.
pub fn flatten_chat(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First thinking pass: full extraction conditioned on the image and the raw OCR text.
pub fn extraction_prompt(ocr_text: &str) -> String {
    format!(
        r#"Examine the attached image and extract every piece of information it contains.

OCR text already detected (may contain recognition errors):
{ocr_text}

Produce a complete extraction in three sections.

## 1. TEXT CONTENT
- Transcribe all visible text exactly
- Fix obvious OCR mistakes, especially in numbers (O/0, l/1) and unit symbols
- Render tables with their headers and aligned columns
- Keep lists, schedules and other structured data intact
- Keep the unit next to every measurement

## 2. VISUAL INDICATORS
- **Switches**: position or state (ON/OFF, Up/Down, Active/Inactive)
- **Dials and gauges**: needle position, current reading, scale range
- **Status lights**: color and state (lit, off, blinking)
- **Buttons**: pressed or released, enabled or disabled
- **Other markers**: icons, symbols, sliders, knobs, valve positions

## 3. LAYOUT & STRUCTURE
- Titles, headers and section labels
- Table structure with row and column headers
- How the regions of the image relate to each other

Be exhaustive. Report uncertain readings as uncertain instead of guessing."#
    )
}

/// Second thinking pass: text-only analysis over the first pass's extraction.
pub fn analysis_prompt(extraction: &str) -> String {
    format!(
        r#"Analyze the following extracted data as a domain expert:

{extraction}

## 1. DATA VALIDATION & QUALITY
- Missing, truncated or unclear values
- Inconsistent values and formatting problems
- Out-of-range readings and unexpected patterns
- Remaining OCR ambiguities

## 2. CAUSE-EFFECT ANALYSIS
For every anomaly, state the abnormal effect, the control response the system shows, and
the most likely cause. Relate external conditions to the observed behavior.

## 3. OPERATIONAL STATE
- Whether control actions are consistent with their targets
- Which components look stuck or failed and which operate correctly
- Overall efficiency of the system

## 4. CONTEXTUAL INTELLIGENCE
- Safety and operational norms that apply
- Time-based patterns and what they imply
- Priority of each finding (Critical / Important / Monitor)

## 5. EXPERT RECOMMENDATIONS
**Critical:** issues needing immediate action
**Important:** optimizations and preventive measures
**Monitoring:** trends to track
**Root cause hypotheses:** marked as hypotheses, with a way to verify each

Answer in markdown with headers and bullet points. Be specific and actionable."#
    )
}

/// Prompt asking a vision model to list visual state indicators only.
pub const VISUAL_ELEMENTS_PROMPT: &str = r#"List every visual state indicator in this image: switches, dials, gauges, status lights, buttons, sliders and valves.
For each one give its label, its kind and its current state or reading. Ignore plain text that is not part of an indicator."#;

/// Prompt merging OCR text with a separate description of visual elements.
pub fn integration_prompt(ocr_text: &str, visual_description: &str) -> String {
    format!(
        "Combine the OCR text and the visual element description below into one coherent \
         account of the document. Resolve conflicts in favor of the visual description for \
         indicator states and in favor of the OCR text for transcribed values.\n\n\
         OCR text:\n{ocr_text}\n\nVisual elements:\n{visual_description}"
    )
}
