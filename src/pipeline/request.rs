//! Request assembly: payloads + instruction → one multi-part request.

use crate::config::ComparisonConfig;
use crate::pipeline::contract::comparison_schema;
use crate::pipeline::normalize::NormalizedPayload;
use crate::prompts::{instruction_prompt, system_instruction, textual_part};
use serde_json::Value;

/// One part of the user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// Base64 content with its media type.
    InlineData { media_type: String, data: String },
    Text(String),
}

/// Everything the model receives for a comparison.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Document parts in submission order, followed by the instruction.
    pub parts: Vec<ContentPart>,
    pub system_instruction: String,
    /// Structured-output constraint; see [`comparison_schema`].
    pub response_schema: Value,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl ExtractionRequest {
    /// Number of document parts (excludes the trailing instruction).
    pub fn document_parts(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }
}

/// Build the single request carrying all documents.
pub fn build_request(payloads: &[NormalizedPayload], config: &ComparisonConfig) -> ExtractionRequest {
    let mut parts: Vec<ContentPart> = payloads
        .iter()
        .map(|p| match p {
            NormalizedPayload::Binary {
                media_type, data, ..
            } => ContentPart::InlineData {
                media_type: media_type.clone(),
                data: data.clone(),
            },
            NormalizedPayload::Text { .. } => {
                ContentPart::Text(textual_part(p).unwrap_or_default())
            }
        })
        .collect();

    let has_tabular = payloads.iter().any(NormalizedPayload::is_textual);
    parts.push(ContentPart::Text(instruction_prompt(config.language, has_tabular)));

    let system = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| system_instruction(config.language).to_string());

    ExtractionRequest {
        parts,
        system_instruction: system,
        response_schema: comparison_schema(config.language),
        model: config.effective_model().to_string(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}
