//! The external model seam.
//!
//! [`ExtractionModel`] is the only boundary between this crate and a
//! generative model. Two implementations ship with the library:
//!
//! * [`GeminiModel`] calls Gemini `generateContent` directly, passing the
//!   contract as `responseSchema` so the reply is constrained server-side.
//! * [`ProviderModel`] adapts any edgequake-llm [`LLMProvider`]. Those APIs
//!   have no common schema mode, so the schema travels in the prompt.
//!
//! Tests and embedders can supply their own implementation.
//!
//! Exactly one call is made per comparison. There is no retry here: a failed
//! call fails the comparison.

use crate::config::{ComparisonConfig, DEFAULT_PROVIDER_MODEL};
use crate::error::PolicyCompareError;
use crate::pipeline::request::{ContentPart, ExtractionRequest};
use crate::prompts::schema_instruction;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Raw answer of the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Reply text; `None` when the model produced nothing.
    pub text: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Failure reported by a model backend.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The API answered with an error.
    #[error("{message}")]
    Api { status: Option<u16>, message: String },
    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl ModelError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// A generative model able to answer an [`ExtractionRequest`].
pub trait ExtractionModel: Send + Sync {
    /// Short label for logs, e.g. `gemini/gemini-2.5-flash`.
    fn label(&self) -> String;

    /// Send the request once and return the raw reply.
    fn generate(
        &self,
        request: &ExtractionRequest,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}

// ── Gemini ───────────────────────────────────────────────────────────────

/// Direct client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiModel {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, PolicyCompareError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PolicyCompareError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout_secs,
        })
    }

    /// Build from config, falling back to `GEMINI_API_KEY` then `GOOGLE_API_KEY`.
    pub fn from_config(config: &ComparisonConfig) -> Result<Self, PolicyCompareError> {
        let key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| non_empty_env("GEMINI_API_KEY"))
            .or_else(|| non_empty_env("GOOGLE_API_KEY"))
            .ok_or_else(|| PolicyCompareError::ProviderNotConfigured {
                provider: "gemini".into(),
                hint: "Set GEMINI_API_KEY (or pass --api-key), or choose another provider \
                       with --provider."
                    .into(),
            })?;
        Self::new(key, config.api_base_url.clone(), config.api_timeout_secs)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

impl ExtractionModel for GeminiModel {
    fn label(&self) -> String {
        "gemini".to_string()
    }

    async fn generate(&self, request: &ExtractionRequest) -> Result<ModelResponse, ModelError> {
        let url = self.endpoint(&request.model);
        debug!("POST {} ({} parts)", url, request.parts.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    ModelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Api {
                status: Some(status.as_u16()),
                message: api_error_message(&text),
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| ModelError::Api {
            status: Some(status.as_u16()),
            message: format!("unreadable response envelope: {e}"),
        })?;
        Ok(parse_response(&body))
    }
}

/// Serialise a request into a `generateContent` body.
pub fn build_body(request: &ExtractionRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|p| match p {
            ContentPart::InlineData { media_type, data } => json!({
                "inlineData": { "mimeType": media_type, "data": data }
            }),
            ContentPart::Text(text) => json!({ "text": text }),
        })
        .collect();

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.response_schema,
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        }
    })
}

/// Extract reply text and token usage from a `generateContent` response.
pub fn parse_response(body: &Value) -> ModelResponse {
    let text: String = body["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
            warn!("Gemini returned no candidates (blockReason: {})", reason);
        }
    }

    ModelResponse {
        text: Some(text).filter(|t| !t.is_empty()),
        input_tokens: body["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
        output_tokens: body["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0),
    }
}

/// Prefer the structured `error.message` of an API error body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Adapter over an edgequake-llm provider.
#[derive(Clone)]
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Instantiate a named provider with the given model.
    pub fn named(provider_name: &str, model: &str) -> Result<Self, PolicyCompareError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            PolicyCompareError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{provider_name}/{model}")))
    }

    /// Auto-detect a provider from the environment.
    ///
    /// Honours `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set,
    /// otherwise lets [`ProviderFactory::from_env`] pick from the API keys present.
    pub fn from_env(model: Option<&str>) -> Result<Self, PolicyCompareError> {
        if let (Some(prov), Some(env_model)) = (
            non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
            non_empty_env("EDGEQUAKE_MODEL"),
        ) {
            return Self::named(&prov, model.unwrap_or(&env_model));
        }

        if non_empty_env("OPENAI_API_KEY").is_some() {
            return Self::named("openai", model.unwrap_or(DEFAULT_PROVIDER_MODEL));
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| PolicyCompareError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                     Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY.\n\
                     Error: {}",
                    e
                ),
            })?;
        Ok(Self::new(provider, "auto"))
    }
}

impl ExtractionModel for ProviderModel {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn generate(&self, request: &ExtractionRequest) -> Result<ModelResponse, ModelError> {
        let messages = provider_messages(request);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelError::Api {
                status: None,
                message: format!("{e}"),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        let text = strip_json_fence(&response.content);
        Ok(ModelResponse {
            text: Some(text).filter(|t| !t.trim().is_empty()),
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Fold a request into system + user chat messages.
///
/// Inline data becomes image attachments; text parts and the schema
/// instruction are joined into the user text in order.
fn provider_messages(request: &ExtractionRequest) -> Vec<ChatMessage> {
    let mut texts: Vec<String> = Vec::new();
    let mut images: Vec<ImageData> = Vec::new();

    for part in &request.parts {
        match part {
            ContentPart::InlineData { media_type, data } => {
                images.push(ImageData::new(data.clone(), media_type.as_str()));
            }
            ContentPart::Text(t) => texts.push(t.clone()),
        }
    }

    let schema = serde_json::to_string_pretty(&request.response_schema).unwrap_or_default();
    texts.push(schema_instruction(&schema));

    let user_text = texts.join("\n\n");
    vec![
        ChatMessage::system(request.system_instruction.as_str()),
        ChatMessage::user_with_images(&user_text, images),
    ]
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Remove a single outer ```json fence some chat models wrap replies in.
fn strip_json_fence(input: &str) -> String {
    match RE_JSON_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}
