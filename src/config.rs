//! Configuration types for policy comparison.
//!
//! All comparison behaviour is controlled through [`ComparisonConfig`], built
//! via its [`ComparisonConfigBuilder`]. Every knob lives in one struct so a
//! run can be logged and reproduced from its config alone.

use crate::error::PolicyCompareError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Gemini model, matching the structured-output contract.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Default model when an edgequake-llm provider is named without a model.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-mini";

/// Default public endpoint for the Gemini REST API.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for a policy comparison.
///
/// Built via [`ComparisonConfig::builder()`] or using
/// [`ComparisonConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_policy_compare::{ComparisonConfig, ResponseLanguage};
///
/// let config = ComparisonConfig::builder()
///     .language(ResponseLanguage::English)
///     .max_documents(4)
///     .model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ComparisonConfig {
    /// Which model backend to call. Default: [`ModelBackend::Gemini`].
    pub backend: ModelBackend,

    /// Model identifier, e.g. "gemini-2.5-flash", "gpt-4.1".
    /// If None, uses the backend default.
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// Setting it selects the provider backend.
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over everything.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Gemini API key. If None, read from `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    pub api_key: Option<String>,

    /// Gemini REST base URL. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub api_base_url: String,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate for the whole comparison. Default: 8192.
    ///
    /// The reply carries one record per document plus a summary; six dense
    /// offers with long limit lists comfortably fit in 8 k tokens.
    pub max_tokens: usize,

    /// Timeout for the single model call, in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Minimum number of documents a session accepts for comparison. Default: 2.
    pub min_documents: usize,

    /// Maximum number of documents a session keeps. Default: 6.
    pub max_documents: usize,

    /// Language of prompts, sentinel values and export labels. Default: Turkish.
    pub language: ResponseLanguage,

    /// Custom system instruction. If None, uses the built-in advisor persona.
    pub system_prompt: Option<String>,

    /// Optional progress callback for normalisation and request events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            model: None,
            provider_name: None,
            provider: None,
            api_key: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: 0.2,
            max_tokens: 8192,
            api_timeout_secs: 180,
            min_documents: 2,
            max_documents: 6,
            language: ResponseLanguage::default(),
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ComparisonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("min_documents", &self.min_documents)
            .field("max_documents", &self.max_documents)
            .field("language", &self.language)
            .field("system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

impl ComparisonConfig {
    /// Create a new builder for `ComparisonConfig`.
    pub fn builder() -> ComparisonConfigBuilder {
        ComparisonConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model identifier the configured backend will use.
    pub fn effective_model(&self) -> &str {
        match (&self.model, self.backend) {
            (Some(m), _) => m,
            (None, ModelBackend::Gemini) => DEFAULT_GEMINI_MODEL,
            (None, ModelBackend::Provider) => DEFAULT_PROVIDER_MODEL,
        }
    }
}

/// Builder for [`ComparisonConfig`].
#[derive(Debug)]
pub struct ComparisonConfigBuilder {
    config: ComparisonConfig,
}

impl ComparisonConfigBuilder {
    pub fn backend(mut self, backend: ModelBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Name an edgequake-llm provider; implies [`ModelBackend::Provider`].
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self.config.backend = ModelBackend::Provider;
        self
    }

    /// Use a pre-built edgequake-llm provider; implies [`ModelBackend::Provider`].
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self.config.backend = ModelBackend::Provider;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn min_documents(mut self, n: usize) -> Self {
        self.config.min_documents = n;
        self
    }

    pub fn max_documents(mut self, n: usize) -> Self {
        self.config.max_documents = n;
        self
    }

    pub fn language(mut self, language: ResponseLanguage) -> Self {
        self.config.language = language;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ComparisonConfig, PolicyCompareError> {
        let c = &self.config;
        if c.min_documents == 0 {
            return Err(PolicyCompareError::InvalidConfig(
                "Minimum document count must be ≥ 1".into(),
            ));
        }
        if c.max_documents < c.min_documents {
            return Err(PolicyCompareError::InvalidConfig(format!(
                "Maximum document count ({}) is below the minimum ({})",
                c.max_documents, c.min_documents
            )));
        }
        if c.max_tokens == 0 {
            return Err(PolicyCompareError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which external model integration answers the comparison request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelBackend {
    /// Gemini `generateContent` with native `responseSchema` enforcement. (default)
    #[default]
    Gemini,
    /// Any edgequake-llm provider; the schema is carried in the prompt.
    Provider,
}

/// Language used for prompts, the missing-data sentinel and export labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseLanguage {
    #[default]
    Turkish,
    English,
}

impl ResponseLanguage {
    /// The value the model is told to use for information it cannot find.
    pub fn unspecified_sentinel(self) -> &'static str {
        match self {
            ResponseLanguage::Turkish => "Belirtilmemiş",
            ResponseLanguage::English => "unspecified",
        }
    }
}
