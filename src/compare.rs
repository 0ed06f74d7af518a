//! Comparison entry points.
//!
//! A comparison is a single pass:
//!
//! ```text
//! documents ──▶ normalise (concurrent) ──▶ one request ──▶ model ──▶ parse
//! ```
//!
//! Every failure aborts the whole run; nothing partial is returned. All
//! documents go into one call so the model can reason across them for the
//! summary, at the cost of per-document error isolation.

use crate::config::{ComparisonConfig, ModelBackend};
use crate::error::PolicyCompareError;
use crate::output::{ComparisonOutput, ComparisonStats};
use crate::pipeline::contract::parse_comparison;
use crate::pipeline::input::UploadedDocument;
use crate::pipeline::llm::{
    ExtractionModel, GeminiModel, ModelError, ModelResponse, ProviderModel,
};
use crate::pipeline::normalize::{normalize_document, NormalizedPayload};
use crate::pipeline::request::{build_request, ExtractionRequest};
use futures::future::try_join_all;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compare documents with the model selected by `config`.
///
/// Rejects fewer than `config.min_documents` documents before any I/O.
///
/// # Errors
/// - [`PolicyCompareError::InsufficientDocuments`] — too few documents
/// - [`PolicyCompareError::DocumentRead`] — a document could not be normalised
/// - [`PolicyCompareError::UnsupportedFormat`] — the model rejected a content type
/// - [`PolicyCompareError::Extraction`] — empty or malformed reply
/// - [`PolicyCompareError::LlmApiError`] — any other model failure
pub async fn compare_documents(
    docs: &[UploadedDocument],
    config: &ComparisonConfig,
) -> Result<ComparisonOutput, PolicyCompareError> {
    ensure_minimum(docs.len(), config.min_documents)?;
    let model = resolve_model(config)?;
    compare_with_model(docs, &model, config).await
}

/// Compare local files by path.
pub async fn compare_paths<P: AsRef<Path>>(
    paths: &[P],
    config: &ComparisonConfig,
) -> Result<ComparisonOutput, PolicyCompareError> {
    let docs = paths
        .iter()
        .map(UploadedDocument::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    compare_documents(&docs, config).await
}

/// Synchronous wrapper around [`compare_documents`].
///
/// Creates a temporary tokio runtime internally.
pub fn compare_sync(
    docs: &[UploadedDocument],
    config: &ComparisonConfig,
) -> Result<ComparisonOutput, PolicyCompareError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PolicyCompareError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(compare_documents(docs, config))
}

/// Run a comparison against an explicit model.
///
/// Requires at least one document; the caller owns any higher minimum.
/// The reply is returned verbatim, even when it holds a different number of
/// policies than documents submitted.
pub async fn compare_with_model<M: ExtractionModel>(
    docs: &[UploadedDocument],
    model: &M,
    config: &ComparisonConfig,
) -> Result<ComparisonOutput, PolicyCompareError> {
    let total_start = Instant::now();
    ensure_minimum(docs.len(), 1)?;
    info!("Starting comparison of {} documents with {}", docs.len(), model.label());

    if let Some(ref cb) = config.progress_callback {
        cb.on_comparison_start(docs.len());
    }

    let outcome = run(docs, model, config).await;

    match outcome {
        Ok((result_text, response, payloads, normalize_ms, llm_ms)) => {
            let result = match parse_comparison(&result_text) {
                Ok(r) => r,
                Err(e) => return Err(report_error(config, e)),
            };

            let stats = ComparisonStats {
                documents: docs.len(),
                textual_payloads: payloads.iter().filter(|p| p.is_textual()).count(),
                binary_payloads: payloads.iter().filter(|p| !p.is_textual()).count(),
                policies_returned: result.policies.len(),
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                normalize_duration_ms: normalize_ms,
                llm_duration_ms: llm_ms,
                total_duration_ms: total_start.elapsed().as_millis() as u64,
            };

            if stats.count_mismatch() {
                warn!(
                    "Model returned {} policies for {} documents",
                    stats.policies_returned, stats.documents
                );
            }
            info!(
                "Comparison complete: {} policies, {}ms total",
                stats.policies_returned, stats.total_duration_ms
            );

            if let Some(ref cb) = config.progress_callback {
                cb.on_comparison_complete(result.policies.len());
            }
            Ok(ComparisonOutput { result, stats })
        }
        Err(e) => Err(report_error(config, e)),
    }
}

type RunOutcome = (String, ModelResponse, Vec<NormalizedPayload>, u64, u64);

async fn run<M: ExtractionModel>(
    docs: &[UploadedDocument],
    model: &M,
    config: &ComparisonConfig,
) -> Result<RunOutcome, PolicyCompareError> {
    // ── Step 1: Normalise every document ─────────────────────────────────
    let normalize_start = Instant::now();
    let payloads = normalize_all(docs, config).await?;
    let normalize_ms = normalize_start.elapsed().as_millis() as u64;
    debug!("Normalised {} documents in {}ms", payloads.len(), normalize_ms);

    // ── Step 2: Build the single request ─────────────────────────────────
    let request: ExtractionRequest = build_request(&payloads, config);
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_sent(request.parts.len());
    }

    // ── Step 3: One model call ───────────────────────────────────────────
    let llm_start = Instant::now();
    let response = model
        .generate(&request)
        .await
        .map_err(translate_model_error)?;
    let llm_ms = llm_start.elapsed().as_millis() as u64;
    debug!(
        "Model answered in {}ms ({} in / {} out tokens)",
        llm_ms, response.input_tokens, response.output_tokens
    );

    // ── Step 4: Require text ─────────────────────────────────────────────
    let text = response
        .text
        .clone()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| PolicyCompareError::Extraction("the model returned no data".into()))?;

    Ok((text, response, payloads, normalize_ms, llm_ms))
}

/// Normalise all documents concurrently, keeping submission order.
///
/// The first failure aborts the lot.
pub async fn normalize_all(
    docs: &[UploadedDocument],
    config: &ComparisonConfig,
) -> Result<Vec<NormalizedPayload>, PolicyCompareError> {
    try_join_all(docs.iter().enumerate().map(|(idx, doc)| async move {
        let payload = normalize_document(doc).await?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_normalized(idx, &doc.name, payload.is_textual());
        }
        Ok::<_, PolicyCompareError>(payload)
    }))
    .await
}

/// Map a backend failure onto the public error taxonomy.
///
/// A rejected content type becomes [`PolicyCompareError::UnsupportedFormat`];
/// everything else keeps its original message.
pub fn translate_model_error(err: ModelError) -> PolicyCompareError {
    let message = err.message();
    let lower = message.to_lowercase();
    if lower.contains("unsupported mime type") || lower.contains("unsupported content type") {
        PolicyCompareError::UnsupportedFormat { detail: message }
    } else {
        PolicyCompareError::LlmApiError { message }
    }
}

fn ensure_minimum(got: usize, min: usize) -> Result<(), PolicyCompareError> {
    if got < min {
        return Err(PolicyCompareError::InsufficientDocuments { min, got });
    }
    Ok(())
}

fn report_error(config: &ComparisonConfig, e: PolicyCompareError) -> PolicyCompareError {
    warn!("Comparison failed: {}", e);
    if let Some(ref cb) = config.progress_callback {
        cb.on_comparison_error(&e.to_string());
    }
    e
}

// ── Model resolution ─────────────────────────────────────────────────────

/// The backend chosen by [`resolve_model`].
pub enum ResolvedModel {
    Gemini(GeminiModel),
    Provider(ProviderModel),
}

impl ExtractionModel for ResolvedModel {
    fn label(&self) -> String {
        match self {
            ResolvedModel::Gemini(m) => m.label(),
            ResolvedModel::Provider(m) => m.label(),
        }
    }

    async fn generate(&self, request: &ExtractionRequest) -> Result<ModelResponse, ModelError> {
        match self {
            ResolvedModel::Gemini(m) => m.generate(request).await,
            ResolvedModel::Provider(m) => m.generate(request).await,
        }
    }
}

/// Resolve the model, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider** (`config.provider_name`) — created through
///    edgequake-llm's `ProviderFactory` with the configured model.
/// 3. **Gemini backend** (default) — direct REST client with native schema
///    enforcement; needs an API key.
/// 4. **Provider backend without a name** — edgequake-llm auto-detection.
pub fn resolve_model(config: &ComparisonConfig) -> Result<ResolvedModel, PolicyCompareError> {
    if let Some(ref provider) = config.provider {
        return Ok(ResolvedModel::Provider(ProviderModel::new(
            provider.clone(),
            "custom",
        )));
    }

    if let Some(ref name) = config.provider_name {
        return ProviderModel::named(name, config.effective_model()).map(ResolvedModel::Provider);
    }

    match config.backend {
        ModelBackend::Gemini => GeminiModel::from_config(config).map(ResolvedModel::Gemini),
        ModelBackend::Provider => {
            ProviderModel::from_env(config.model.as_deref()).map(ResolvedModel::Provider)
        }
    }
}
