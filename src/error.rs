//! Error types for the edgequake-policy-compare library.
//!
//! A comparison is atomic: either every document is normalised, the model
//! answers once and the answer parses, or the whole run fails with a single
//! [`PolicyCompareError`]. There is no per-document partial result, so there
//! is only one error type.
//!
//! The variants are grouped by the stage that produces them:
//!
//! * **Input**: too few documents, missing or unreadable paths.
//! * **Normalisation**: [`PolicyCompareError::DocumentRead`] names the file
//!   that could not be converted into a payload.
//! * **Model**: unsupported content type, empty or malformed reply, provider
//!   and transport failures.
//! * **Export**: report/workbook rendering and output writes.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-policy-compare library.
#[derive(Debug, Error)]
pub enum PolicyCompareError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Fewer documents were supplied than the configured minimum.
    #[error("At least {min} documents are required for a comparison, got {got}")]
    InsufficientDocuments { min: usize, got: usize },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Normalisation errors ──────────────────────────────────────────────
    /// A document could not be converted into a model payload.
    #[error("Could not read document '{name}': {detail}")]
    DocumentRead { name: String, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model rejected one of the submitted content types.
    #[error(
        "Unsupported file format. Make sure you uploaded PDF or spreadsheet files.\n\
         Provider said: {detail}"
    )]
    UnsupportedFormat { detail: String },

    /// The model returned no text, or text that does not match the contract.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call failed for any other reason; carries the original message.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Rendering a report or workbook failed.
    #[error("Failed to render {format} export: {detail}")]
    ExportFailed { format: &'static str, detail: String },

    /// Could not create or write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PolicyCompareError {
    /// True for failures raised before any external call was made.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PolicyCompareError::InsufficientDocuments { .. }
                | PolicyCompareError::FileNotFound { .. }
                | PolicyCompareError::PermissionDenied { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_documents_display() {
        let e = PolicyCompareError::InsufficientDocuments { min: 2, got: 1 };
        let msg = e.to_string();
        assert!(msg.contains("2 documents"), "got: {msg}");
        assert!(msg.contains("got 1"), "got: {msg}");
        assert!(e.is_input_error());
    }

    #[test]
    fn document_read_names_file() {
        let e = PolicyCompareError::DocumentRead {
            name: "teklif.xlsx".into(),
            detail: "invalid zip header".into(),
        };
        assert!(e.to_string().contains("teklif.xlsx"));
        assert!(!e.is_input_error());
    }

    #[test]
    fn unsupported_format_suggests_pdf_or_spreadsheet() {
        let e = PolicyCompareError::UnsupportedFormat {
            detail: "Unsupported MIME type: application/zip".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("PDF or spreadsheet"));
        assert!(msg.contains("application/zip"));
    }

    #[test]
    fn llm_api_error_keeps_original_message() {
        let e = PolicyCompareError::LlmApiError {
            message: "quota exceeded".into(),
        };
        assert_eq!(e.to_string(), "LLM API error: quota exceeded");
    }
}
