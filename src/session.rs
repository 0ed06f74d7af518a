//! User-visible comparison session.
//!
//! Holds what an interactive front end shows: the selected documents, a
//! loading flag, the last error message and the last result. Errors never
//! escape [`ComparisonSession::compare`]; they are turned into one message and
//! the session returns to the input-ready state.
//!
//! `compare` takes `&mut self`, so a session can only have one comparison in
//! flight at a time.

use crate::compare::compare_with_model;
use crate::config::{ComparisonConfig, ResponseLanguage};
use crate::error::PolicyCompareError;
use crate::output::ComparisonStats;
use crate::pipeline::contract::ComparisonResult;
use crate::pipeline::input::UploadedDocument;
use crate::pipeline::llm::ExtractionModel;
use tracing::{debug, info};

/// Session state for one user.
#[derive(Debug)]
pub struct ComparisonSession {
    config: ComparisonConfig,
    documents: Vec<UploadedDocument>,
    result: Option<ComparisonResult>,
    stats: Option<ComparisonStats>,
    last_error: Option<String>,
    loading: bool,
}

impl ComparisonSession {
    pub fn new(config: ComparisonConfig) -> Self {
        Self {
            config,
            documents: Vec::new(),
            result: None,
            stats: None,
            last_error: None,
            loading: false,
        }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Currently selected documents, in selection order.
    pub fn documents(&self) -> &[UploadedDocument] {
        &self.documents
    }

    pub fn result(&self) -> Option<&ComparisonResult> {
        self.result.as_ref()
    }

    pub fn stats(&self) -> Option<&ComparisonStats> {
        self.stats.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True once enough documents are selected to run a comparison.
    pub fn can_compare(&self) -> bool {
        !self.loading && self.documents.len() >= self.config.min_documents
    }

    /// Append documents; anything beyond `max_documents` is dropped.
    ///
    /// Returns how many of the offered documents were kept.
    pub fn add_documents(&mut self, docs: impl IntoIterator<Item = UploadedDocument>) -> usize {
        let before = self.documents.len();
        self.documents.extend(docs);
        self.documents.truncate(self.config.max_documents);
        let added = self.documents.len() - before;
        debug!("Session holds {} documents ({} added)", self.documents.len(), added);
        added
    }

    /// Remove a document by its session token.
    pub fn remove(&mut self, id: &str) -> Option<UploadedDocument> {
        let pos = self.documents.iter().position(|d| d.id == id)?;
        Some(self.documents.remove(pos))
    }

    /// Clear documents, result and error.
    pub fn reset(&mut self) {
        self.documents.clear();
        self.result = None;
        self.stats = None;
        self.last_error = None;
        self.loading = false;
    }

    /// Run a comparison over the selected documents.
    ///
    /// On success the previous result is replaced wholesale; on failure the
    /// result is cleared and [`Self::last_error`] holds a readable message.
    /// The model is never called when too few documents are selected.
    pub async fn compare<M: ExtractionModel>(&mut self, model: &M) -> Option<&ComparisonResult> {
        if self.documents.len() < self.config.min_documents {
            self.last_error = Some(insufficient_message(
                self.config.language,
                self.config.min_documents,
            ));
            return None;
        }

        self.loading = true;
        self.last_error = None;
        self.result = None;
        self.stats = None;

        let outcome = compare_with_model(&self.documents, model, &self.config).await;
        self.loading = false;

        match outcome {
            Ok(output) => {
                info!("Session comparison produced {} policies", output.result.policies.len());
                self.stats = Some(output.stats);
                self.result = Some(output.result);
                self.result.as_ref()
            }
            Err(e) => {
                self.last_error = Some(user_message(&e, self.config.language));
                None
            }
        }
    }
}

/// The message shown for a failed comparison.
///
/// Document, format and extraction failures are worded in the session
/// language; everything else falls back to the error's own text.
pub fn user_message(err: &PolicyCompareError, language: ResponseLanguage) -> String {
    match (language, err) {
        (ResponseLanguage::Turkish, PolicyCompareError::DocumentRead { name, detail }) => {
            format!("Dosya okunamadı: {name} ({detail})")
        }
        (ResponseLanguage::Turkish, PolicyCompareError::UnsupportedFormat { .. }) => {
            "Desteklenmeyen dosya formatı. Lütfen PDF veya Excel dosyası yüklediğinizden emin olun."
                .to_string()
        }
        (ResponseLanguage::Turkish, PolicyCompareError::Extraction(detail)) => {
            format!("Veri üretilemedi: {detail}")
        }
        (ResponseLanguage::English, PolicyCompareError::DocumentRead { name, detail }) => {
            format!("Could not read file: {name} ({detail})")
        }
        (ResponseLanguage::English, PolicyCompareError::UnsupportedFormat { .. }) => {
            "Unsupported file format. Make sure you uploaded PDF or Excel files.".to_string()
        }
        (ResponseLanguage::English, PolicyCompareError::Extraction(detail)) => {
            format!("No data could be produced: {detail}")
        }
        (_, other) => other.to_string(),
    }
}

/// The message shown when fewer than `min` documents are selected.
pub fn insufficient_message(language: ResponseLanguage, min: usize) -> String {
    match language {
        ResponseLanguage::Turkish => {
            format!("Lütfen karşılaştırma yapmak için en az {min} dosya yükleyin.")
        }
        ResponseLanguage::English => {
            format!("Please upload at least {min} files to run a comparison.")
        }
    }
}
