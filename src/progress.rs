//! Progress-callback trait for comparison events.
//!
//! Inject an [`Arc<dyn ComparisonProgressCallback>`] via
//! [`crate::config::ComparisonConfigBuilder::progress_callback`] to receive
//! events as the pipeline normalises each document and calls the model.
//!
//! # Example
//!
//! ```rust
//! use edgequake_policy_compare::{ComparisonConfig, ComparisonProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     normalised: AtomicUsize,
//! }
//!
//! impl ComparisonProgressCallback for CountingCallback {
//!     fn on_document_normalized(&self, index: usize, name: &str, textual: bool) {
//!         self.normalised.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("#{index} {name} ready (text: {textual})");
//!     }
//! }
//!
//! let config = ComparisonConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { normalised: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the comparison pipeline at each stage.
///
/// Documents are normalised concurrently, so `on_document_normalized` may be
/// called from different tasks in any order. All methods default to no-ops.
pub trait ComparisonProgressCallback: Send + Sync {
    /// Called once before any document is read.
    fn on_comparison_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document has been turned into a payload.
    ///
    /// # Arguments
    /// * `index`   — 0-based submission position
    /// * `name`    — display name of the document
    /// * `textual` — true when the payload is extracted text rather than binary
    fn on_document_normalized(&self, index: usize, name: &str, textual: bool) {
        let _ = (index, name, textual);
    }

    /// Called just before the single model request is sent.
    fn on_request_sent(&self, parts: usize) {
        let _ = parts;
    }

    /// Called when the model answer parsed into a result.
    fn on_comparison_complete(&self, policies: usize) {
        let _ = policies;
    }

    /// Called when the comparison aborts.
    fn on_comparison_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ComparisonProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ComparisonConfig`].
pub type ProgressCallback = Arc<dyn ComparisonProgressCallback>;
