//! # edgequake-policy-compare
//!
//! Compare insurance policy documents side by side with a multimodal LLM.
//!
//! Upload two to six policy files (PDF, scanned images, Excel workbooks or
//! CSV exports). Each one is normalised into a payload the model can read,
//! all of them go out in a single request together with a strict JSON
//! schema, and the reply comes back as one record per policy plus a
//! comparative summary. The result can be shown as a terminal table, a
//! premium bar chart, a PDF report or an `.xlsx` workbook.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Input      path or bytes, media type declared from the file-name suffix
//!  ├─ 2. Normalise  workbook → CSV text per sheet, CSV → text, rest → base64
//!  ├─ 3. Request    payloads in order + instruction + response schema
//!  ├─ 4. Model      one call (Gemini REST or an edgequake-llm provider)
//!  ├─ 5. Parse      reply → ComparisonResult
//!  └─ 6. Present    table / chart / PDF / XLSX
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_policy_compare::{compare_paths, ComparisonConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini key from GEMINI_API_KEY
//!     let config = ComparisonConfig::default();
//!     let output = compare_paths(&["kasko-a.pdf", "kasko-b.xlsx"], &config).await?;
//!     for policy in &output.result.policies {
//!         println!("{}: {} {}", policy.company_name, policy.premium_amount, policy.currency);
//!     }
//!     println!("{}", output.result.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `policycmp` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-policy-compare = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Schema enforcement | Configure with |
//! |---------|--------------------|----------------|
//! | Gemini (default) | native `responseSchema` | `GEMINI_API_KEY` |
//! | edgequake-llm provider | schema embedded in the prompt | `--provider openai` / `EDGEQUAKE_LLM_PROVIDER` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compare::{compare_documents, compare_paths, compare_sync, compare_with_model};
pub use config::{ComparisonConfig, ComparisonConfigBuilder, ModelBackend, ResponseLanguage};
pub use error::PolicyCompareError;
pub use export::{export_to_file, write_export, ExportFormat};
pub use output::{ComparisonOutput, ComparisonStats};
pub use pipeline::contract::{ComparisonResult, ExtractedPolicyRecord};
pub use pipeline::input::UploadedDocument;
pub use pipeline::llm::{ExtractionModel, GeminiModel, ModelError, ModelResponse, ProviderModel};
pub use progress::{ComparisonProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::ComparisonSession;
