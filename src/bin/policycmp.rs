//! CLI binary for edgequake-policy-compare.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ComparisonConfig`, runs one comparison session and prints or exports
//! the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_policy_compare::compare::resolve_model;
use edgequake_policy_compare::export::{export_to_file, ExportFormat};
use edgequake_policy_compare::present::{render_bar_chart, render_table, FieldLabels};
use edgequake_policy_compare::session::insufficient_message;
use edgequake_policy_compare::{
    ComparisonConfig, ComparisonOutput, ComparisonProgressCallback, ComparisonSession,
    ModelBackend, ProgressCallback, ResponseLanguage, UploadedDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

/// Bar colours, cycled per policy: blue, green, yellow, red, magenta, cyan.
const CHART_COLOURS: [&str; 6] = ["34", "32", "33", "31", "35", "36"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while documents are read and the model is working.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ComparisonProgressCallback for CliProgressCallback {
    fn on_comparison_start(&self, total_documents: usize) {
        self.bar.set_prefix("Reading");
        self.bar.set_message(format!("{total_documents} documents…"));
    }

    fn on_document_normalized(&self, index: usize, name: &str, textual: bool) {
        let kind = if textual { "text" } else { "inline" };
        self.bar.println(format!(
            "  {} #{:<2} {}  {}",
            green("✓"),
            index + 1,
            name,
            dim(kind)
        ));
    }

    fn on_request_sent(&self, parts: usize) {
        self.bar.set_prefix("Comparing");
        self.bar.set_message(format!("waiting for the model ({parts} parts)…"));
    }

    fn on_comparison_complete(&self, policies: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} policies compared", green("✔"), bold(&policies.to_string()));
    }

    // main() prints the localised message once the session has recorded it.
    fn on_comparison_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compare two policies in the terminal (Gemini, Turkish output)
  policycmp kasko-a.pdf kasko-b.pdf

  # Mix PDFs and spreadsheets, export both report formats
  policycmp teklif.pdf fiyatlar.xlsx eski.csv --pdf --xlsx

  # Choose export paths
  policycmp a.pdf b.pdf --pdf=out/rapor.pdf --xlsx=out/tablo.xlsx

  # English prompts and labels
  policycmp --language en a.pdf b.pdf

  # Use an edgequake-llm provider instead of Gemini
  policycmp --provider openai --model gpt-4.1 a.pdf b.pdf

  # Machine-readable output
  policycmp --json a.pdf b.pdf > result.json

SUPPORTED FILES:
  PDF, PNG/JPEG/WebP images      sent inline (base64)
  XLSX / XLS / XLSM / ODS        every non-empty sheet converted to CSV text
  CSV                            sent as text

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default backend)
  GOOGLE_API_KEY          Fallback for GEMINI_API_KEY
  EDGEQUAKE_LLM_PROVIDER  Use an edgequake-llm provider (openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL         Override model ID
  OPENAI_API_KEY          OpenAI key when the provider backend auto-detects
  POLICYCMP_*             Any flag below, e.g. POLICYCMP_LANGUAGE=en
"#;

/// Compare insurance policy documents side by side with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "policycmp",
    version,
    about = "Compare insurance policy documents side by side with an LLM",
    long_about = "Extract company, premium, coverage, deductible, limits, pros and cons from \
2–6 insurance policy documents (PDF, images, Excel, CSV) in a single LLM call, then print a \
comparison table and premium chart or export them as PDF / XLSX.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Policy documents to compare, in column order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write a PDF report (default name: sigorta-karsilastirma.pdf; `--pdf=PATH` to choose).
    #[arg(long, env = "POLICYCMP_PDF", num_args = 0..=1, require_equals = true,
          default_missing_value = "sigorta-karsilastirma.pdf")]
    pdf: Option<PathBuf>,

    /// Write an XLSX workbook (default name: sigorta-karsilastirma.xlsx; `--xlsx=PATH` to choose).
    #[arg(long, env = "POLICYCMP_XLSX", num_args = 0..=1, require_equals = true,
          default_missing_value = "sigorta-karsilastirma.xlsx")]
    xlsx: Option<PathBuf>,

    /// Output structured JSON (result + stats) instead of the table.
    #[arg(long, env = "POLICYCMP_JSON")]
    json: bool,

    /// Language of prompts, the missing-value marker and export labels.
    #[arg(long, env = "POLICYCMP_LANGUAGE", value_enum, default_value = "tr")]
    language: LanguageArg,

    /// Model backend: gemini (native JSON schema) or provider (edgequake-llm).
    #[arg(long, env = "POLICYCMP_BACKEND", value_enum, default_value = "gemini")]
    backend: BackendArg,

    /// Model ID (e.g. gemini-2.5-flash, gpt-4.1).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "edgequake-llm provider. Setting it selects the provider backend.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Fewest documents a comparison accepts.
    #[arg(long, env = "POLICYCMP_MIN_DOCUMENTS", default_value_t = 2)]
    min_documents: usize,

    /// Most documents a comparison accepts; extra files are ignored.
    #[arg(long, env = "POLICYCMP_MAX_DOCUMENTS", default_value_t = 6)]
    max_documents: usize,

    /// Path to a text file containing a custom instruction prompt.
    #[arg(long, env = "POLICYCMP_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "POLICYCMP_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "POLICYCMP_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, env = "POLICYCMP_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "POLICYCMP_NO_PROGRESS")]
    no_progress: bool,

    /// Skip the premium chart.
    #[arg(long, env = "POLICYCMP_NO_CHART")]
    no_chart: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "POLICYCMP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "POLICYCMP_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    Tr,
    En,
}

impl From<LanguageArg> for ResponseLanguage {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::Tr => ResponseLanguage::Turkish,
            LanguageArg::En => ResponseLanguage::English,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Gemini,
    Provider,
}

impl From<BackendArg> for ModelBackend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Gemini => ModelBackend::Gemini,
            BackendArg::Provider => ModelBackend::Provider,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress; keep library INFO logs out of its way.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and session ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ComparisonProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let language = config.language;

    let docs = cli
        .files
        .iter()
        .map(UploadedDocument::from_path)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to open input files")?;

    let mut session = ComparisonSession::new(config);
    let offered = docs.len();
    let kept = session.add_documents(docs);
    if kept < offered {
        warn!("Only the first {} of {} files are compared", kept, offered);
        if !cli.quiet {
            eprintln!(
                "{} only the first {} of {} files are compared",
                cyan("⚠"),
                kept,
                offered
            );
        }
    }

    if !session.can_compare() {
        anyhow::bail!("{}", insufficient_message(language, session.config().min_documents));
    }

    // ── Run comparison ───────────────────────────────────────────────────
    let model = resolve_model(session.config()).context("Failed to configure the model")?;
    if session.compare(&model).await.is_none() {
        let message = session.last_error().unwrap_or("Comparison failed");
        eprintln!("{} {}", red("✘"), red(message));
        std::process::exit(1);
    }

    let (Some(result), Some(stats)) = (session.result(), session.stats()) else {
        anyhow::bail!("Comparison produced no result");
    };

    // ── Print ────────────────────────────────────────────────────────────
    if cli.json {
        let output = ComparisonOutput {
            result: result.clone(),
            stats: stats.clone(),
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let labels = FieldLabels::workbook(language);
        println!("{}", render_table(result, &labels, 32));
        println!("{}", bold(labels.summary));
        println!("{}\n", result.summary);

        if !cli.no_chart && !result.policies.is_empty() {
            for (i, line) in render_bar_chart(result, 40).lines().enumerate() {
                let colour = CHART_COLOURS[i % CHART_COLOURS.len()];
                println!("\x1b[{colour}m{line}\x1b[0m");
            }
            println!();
        }
    }

    // ── Export ───────────────────────────────────────────────────────────
    let exports = [(cli.pdf.as_ref(), ExportFormat::Pdf), (cli.xlsx.as_ref(), ExportFormat::Xlsx)];
    for (path, format) in exports {
        let Some(path) = path else { continue };
        export_to_file(result, format, language, path)
            .await
            .with_context(|| format!("Failed to export {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
            stats.total_duration_ms,
        );
        if stats.count_mismatch() {
            eprintln!(
                "{} the model returned {} policies for {} documents",
                cyan("⚠"),
                stats.policies_returned,
                stats.documents
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ComparisonConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ComparisonConfig> {
    let mut builder = ComparisonConfig::builder()
        .backend(cli.backend.into())
        .language(cli.language.into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .min_documents(cli.min_documents)
        .max_documents(cli.max_documents);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
