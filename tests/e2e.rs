//! End-to-end tests for edgequake-policy-compare.
//!
//! Most tests drive the whole pipeline (input → normalise → request → model
//! → parse → export) against a scripted model, so they run offline.
//!
//! The live tests at the bottom call Gemini with files from `./test_cases/`
//! and are gated behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use edgequake_policy_compare::export::pdf::{render_report, ReportOptions};
use edgequake_policy_compare::export::xlsx::{render_workbook, WorkbookWriter};
use edgequake_policy_compare::pipeline::request::{ContentPart, ExtractionRequest};
use edgequake_policy_compare::present::{header_row, FieldLabels};
use edgequake_policy_compare::{
    compare_documents, compare_paths, compare_with_model, export_to_file, ComparisonConfig,
    ComparisonProgressCallback, ComparisonSession, ExportFormat, ExtractionModel, ModelError,
    ModelResponse, PolicyCompareError, ResponseLanguage, UploadedDocument,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Model that replies with a fixed body and records what it was sent.
struct ScriptedModel {
    reply: Result<Option<String>, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ExtractionRequest>>,
}

impl ScriptedModel {
    fn replying(body: &str) -> Self {
        Self {
            reply: Ok(Some(body.to_string())),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answers without any text part.
    fn silent() -> Self {
        Self {
            reply: Ok(None),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn request(&self) -> ExtractionRequest {
        self.last_request
            .lock()
            .unwrap()
            .clone()
            .expect("model was not called")
    }
}

impl ExtractionModel for ScriptedModel {
    fn label(&self) -> String {
        "scripted".into()
    }

    async fn generate(&self, request: &ExtractionRequest) -> Result<ModelResponse, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.reply {
            Ok(body) => Ok(ModelResponse {
                text: body.clone(),
                input_tokens: 1200,
                output_tokens: 300,
            }),
            Err(message) => Err(ModelError::Api {
                status: Some(400),
                message: message.clone(),
            }),
        }
    }
}

/// Progress callback that records every event it receives.
#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
    normalized: Mutex<Vec<(usize, String, bool)>>,
}

impl ComparisonProgressCallback for RecordingCallback {
    fn on_comparison_start(&self, total_documents: usize) {
        self.events.lock().unwrap().push(format!("start:{total_documents}"));
    }

    fn on_document_normalized(&self, index: usize, name: &str, textual: bool) {
        self.normalized.lock().unwrap().push((index, name.to_string(), textual));
    }

    fn on_request_sent(&self, parts: usize) {
        self.events.lock().unwrap().push(format!("sent:{parts}"));
    }

    fn on_comparison_complete(&self, policies: usize) {
        self.events.lock().unwrap().push(format!("complete:{policies}"));
    }

    fn on_comparison_error(&self, error: &str) {
        self.events.lock().unwrap().push(format!("error:{error}"));
    }
}

fn policy_json(company: &str, premium: f64) -> String {
    format!(
        r#"{{"companyName":"{company}","policyType":"Kasko","premiumAmount":{premium},"currency":"TL","coverageAmount":"1.000.000 TL","deductible":"Yok","limits":["İMM 5.000.000 TL"],"pros":["Geniş servis ağı"],"cons":["Belirtilmemiş"]}}"#
    )
}

fn reply(policies: &[(&str, f64)]) -> String {
    let items: Vec<String> = policies.iter().map(|(c, p)| policy_json(c, *p)).collect();
    format!(
        r#"{{"policies":[{}],"summary":"Karşılaştırma özeti."}}"#,
        items.join(",")
    )
}

fn pdf(name: &str, body: &[u8]) -> UploadedDocument {
    UploadedDocument::from_bytes(name, "application/pdf", body.to_vec())
}

fn csv(name: &str, body: &str) -> UploadedDocument {
    UploadedDocument::from_bytes(name, "text/csv", body.as_bytes().to_vec())
}

fn xlsx(name: &str, rows: &[&[&str]]) -> UploadedDocument {
    let rows = rows
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
    let mut wb = WorkbookWriter::new();
    wb.add_sheet("Teklif", rows, &[]);
    UploadedDocument::from_bytes(
        name,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        wb.finish().unwrap(),
    )
}

fn sheet_cell(bytes: Vec<u8>, sheet: &str, row: u32, col: u32) -> String {
    let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
    let range = wb.worksheet_range(sheet).unwrap();
    match range.get_value((row, col)) {
        Some(Data::String(s)) => s.clone(),
        other => format!("{other:?}"),
    }
}

/// Row index of `label` in column A of the comparison sheet.
fn row_of(bytes: &[u8], label: &str) -> Option<u32> {
    let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    let range = wb.worksheet_range("Karşılaştırma").unwrap();
    (0..range.height() as u32).find(|&r| {
        matches!(range.get_value((r, 0)), Some(Data::String(s)) if s == label)
    })
}

// ── Pipeline with a scripted model ───────────────────────────────────────────

#[tokio::test]
async fn test_order_and_count_preserved() {
    let docs = vec![
        pdf("anadolu.pdf", b"%PDF-1.4 anadolu"),
        pdf("allianz.pdf", b"%PDF-1.4 allianz"),
        csv("axa.csv", "Sirket;Prim\nAXA;11000\n"),
    ];
    let model = ScriptedModel::replying(&reply(&[
        ("Anadolu", 12500.0),
        ("Allianz", 9800.0),
        ("AXA", 11000.0),
    ]));
    let config = ComparisonConfig::default();

    let out = compare_with_model(&docs, &model, &config).await.unwrap();
    let names: Vec<&str> = out.result.policies.iter().map(|p| p.company_name.as_str()).collect();
    assert_eq!(names, vec!["Anadolu", "Allianz", "AXA"]);
    assert_eq!(out.stats.documents, 3);
    assert_eq!(out.stats.binary_payloads, 2);
    assert_eq!(out.stats.textual_payloads, 1);
    assert_eq!(out.stats.input_tokens, 1200);
    assert!(!out.stats.count_mismatch());

    // One call; parts in submission order, instruction last.
    assert_eq!(model.calls(), 1);
    let request = model.request();
    assert_eq!(request.parts.len(), 4);
    assert_eq!(request.document_parts(), 3);
    match &request.parts[0] {
        ContentPart::InlineData { media_type, data } => {
            assert_eq!(media_type, "application/pdf");
            assert_eq!(STANDARD.decode(data).unwrap(), b"%PDF-1.4 anadolu");
        }
        other => panic!("expected inline data, got {other:?}"),
    }
    match &request.parts[2] {
        ContentPart::Text(text) => {
            assert!(text.starts_with("File Name: axa.csv\nFile Type: CSV\nContent:\n"));
            assert!(text.ends_with("Sirket;Prim\nAXA;11000\n"));
        }
        other => panic!("expected text part, got {other:?}"),
    }
    assert!(matches!(request.parts[3], ContentPart::Text(_)));
    assert_eq!(request.model, "gemini-2.5-flash");
}

#[tokio::test]
async fn test_invalid_json_is_extraction_error() {
    let docs = vec![pdf("a.pdf", b"%PDF"), pdf("b.pdf", b"%PDF")];
    let model = ScriptedModel::replying("{\"policies\": [ oops");
    let err = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyCompareError::Extraction(_)), "{err:?}");

    let mut session = ComparisonSession::new(ComparisonConfig::default());
    session.add_documents(docs);
    assert!(session.compare(&model).await.is_none());
    assert!(session.result().is_none());
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn test_empty_reply_is_extraction_error() {
    let docs = vec![pdf("a.pdf", b"%PDF"), pdf("b.pdf", b"%PDF")];
    let model = ScriptedModel::replying("   ");
    let err = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyCompareError::Extraction(_)));
}

#[tokio::test]
async fn test_reply_without_text_is_extraction_error() {
    let docs = vec![pdf("a.pdf", b"%PDF"), pdf("b.pdf", b"%PDF")];
    let model = ScriptedModel::silent();
    let err = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyCompareError::Extraction(_)), "{err:?}");
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_progress_events_on_success() {
    let recorder = Arc::new(RecordingCallback::default());
    let config = ComparisonConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let docs = vec![pdf("a.pdf", b"%PDF"), csv("b.csv", "Sirket,Prim\nB,2\n")];
    let model = ScriptedModel::replying(&reply(&[("A", 1.0), ("B", 2.0)]));

    compare_with_model(&docs, &model, &config).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events, vec!["start:2", "sent:3", "complete:2"]);

    let mut normalized = recorder.normalized.lock().unwrap().clone();
    normalized.sort();
    assert_eq!(
        normalized,
        vec![(0, "a.pdf".to_string(), false), (1, "b.csv".to_string(), true)]
    );
}

#[tokio::test]
async fn test_progress_error_event_on_failure() {
    let recorder = Arc::new(RecordingCallback::default());
    let config = ComparisonConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let docs = vec![pdf("a.pdf", b"%PDF"), pdf("b.pdf", b"%PDF")];

    compare_with_model(&docs, &ScriptedModel::silent(), &config)
        .await
        .unwrap_err();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.len(), 3, "{events:?}");
    assert_eq!(events[0], "start:2");
    assert_eq!(events[1], "sent:3");
    assert!(events[2].starts_with("error:"), "{events:?}");
}

#[tokio::test]
async fn test_too_few_documents_rejected_before_model() {
    let config = ComparisonConfig::default();
    for docs in [vec![], vec![pdf("only.pdf", b"%PDF")]] {
        let err = compare_documents(&docs, &config).await.unwrap_err();
        assert!(
            matches!(err, PolicyCompareError::InsufficientDocuments { min: 2, .. }),
            "{err:?}"
        );
        assert!(err.is_input_error());

        let model = ScriptedModel::replying(&reply(&[("A", 1.0)]));
        let mut session = ComparisonSession::new(config.clone());
        session.add_documents(docs);
        assert!(session.compare(&model).await.is_none());
        assert_eq!(model.calls(), 0);
    }
}

#[tokio::test]
async fn test_spreadsheet_premium_renders_in_tr_locale() {
    let docs = vec![
        xlsx("anadolu.xlsx", &[&["Şirket", "Prim"], &["Anadolu", "₺12.500,00"]]),
        pdf("allianz.pdf", b"%PDF-1.4"),
    ];
    let model = ScriptedModel::replying(&reply(&[("Anadolu", 12500.0), ("Allianz", 9800.0)]));
    let out = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap();

    // The spreadsheet reached the model as text with the literal amount.
    let request = model.request();
    match &request.parts[0] {
        ContentPart::Text(text) => {
            assert!(text.contains("File Type: Excel"));
            assert!(text.contains("--- Sheet: Teklif ---"));
            assert!(text.contains("₺12.500,00"), "payload: {text}");
        }
        other => panic!("expected text part, got {other:?}"),
    }

    // The workbook export shows the premium formatted for tr-TR.
    let bytes = render_workbook(&out.result, ResponseLanguage::Turkish).unwrap();
    let row = row_of(&bytes, "Prim Tutarı").expect("Prim Tutarı row");
    assert_eq!(sheet_cell(bytes, "Karşılaştırma", row, 1), "12.500 TL");

    // And so does the PDF report (searching the decompressed page content).
    let pdf_bytes = render_report(&out.result, &ReportOptions::new(ResponseLanguage::Turkish)).unwrap();
    let doc = lopdf::Document::load_mem(&pdf_bytes).unwrap();
    let page = *doc.get_pages().values().next().unwrap();
    let content = doc.get_page_content(page).unwrap();
    assert!(String::from_utf8_lossy(&content).contains("12.500 TL"));
}

#[tokio::test]
async fn test_fewer_policies_than_documents_accepted() {
    let docs = vec![pdf("a.pdf", b"%PDF"), pdf("b.pdf", b"%PDF"), pdf("c.pdf", b"%PDF")];
    let model = ScriptedModel::replying(&reply(&[("A", 1000.0), ("B", 2000.0)]));
    let out = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap();

    assert_eq!(out.result.policies.len(), 2);
    assert!(out.stats.count_mismatch());

    let labels = FieldLabels::workbook(ResponseLanguage::Turkish);
    assert_eq!(header_row(&out.result, &labels).len(), 3);

    let bytes = render_workbook(&out.result, ResponseLanguage::Turkish).unwrap();
    let header = row_of(&bytes, "Özellik").unwrap();
    assert_eq!(sheet_cell(bytes.clone(), "Karşılaştırma", header, 1), "A");
    assert_eq!(sheet_cell(bytes.clone(), "Karşılaştırma", header, 2), "B");
    let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
    let range = wb.worksheet_range("Karşılaştırma").unwrap();
    assert_eq!(range.width(), 3, "label column + 2 policy columns");
}

#[tokio::test]
async fn test_corrupt_workbook_aborts_without_model_call() {
    let docs = vec![
        UploadedDocument::from_bytes(
            "broken.xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            b"definitely not a zip".to_vec(),
        ),
        pdf("ok.pdf", b"%PDF"),
    ];
    let model = ScriptedModel::replying(&reply(&[("A", 1.0)]));
    let err = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap_err();
    match err {
        PolicyCompareError::DocumentRead { name, .. } => assert_eq!(name, "broken.xlsx"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_unsupported_mime_is_reported_as_format_error() {
    let docs = vec![
        UploadedDocument::from_bytes("setup.exe", "application/x-msdownload", b"MZ".to_vec()),
        pdf("ok.pdf", b"%PDF"),
    ];
    let model = ScriptedModel::failing("Unsupported MIME type: application/x-msdownload");
    let err = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyCompareError::UnsupportedFormat { .. }), "{err:?}");
    assert!(err.to_string().contains("PDF or spreadsheet"));
}

#[tokio::test]
async fn test_documents_from_disk_and_export_to_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.csv");
    std::fs::write(&a, b"%PDF-1.4 from disk").unwrap();
    std::fs::write(&b, "Sirket,Prim\nB,2000\n").unwrap();

    let docs = vec![
        UploadedDocument::from_path(&a).unwrap(),
        UploadedDocument::from_path(&b).unwrap(),
    ];
    assert_eq!(docs[1].media_type, "text/csv");

    let model = ScriptedModel::replying(&reply(&[("A", 1500.0), ("B", 2000.0)]));
    let out = compare_with_model(&docs, &model, &ComparisonConfig::default())
        .await
        .unwrap();

    let pdf_path = dir.path().join("out").join(ExportFormat::Pdf.default_file_name());
    let xlsx_path = dir.path().join("out").join(ExportFormat::Xlsx.default_file_name());
    export_to_file(&out.result, ExportFormat::Pdf, ResponseLanguage::Turkish, &pdf_path)
        .await
        .unwrap();
    export_to_file(&out.result, ExportFormat::Xlsx, ResponseLanguage::Turkish, &xlsx_path)
        .await
        .unwrap();

    assert!(std::fs::read(&pdf_path).unwrap().starts_with(b"%PDF"));
    let xlsx_bytes = std::fs::read(&xlsx_path).unwrap();
    assert_eq!(
        sheet_cell(xlsx_bytes, "Karşılaştırma", 0, 1),
        "Karşılaştırma özeti."
    );
}

#[tokio::test]
async fn test_missing_file_is_input_error() {
    let err = compare_paths(&["/no/such/a.pdf", "/no/such/b.pdf"], &ComparisonConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyCompareError::FileNotFound { .. }));
}

// ── Live tests (Gemini) ──────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

#[tokio::test]
async fn test_live_gemini_comparison() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 and GEMINI_API_KEY to run");
        return;
    }
    let files: Vec<PathBuf> = ["policy_a.pdf", "policy_b.pdf"]
        .iter()
        .map(|f| test_cases_dir().join(f))
        .collect();
    if let Some(missing) = files.iter().find(|p| !p.exists()) {
        println!("SKIP — test file not found: {}", missing.display());
        return;
    }

    let out = compare_paths(&files, &ComparisonConfig::default())
        .await
        .expect("live comparison failed");
    assert!(!out.result.policies.is_empty());
    assert!(!out.result.summary.trim().is_empty());
    for p in &out.result.policies {
        assert!(!p.company_name.trim().is_empty());
        assert!(p.premium_amount >= 0.0);
    }
    println!("{}", serde_json::to_string_pretty(&out).unwrap());
}
