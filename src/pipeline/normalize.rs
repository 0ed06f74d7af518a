//! Document normalisation: `UploadedDocument` → `NormalizedPayload`.
//!
//! Multimodal model APIs read PDFs and images natively, so those are passed
//! through as base64 with their declared media type. Spreadsheets are not
//! accepted as inline data by the model, so workbooks and delimited text are
//! converted to plain text locally.
//!
//! ## Classification
//!
//! The payload shape is decided by the declared media type and the file-name
//! suffix alone:
//!
//! | Declared as | Payload |
//! |-------------|---------|
//! | `.csv` suffix, whatever the media type | text, verbatim |
//! | media type contains `sheet`/`excel`, or `.xls`/`.xlsx`/`.xlsm`/`.ods` | text, one CSV block per sheet |
//! | `text/csv` | text, verbatim |
//! | anything else (PDF, image, unknown) | binary, base64 |

use crate::error::PolicyCompareError;
use crate::pipeline::input::UploadedDocument;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Reader};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::io::Cursor;
use tracing::debug;

/// Which shape a document will be normalised into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Spreadsheet workbook, rendered to CSV text per sheet.
    Workbook,
    /// Delimited text, passed through verbatim.
    Delimited,
    /// PDF, image or unrecognised: inline base64.
    Binary,
}

/// Origin of a textual payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularSource {
    Workbook,
    Delimited,
}

/// A document converted for submission to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedPayload {
    /// Inline binary content.
    Binary {
        file_name: String,
        media_type: String,
        /// Standard-alphabet base64 of the raw bytes.
        data: String,
    },
    /// Extracted plain text.
    Text {
        file_name: String,
        source: TabularSource,
        content: String,
    },
}

impl NormalizedPayload {
    pub fn is_textual(&self) -> bool {
        matches!(self, NormalizedPayload::Text { .. })
    }

    pub fn file_name(&self) -> &str {
        match self {
            NormalizedPayload::Binary { file_name, .. } | NormalizedPayload::Text { file_name, .. } => {
                file_name
            }
        }
    }
}

/// Classify a document by declared media type and file-name suffix.
pub fn classify(name: &str, media_type: &str) -> PayloadKind {
    let name = name.to_ascii_lowercase();
    let media_type = media_type.to_ascii_lowercase();

    // Browsers on Windows declare CSV as application/vnd.ms-excel.
    if name.ends_with(".csv") {
        return PayloadKind::Delimited;
    }

    let is_workbook = media_type.contains("sheet")
        || media_type.contains("excel")
        || name.ends_with(".xls")
        || name.ends_with(".xlsx")
        || name.ends_with(".xlsm")
        || name.ends_with(".ods");
    if is_workbook {
        return PayloadKind::Workbook;
    }

    if media_type == "text/csv" {
        return PayloadKind::Delimited;
    }

    PayloadKind::Binary
}

/// Convert one document into exactly one payload.
///
/// Any read or decode failure aborts with [`PolicyCompareError::DocumentRead`]
/// naming the document. Reads are local, so there is no retry.
pub async fn normalize_document(
    doc: &UploadedDocument,
) -> Result<NormalizedPayload, PolicyCompareError> {
    let read_err = |detail: String| PolicyCompareError::DocumentRead {
        name: doc.name.clone(),
        detail,
    };

    match classify(&doc.name, &doc.media_type) {
        PayloadKind::Delimited => {
            let content = doc.read_text().await.map_err(|e| read_err(e.to_string()))?;
            debug!("{}: delimited text, {} bytes", doc.name, content.len());
            Ok(NormalizedPayload::Text {
                file_name: doc.name.clone(),
                source: TabularSource::Delimited,
                content,
            })
        }
        PayloadKind::Workbook => {
            let bytes = doc.read_bytes().await.map_err(|e| read_err(e.to_string()))?;
            // calamine is synchronous and CPU-bound on large workbooks
            let content = tokio::task::spawn_blocking(move || render_workbook(bytes))
                .await
                .map_err(|e| PolicyCompareError::Internal(format!("workbook task: {e}")))?
                .map_err(read_err)?;
            debug!("{}: workbook rendered to {} bytes of text", doc.name, content.len());
            Ok(NormalizedPayload::Text {
                file_name: doc.name.clone(),
                source: TabularSource::Workbook,
                content,
            })
        }
        PayloadKind::Binary => {
            let bytes = doc.read_bytes().await.map_err(|e| read_err(e.to_string()))?;
            let data = STANDARD.encode(&bytes);
            debug!("{}: {} → {} bytes base64", doc.name, doc.media_type, data.len());
            Ok(NormalizedPayload::Binary {
                file_name: doc.name.clone(),
                media_type: doc.media_type.clone(),
                data,
            })
        }
    }
}

/// Render every non-empty sheet of a workbook as a CSV block.
///
/// Sheets keep their stored order; each block is preceded by a
/// `--- Sheet: {name} ---` header line. Sheets with no content are skipped.
pub fn render_workbook(bytes: Vec<u8>) -> Result<String, String> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| e.to_string())?;

    let mut text = String::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| format!("sheet '{sheet_name}': {e}"))?;

        if range.is_empty() || range.used_cells().all(|(_, _, c)| matches!(c, Data::Empty)) {
            debug!("Skipping empty sheet '{}'", sheet_name);
            continue;
        }

        let csv = sheet_to_csv(range.rows())?;
        if csv.trim().is_empty() {
            continue;
        }

        text.push_str(&format!("--- Sheet: {sheet_name} ---\n{csv}\n\n"));
    }

    Ok(text)
}

fn sheet_to_csv<'a>(rows: impl Iterator<Item = &'a [Data]>) -> Result<String, String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        let record: Vec<String> = row.iter().map(cell_text).collect();
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    let mut csv = String::from_utf8(bytes).map_err(|e| e.to_string())?;
    if csv.ends_with('\n') {
        csv.pop();
    }
    Ok(csv)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string().to_uppercase(),
        Data::Error(e) => format!("#ERR:{e:?}"),
        Data::DateTime(dt) => excel_date_text(dt),
        Data::DateTimeIso(s) => iso_date_text(s),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Date cells as `dd.mm.yyyy`, with `HH:MM` only when the time is not midnight.
fn date_text(dt: NaiveDateTime) -> String {
    if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
        dt.format("%d.%m.%Y").to_string()
    } else {
        dt.format("%d.%m.%Y %H:%M").to_string()
    }
}

fn excel_date_text(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return dt.to_string();
    }
    dt.as_datetime().map(date_text).unwrap_or_else(|| dt.to_string())
}

// OpenDocument stores dates as ISO 8601 text.
fn iso_date_text(s: &str) -> String {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return date_text(dt);
    }
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => d.format("%d.%m.%Y").to_string(),
        Err(_) => s.to_string(),
    }
}
