//! Downloadable renditions of a comparison.
//!
//! - [`pdf`]  — paginated report (lopdf, Type1 Helvetica, WinAnsi text)
//! - [`xlsx`] — single-sheet workbook (zip + SpreadsheetML)
//!
//! Both renderers return bytes; [`write_export`] puts them on disk.

pub mod pdf;
pub mod xlsx;

use crate::config::ResponseLanguage;
use crate::error::PolicyCompareError;
use crate::pipeline::contract::ComparisonResult;
use std::path::Path;
use tracing::info;

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    /// Download name used when the caller gives none.
    pub fn default_file_name(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "sigorta-karsilastirma.pdf",
            ExportFormat::Xlsx => "sigorta-karsilastirma.xlsx",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Render `result` in `format`.
pub fn render(
    result: &ComparisonResult,
    format: ExportFormat,
    language: ResponseLanguage,
) -> Result<Vec<u8>, PolicyCompareError> {
    match format {
        ExportFormat::Pdf => pdf::render_report(result, &pdf::ReportOptions::new(language)),
        ExportFormat::Xlsx => xlsx::render_workbook(result, language),
    }
}

/// Render and write in one step.
pub async fn export_to_file(
    result: &ComparisonResult,
    format: ExportFormat,
    language: ResponseLanguage,
    path: impl AsRef<Path>,
) -> Result<(), PolicyCompareError> {
    let bytes = render(result, format, language)?;
    write_export(path, &bytes).await
}

/// Write export bytes to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_export(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), PolicyCompareError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| PolicyCompareError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await.map_err(write_err)?;

    // Temp file lives next to the target so the rename stays on one filesystem.
    let tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tokio::fs::write(tmp.path(), bytes).await.map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
