//! Input documents: what the user selected, before any conversion.
//!
//! An [`UploadedDocument`] is either a local file (read lazily, only when the
//! normaliser needs the bytes) or an in-memory buffer handed over by an
//! embedding application. Its media type is *declared*: taken from the caller
//! or derived from the file-name suffix, never sniffed from content.

use crate::error::PolicyCompareError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Media type used when a suffix is not recognised.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Where the raw bytes of a document live.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A local file, read on demand.
    Path(PathBuf),
    /// Content already held in memory.
    Bytes(Arc<[u8]>),
}

/// A document selected for comparison.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Session-local random token used for list rendering and removal.
    pub id: String,
    /// Display name (file name).
    pub name: String,
    /// Declared media type.
    pub media_type: String,
    /// Size in bytes.
    pub size: u64,
    pub source: DocumentSource,
}

impl UploadedDocument {
    /// Wrap an in-memory buffer.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            id: new_token(),
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            source: DocumentSource::Bytes(Arc::from(bytes)),
        }
    }

    /// Reference a local file, validating it exists and is readable.
    ///
    /// The media type is declared from the suffix via [`media_type_for_name`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PolicyCompareError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(PolicyCompareError::FileNotFound { path });
        }

        let size = match std::fs::File::open(&path).and_then(|f| f.metadata()) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(PolicyCompareError::PermissionDenied { path });
            }
            Err(_) => return Err(PolicyCompareError::FileNotFound { path }),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = media_type_for_name(&name).to_string();

        debug!("Resolved local document: {} ({}, {} bytes)", path.display(), media_type, size);

        Ok(Self {
            id: new_token(),
            name,
            media_type,
            size,
            source: DocumentSource::Path(path),
        })
    }

    /// Override the declared media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Read the raw content.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            DocumentSource::Path(p) => tokio::fs::read(p).await,
            DocumentSource::Bytes(b) => Ok(b.to_vec()),
        }
    }

    /// Read the content as text. Invalid UTF-8 sequences become U+FFFD;
    /// valid UTF-8 comes back unchanged.
    pub async fn read_text(&self) -> std::io::Result<String> {
        match &self.source {
            DocumentSource::Path(p) => {
                let bytes = tokio::fs::read(p).await?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            DocumentSource::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Declare a media type from the file-name suffix.
pub fn media_type_for_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsm" => "application/vnd.ms-excel.sheet.macroEnabled.12",
        "xls" => "application/vnd.ms-excel",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => OCTET_STREAM,
    }
}

fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
