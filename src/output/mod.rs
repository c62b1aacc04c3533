//! Output module for persisting crawl artifacts
//!
//! This module handles:
//! - The per-project directory layout
//! - Deterministic, collision-safe file names derived from URLs
//! - Per-page JSON records, chunk text files, raw payloads and PDFs
//! - The run summary (`metadata.json`)

mod exporter;
mod filename;
mod layout;
mod metadata;
mod pdf;

pub use exporter::{EmittedPaths, Exporter, JsonRecord};
pub use filename::{file_stem, sanitize_path, MAX_STEM_PATH_CHARS};
pub use layout::OutputLayout;
pub use metadata::{read_metadata, write_metadata, RunMetadata};
pub use pdf::{PdfRenderer, TextPdfRenderer};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to render PDF: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Kinds of per-page output, each with its own subdirectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    RawHtml,
    Json,
    Txt,
    Pdf,
}

impl OutputFormat {
    /// Subdirectory name (and serialized form)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawHtml => "raw_html",
            Self::Json => "json",
            Self::Txt => "txt",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A secondary output that could not be written for a page
///
/// The page itself still counts as processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub url: String,
    pub format: OutputFormat,
    pub error: String,
}

/// Writes `bytes` to `path` through a temporary file in the same directory
///
/// Readers never observe a half-written file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> ExportResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let result = async {
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(source) = result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(ExportError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}
