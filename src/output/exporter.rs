//! Per-page exporter
//!
//! JSON records and chunk text files are the primary outputs: if either
//! cannot be written the export fails and the page counts as failed. The raw
//! payload and the PDF are secondary: their failures are returned as
//! partial failures alongside the files that were written.

use super::{
    file_stem, write_atomic, ExportResult, OutputFormat, OutputLayout, PartialFailure,
    PdfRenderer,
};
use crate::chunker::Chunk;
use crate::crawler::PageRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-page JSON record (`json/<stem>.json`)
///
/// Downstream consumers depend on these field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRecord {
    pub title: String,
    pub url: String,
    pub content: String,
    pub tokens: usize,
    /// Extraction time (RFC 3339)
    pub timestamp: String,
}

impl From<&PageRecord> for JsonRecord {
    fn from(record: &PageRecord) -> Self {
        Self {
            title: record.title.clone(),
            url: record.url.to_string(),
            content: record.cleaned_content.clone(),
            tokens: record.token_count,
            timestamp: record.timestamp.to_rfc3339(),
        }
    }
}

/// Files written for one page
#[derive(Debug, Clone, Default)]
pub struct EmittedPaths {
    pub files: Vec<PathBuf>,
    pub partial_failures: Vec<PartialFailure>,
}

/// Writes page artifacts into an output layout
pub struct Exporter {
    layout: OutputLayout,
    pdf: Option<Box<dyn PdfRenderer>>,
}

impl Exporter {
    /// Creates an exporter; PDFs are rendered only when a renderer is given
    pub fn new(layout: OutputLayout, pdf: Option<Box<dyn PdfRenderer>>) -> Self {
        Self { layout, pdf }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn pdf_enabled(&self) -> bool {
        self.pdf.is_some()
    }

    /// Formats produced for every exported page, as listed in run metadata
    pub fn exported_formats(&self) -> Vec<String> {
        let mut formats = vec![
            OutputFormat::Json.to_string(),
            OutputFormat::Txt.to_string(),
        ];
        if self.pdf_enabled() {
            formats.push(OutputFormat::Pdf.to_string());
        }
        formats
    }

    /// Writes all outputs for one page
    ///
    /// # Arguments
    ///
    /// * `record` - The extracted page record
    /// * `chunks` - The record's chunks, in sequence order
    /// * `raw_payload` - The fetched payload, stored as-is
    ///
    /// # Returns
    ///
    /// * `Ok(EmittedPaths)` - JSON and chunk files written; may carry partial failures
    /// * `Err(ExportError)` - A primary output could not be written
    pub async fn export(
        &self,
        record: &PageRecord,
        chunks: &[Chunk],
        raw_payload: &str,
    ) -> ExportResult<EmittedPaths> {
        let stem = file_stem(&record.url);
        let mut emitted = EmittedPaths::default();

        let raw_path = self.layout.raw_path(&stem);
        match write_atomic(&raw_path, raw_payload.as_bytes()).await {
            Ok(()) => emitted.files.push(raw_path),
            Err(e) => {
                tracing::warn!(url = %record.url, error = %e, "Failed to write raw payload");
                emitted
                    .partial_failures
                    .push(partial(record, OutputFormat::RawHtml, &e));
            }
        }

        let json_path = self.layout.json_path(&stem);
        let json = serde_json::to_vec_pretty(&JsonRecord::from(record))?;
        write_atomic(&json_path, &json).await?;
        emitted.files.push(json_path);

        for chunk in chunks {
            let path = self.layout.chunk_path(&stem, chunk.sequence_index);
            write_atomic(&path, chunk.text.as_bytes()).await?;
            emitted.files.push(path);
        }
        self.remove_stale_chunks(&stem, chunks.len()).await;

        if let Some(renderer) = &self.pdf {
            let pdf_path = self.layout.pdf_path(&stem);
            let written = match renderer.render(&record.title, &record.cleaned_content) {
                Ok(bytes) => write_atomic(&pdf_path, &bytes).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => emitted.files.push(pdf_path),
                Err(e) => {
                    tracing::warn!(url = %record.url, error = %e, "Failed to export PDF");
                    emitted
                        .partial_failures
                        .push(partial(record, OutputFormat::Pdf, &e));
                }
            }
        }

        tracing::debug!(
            url = %record.url,
            files = emitted.files.len(),
            chunks = chunks.len(),
            "Exported page"
        );
        Ok(emitted)
    }

    /// Deletes chunk files left over from an earlier run that produced more chunks
    async fn remove_stale_chunks(&self, stem: &str, chunk_count: usize) {
        let mut index = chunk_count;
        while tokio::fs::remove_file(self.layout.chunk_path(stem, index))
            .await
            .is_ok()
        {
            index += 1;
        }
    }
}

fn partial(record: &PageRecord, format: OutputFormat, error: &impl ToString) -> PartialFailure {
    PartialFailure {
        url: record.url.to_string(),
        format,
        error: error.to_string(),
    }
}
