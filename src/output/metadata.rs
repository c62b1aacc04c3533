//! Run summary written once per run as `metadata.json`

use super::{write_atomic, ExportResult, PartialFailure};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Summary of one crawl run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub project_name: String,

    /// Start URL of the run
    pub source: String,

    /// Run start time (RFC 3339)
    pub run_time: String,

    /// Final run phase (`completed` or `aborted`)
    pub status: String,

    pub pages_processed: u64,
    pub total_tokens: u64,
    pub duration_seconds: f64,
    pub output_directory: String,

    /// URLs that failed, in the order their failures were recorded
    pub failed_urls: Vec<String>,

    #[serde(default)]
    pub partial_failures: Vec<PartialFailure>,

    /// Output formats produced for each page
    #[serde(default)]
    pub exported: Vec<String>,
}

/// Writes the run summary as pretty-printed JSON
pub async fn write_metadata(path: &Path, metadata: &RunMetadata) -> ExportResult<()> {
    let json = serde_json::to_vec_pretty(metadata)?;
    write_atomic(path, &json).await
}

/// Reads a run summary back from disk
pub async fn read_metadata(path: &Path) -> ExportResult<RunMetadata> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
