//! Trigger interface: one scrape request in, one response out
//!
//! The request and response shapes are what an HTTP front end exchanges
//! with the crawler; the CLI uses the same types.

use crate::config::Config;
use crate::crawler::crawl;
use crate::output::RunMetadata;
use crate::ScraperError;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A request to crawl one documentation site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    #[serde(alias = "url")]
    pub start_url: String,

    /// Output directory name; defaults to the first label of the start URL host
    #[serde(default)]
    pub project_name: Option<String>,

    #[serde(default)]
    pub pdf_export: bool,
}

/// Statistics returned for a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub pages_processed: u64,
    pub total_tokens: u64,
    pub duration_seconds: f64,
    pub output_directory: String,
    pub failed_urls: Vec<String>,
}

impl From<&RunMetadata> for ScrapeSummary {
    fn from(metadata: &RunMetadata) -> Self {
        Self {
            pages_processed: metadata.pages_processed,
            total_tokens: metadata.total_tokens,
            duration_seconds: metadata.duration_seconds,
            output_directory: metadata.output_directory.clone(),
            failed_urls: metadata.failed_urls.clone(),
        }
    }
}

/// Response to a scrape request
///
/// Serializes as `{"status":"success","data":{...}}` or
/// `{"status":"error","message":"..."}`. A run where some pages failed is
/// still a success; the failures are listed in `failed_urls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScrapeResponse {
    Success { data: ScrapeSummary },
    Error { message: String },
}

impl ScrapeResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Handles one scrape request end to end
///
/// Fatal run errors are reported as `ScrapeResponse::Error`; this function
/// itself never fails.
pub async fn run_scrape(
    request: ScrapeRequest,
    mut config: Config,
    cancel: CancellationToken,
) -> ScrapeResponse {
    let project_name = match resolve_project_name(&request) {
        Ok(name) => name,
        Err(e) => {
            return ScrapeResponse::Error {
                message: e.to_string(),
            }
        }
    };

    config.output.pdf = config.output.pdf || request.pdf_export;

    match crawl(config, &request.start_url, &project_name, cancel).await {
        Ok(outcome) => ScrapeResponse::Success {
            data: ScrapeSummary::from(&outcome.metadata),
        },
        Err(e) => ScrapeResponse::Error {
            message: e.to_string(),
        },
    }
}

/// Picks the project directory name for a request
///
/// An explicit name is sanitized; otherwise the first label of the start
/// URL host is used (`docs.example.com` gives `docs`).
pub fn resolve_project_name(request: &ScrapeRequest) -> Result<String, ScraperError> {
    let invalid = |reason: &str| ScraperError::StartUrl {
        url: request.start_url.clone(),
        reason: reason.to_string(),
    };

    if let Some(name) = request.project_name.as_deref() {
        let sanitized = sanitize_project_name(name);
        if !sanitized.is_empty() {
            return Ok(sanitized);
        }
    }

    let url = Url::parse(request.start_url.trim()).map_err(|e| invalid(&e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing host"))?
        .to_lowercase();
    let label = host.split('.').next().unwrap_or_default();
    let sanitized = sanitize_project_name(label);
    if sanitized.is_empty() {
        return Err(invalid("cannot derive a project name from the host"));
    }
    Ok(sanitized)
}

/// Keeps ASCII alphanumerics, `-`, `_` and `.`; other characters become `_`
///
/// Names made only of dots and underscores are rejected (empty result).
pub fn sanitize_project_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '.' || c == '_') {
        String::new()
    } else {
        sanitized
    }
}
