//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The frontier of pending URLs
//! - Fetching with retry and backoff
//! - Content extraction and link discovery
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
#[cfg(feature = "render")]
mod render;

pub use coordinator::{Coordinator, CrawlOutcome};
pub use extractor::{ExtractError, Extractor, PageRecord};
pub use fetcher::{
    build_http_client, is_supported_content_type, FetchBackend, FetchError, FetchFailureKind,
    FetchResult, FetchStatus, FetchedPage, Fetcher, HttpBackend, Retrieved, RetryPolicy,
    MAX_REDIRECTS,
};
pub use frontier::{CrawlTask, Frontier};
#[cfg(feature = "render")]
pub use render::RenderBackend;

use crate::config::Config;
use crate::ScraperError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the start URL against the crawl scope
/// 2. Create the project output tree
/// 3. Crawl breadth-first with bounded concurrency
/// 4. Write per-page outputs and the run summary
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `start_url` - Where the crawl begins
/// * `project_name` - Output directory name under `output.root`
/// * `cancel` - Cancelling it stops dispatch and abandons in-flight fetches
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - Crawl completed (possibly with failed pages)
/// * `Err(ScraperError)` - Crawl aborted
pub async fn crawl(
    config: Config,
    start_url: &str,
    project_name: &str,
    cancel: CancellationToken,
) -> Result<CrawlOutcome, ScraperError> {
    Coordinator::new(config, start_url, project_name, cancel)
        .run()
        .await
}
