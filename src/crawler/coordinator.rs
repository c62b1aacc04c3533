//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop, including:
//! - Validating the start URL and preparing the output tree
//! - Dispatching frontier tasks to a bounded pool of workers
//! - Applying worker outcomes to the crawl state (single writer)
//! - Following redirects through the crawl scope and the visited set
//! - Enforcing page-count and time limits, and cancellation
//! - Writing the run summary
//!
//! Workers run fetch, extract, chunk and export for one task and hand a
//! `PageOutcome` back. Only the coordinator loop touches `CrawlState`.

use crate::chunker::{chunk, Chunk};
use crate::config::Config;
use crate::crawler::{
    CrawlTask, Extractor, FetchFailureKind, FetchStatus, Fetcher, PageRecord, MAX_REDIRECTS,
};
use crate::output::{
    write_metadata, Exporter, OutputLayout, PartialFailure, PdfRenderer, RunMetadata,
    TextPdfRenderer,
};
use crate::state::{CrawlLimits, CrawlState, RunPhase};
use crate::url::{normalize_url, Fingerprinter};
use crate::ScraperError;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Log a progress line every this many finished pages
const PROGRESS_INTERVAL: u64 = 10;

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Summary as written to `metadata.json`
    pub metadata: RunMetadata,

    /// Project output directory
    pub output_directory: PathBuf,
}

/// Everything a worker needs, shared read-only across workers
struct WorkerContext {
    fingerprinter: Fingerprinter,
    fetcher: Fetcher,
    extractor: Extractor,
    exporter: Exporter,
    max_tokens: usize,
    dedup_content: bool,
}

/// A page extracted and chunked but not yet exported
struct ExtractedPage {
    record: PageRecord,
    chunks: Vec<Chunk>,
    payload: String,
}

enum PageResult {
    Exported {
        tokens: u64,
        partial_failures: Vec<PartialFailure>,
    },
    /// Waiting for the coordinator's verdict: content dedup, or a final
    /// URL (after browser-followed redirects) that may already be known
    Pending(Box<ExtractedPage>),
    /// The server redirected; the coordinator decides whether to follow
    Redirected {
        location: Url,
    },
    Failed {
        reason: String,
    },
}

/// What a worker reports back for one task
struct PageOutcome {
    task: CrawlTask,
    discovered: Vec<Url>,
    result: PageResult,
}

impl PageOutcome {
    fn failed(task: CrawlTask, reason: String) -> Self {
        Self {
            task,
            discovered: Vec::new(),
            result: PageResult::Failed { reason },
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    start_url: String,
    project_name: String,
    state: CrawlState,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator for one run
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `start_url` - Where the crawl begins
    /// * `project_name` - Name of the output directory under `output.root`
    /// * `cancel` - Run-scoped cancellation signal
    pub fn new(
        config: Config,
        start_url: &str,
        project_name: &str,
        cancel: CancellationToken,
    ) -> Self {
        let limits = CrawlLimits::from_config(
            config.crawler.max_pages,
            config.crawler.time_limit_secs,
        );

        Self {
            config: Arc::new(config),
            start_url: start_url.to_string(),
            project_name: project_name.to_string(),
            state: CrawlState::new(limits),
            cancel,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    /// Runs the crawl to completion
    ///
    /// Individual page failures never end the run; they are collected in
    /// the run summary. Only setup failures (bad start URL, output tree not
    /// creatable) and a failed summary write abort it.
    pub async fn run(&mut self) -> Result<CrawlOutcome, ScraperError> {
        let (start, fingerprinter, context) = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.state.transition(RunPhase::Aborted)?;
                tracing::error!(error = %e, "Run aborted during setup");
                return Err(e);
            }
        };

        self.state.transition(RunPhase::Running)?;
        tracing::info!(
            start_url = %start,
            project = %self.project_name,
            concurrency = self.config.crawler.concurrency,
            max_depth = fingerprinter.max_depth(),
            "Starting crawl"
        );

        self.state.enqueue(CrawlTask::new(start, 0, None));
        self.drive(&fingerprinter, &context).await;

        if self.cancel.is_cancelled() {
            tracing::warn!("Run cancelled, in-flight work drained");
        } else if self.state.limit_reached() {
            tracing::info!(
                dequeued = self.state.dequeued(),
                "Crawl limit reached, in-flight work drained"
            );
        }

        self.finalize(context.exporter.layout(), context.exporter.exported_formats())
            .await
    }

    /// Validates the configuration and start URL, and builds the worker context
    async fn prepare(&self) -> Result<(Url, Fingerprinter, Arc<WorkerContext>), ScraperError> {
        crate::config::validate(&self.config)?;

        let start = normalize_url(&self.start_url).map_err(|e| ScraperError::StartUrl {
            url: self.start_url.clone(),
            reason: e.to_string(),
        })?;

        let fingerprinter =
            Fingerprinter::new(&self.config.scope, self.config.crawler.max_depth, &start);
        fingerprinter
            .check_scope(&start, 0)
            .map_err(|rejection| ScraperError::StartUrl {
                url: self.start_url.clone(),
                reason: format!("outside the crawl scope ({})", rejection),
            })?;

        let layout = OutputLayout::new(&self.config.output.root, &self.project_name);
        layout
            .create(self.config.output.pdf)
            .map_err(|source| ScraperError::OutputRoot {
                path: layout.project_dir().to_path_buf(),
                source,
            })?;

        let pdf: Option<Box<dyn PdfRenderer>> = if self.config.output.pdf {
            Some(Box::new(TextPdfRenderer::default()))
        } else {
            None
        };

        let context = WorkerContext {
            fingerprinter: fingerprinter.clone(),
            fetcher: Fetcher::from_config(&self.config.fetch).await?,
            extractor: Extractor::new(&self.config.extract)?,
            exporter: Exporter::new(layout, pdf),
            max_tokens: self.config.chunk.max_tokens,
            dedup_content: self.config.extract.dedup_content,
        };

        Ok((start, fingerprinter, Arc::new(context)))
    }

    /// Dispatches tasks and applies outcomes until the frontier drains,
    /// a limit is hit or the run is cancelled
    async fn drive(&mut self, fingerprinter: &Fingerprinter, context: &Arc<WorkerContext>) {
        let concurrency = self.config.crawler.concurrency.max(1) as usize;
        let mut workers: JoinSet<PageOutcome> = JoinSet::new();
        let mut finished: u64 = 0;

        loop {
            while workers.len() < concurrency && !self.cancel.is_cancelled() {
                let Some(task) = self.state.next_task() else {
                    break;
                };
                tracing::debug!(url = %task.url, depth = task.depth, "Dispatching");
                self.spawn_worker(&mut workers, context, task);
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "Worker task failed");
                    continue;
                }
            };

            if self.apply(outcome, fingerprinter, context, &mut workers) {
                finished += 1;
                if finished % PROGRESS_INTERVAL == 0 {
                    let elapsed = self.state.elapsed().as_secs_f64();
                    let pages_per_sec = if elapsed > 0.0 {
                        finished as f64 / elapsed
                    } else {
                        0.0
                    };
                    tracing::info!(
                        processed = self.state.pages_processed(),
                        failed = self.state.failed_urls().len(),
                        queued = self.state.frontier().len(),
                        in_flight = workers.len(),
                        pages_per_sec = (pages_per_sec * 10.0).round() / 10.0,
                        "Progress"
                    );
                }
            }
        }
    }

    fn spawn_worker(
        &self,
        workers: &mut JoinSet<PageOutcome>,
        context: &Arc<WorkerContext>,
        task: CrawlTask,
    ) {
        let work = process_task(context.clone(), task.clone(), self.cancel.clone());
        workers.spawn(supervise(task, work));
    }

    /// Applies one worker outcome to the crawl state
    ///
    /// Returns true if the page reached a final processed/failed verdict.
    fn apply(
        &mut self,
        outcome: PageOutcome,
        fingerprinter: &Fingerprinter,
        context: &Arc<WorkerContext>,
        workers: &mut JoinSet<PageOutcome>,
    ) -> bool {
        let PageOutcome {
            task,
            discovered,
            result,
        } = outcome;

        let finished = match result {
            PageResult::Exported {
                tokens,
                partial_failures,
            } => {
                tracing::debug!(url = %task.url, tokens, "Page processed");
                self.state.record_processed(tokens);
                for failure in partial_failures {
                    self.state.record_partial_failure(failure);
                }
                true
            }
            PageResult::Failed { reason } => {
                tracing::warn!(url = %task.url, reason = %reason, "Page failed");
                self.state.record_failed(task.url.as_str());
                true
            }
            PageResult::Redirected { location } => {
                return self.follow_redirect(task, location, fingerprinter, context, workers);
            }
            PageResult::Pending(page) => {
                let final_url = &page.record.url;
                if *final_url != task.url && !self.state.claim_url(final_url) {
                    tracing::debug!(
                        url = %task.url,
                        final_url = %final_url,
                        "Redirect target already known, not exported"
                    );
                    self.state.record_processed(0);
                    true
                } else if context.dedup_content
                    && self.state.is_duplicate_content(&page.record.cleaned_content)
                {
                    tracing::debug!(url = %task.url, "Duplicate content, not exported");
                    self.state.record_processed(0);
                    true
                } else {
                    let work = export_task(context.clone(), task.clone(), *page);
                    workers.spawn(supervise(task.clone(), work));
                    false
                }
            }
        };

        self.enqueue_links(&task, &discovered, fingerprinter);
        finished
    }

    /// Decides the fate of a redirect
    ///
    /// The target must pass the crawl scope and must not be queued or
    /// visited already; otherwise the chain ends here. A followed target is
    /// fetched under the same dequeued slot, so the chain yields exactly one
    /// processed/failed verdict. Returns true if that verdict is reached now.
    fn follow_redirect(
        &mut self,
        task: CrawlTask,
        location: Url,
        fingerprinter: &Fingerprinter,
        context: &Arc<WorkerContext>,
        workers: &mut JoinSet<PageOutcome>,
    ) -> bool {
        let target = match fingerprinter.normalize(location.as_str(), &task.url, task.depth) {
            Ok(target) => target,
            Err(rejection) => {
                tracing::warn!(
                    url = %task.url,
                    location = %location,
                    reason = %rejection,
                    "Redirect leaves the crawl scope"
                );
                self.state.record_failed(task.url.as_str());
                return true;
            }
        };

        if target == task.url || task.redirect_hops >= MAX_REDIRECTS {
            let reason = FetchFailureKind::RedirectLimit;
            tracing::warn!(
                url = %task.url,
                location = %location,
                reason = %reason,
                "Page failed"
            );
            self.state.record_failed(task.url.as_str());
            return true;
        }

        if !self.state.claim_url(&target) {
            tracing::debug!(
                url = %task.url,
                target = %target,
                "Redirect target already known, not fetched again"
            );
            self.state.record_processed(0);
            return true;
        }

        tracing::debug!(url = %task.url, target = %target, "Following redirect");
        self.spawn_worker(workers, context, task.redirected(target));
        false
    }

    /// Passes discovered links through the fingerprinter into the frontier
    fn enqueue_links(&mut self, task: &CrawlTask, links: &[Url], fingerprinter: &Fingerprinter) {
        let depth = task.depth + 1;
        let mut accepted = 0usize;

        for link in links {
            match fingerprinter.normalize(link.as_str(), &task.url, depth) {
                Ok(url) => {
                    if self
                        .state
                        .enqueue(CrawlTask::new(url, depth, Some(task.url.clone())))
                    {
                        accepted += 1;
                    }
                }
                Err(rejection) => {
                    tracing::trace!(link = %link, reason = %rejection, "Link rejected");
                }
            }
        }

        if !links.is_empty() {
            tracing::debug!(
                url = %task.url,
                discovered = links.len(),
                accepted,
                "Links processed"
            );
        }
    }

    /// Writes the run summary and moves the run to its terminal phase
    async fn finalize(
        &mut self,
        layout: &OutputLayout,
        exported: Vec<String>,
    ) -> Result<CrawlOutcome, ScraperError> {
        let output_directory = layout.project_dir().to_path_buf();
        let mut metadata = self.state.to_metadata(
            &self.project_name,
            &self.start_url,
            &output_directory.to_string_lossy(),
            exported,
        );
        metadata.status = RunPhase::Completed.to_string();

        if let Err(e) = write_metadata(&layout.metadata_path(), &metadata).await {
            self.state.transition(RunPhase::Aborted)?;
            tracing::error!(error = %e, "Failed to write run metadata");
            return Err(ScraperError::Metadata(e));
        }
        self.state.transition(RunPhase::Completed)?;

        tracing::info!(
            pages_processed = metadata.pages_processed,
            failed = metadata.failed_urls.len(),
            total_tokens = metadata.total_tokens,
            duration_secs = metadata.duration_seconds,
            "Crawl completed"
        );

        Ok(CrawlOutcome {
            metadata,
            output_directory,
        })
    }
}

/// Runs a worker future on its own task so a panic still yields a verdict
async fn supervise<F>(task: CrawlTask, work: F) -> PageOutcome
where
    F: Future<Output = PageOutcome> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(outcome) => outcome,
        Err(e) => PageOutcome::failed(task, format!("worker failed: {}", e)),
    }
}

/// Runs fetch, extract and chunk for one task, then exports it
///
/// The page is handed back before export when content dedup is enabled or
/// the backend reports a different final URL, so the coordinator can check
/// the content fingerprint or the visited set first.
async fn process_task(
    context: Arc<WorkerContext>,
    task: CrawlTask,
    cancel: CancellationToken,
) -> PageOutcome {
    let fetched = context.fetcher.fetch(&task.url, &cancel).await;
    let page = match fetched.status {
        FetchStatus::Ok(page) => page,
        FetchStatus::Redirected { location } => {
            return PageOutcome {
                task,
                discovered: Vec::new(),
                result: PageResult::Redirected { location },
            };
        }
        FetchStatus::Failed { kind, attempts } => {
            return PageOutcome::failed(
                task,
                format!("fetch failed after {} attempt(s): {}", attempts, kind),
            );
        }
    };

    let page_url = if page.final_url == task.url {
        task.url.clone()
    } else {
        match context
            .fingerprinter
            .normalize(page.final_url.as_str(), &task.url, task.depth)
        {
            Ok(url) => url,
            Err(rejection) => {
                return PageOutcome::failed(
                    task,
                    format!(
                        "redirected out of the crawl scope ({}): {}",
                        rejection, page.final_url
                    ),
                );
            }
        }
    };
    let relocated = page_url != task.url;

    let record = match context.extractor.extract(&page_url, &page) {
        Ok(record) => record,
        Err(e) => return PageOutcome::failed(task, format!("extraction failed: {}", e)),
    };

    let chunks = chunk(&record, context.max_tokens);
    let discovered = record.discovered_links.clone();
    let extracted = ExtractedPage {
        record,
        chunks,
        payload: page.payload,
    };

    if context.dedup_content || relocated {
        return PageOutcome {
            task,
            discovered,
            result: PageResult::Pending(Box::new(extracted)),
        };
    }

    let mut outcome = export_task(context, task, extracted).await;
    outcome.discovered = discovered;
    outcome
}

/// Writes a page's outputs
async fn export_task(
    context: Arc<WorkerContext>,
    task: CrawlTask,
    page: ExtractedPage,
) -> PageOutcome {
    let result = match context
        .exporter
        .export(&page.record, &page.chunks, &page.payload)
        .await
    {
        Ok(emitted) => PageResult::Exported {
            tokens: page.record.token_count as u64,
            partial_failures: emitted.partial_failures,
        },
        Err(e) => PageResult::Failed {
            reason: format!("export failed: {}", e),
        },
    };

    PageOutcome {
        task,
        discovered: Vec::new(),
        result,
    }
}
