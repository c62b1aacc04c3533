//! Process-wide crawl state owned by the coordinator
//!
//! Workers never touch this struct. They hand their outcome back to the
//! coordinator, which applies it here, so every mutation happens on one task.

use crate::crawler::{CrawlTask, Frontier};
use crate::output::{PartialFailure, RunMetadata};
use crate::state::RunPhase;
use crate::ScraperError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use url::Url;

/// Budget limits that end a run gracefully
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlLimits {
    /// Stop dispatching once this many URLs have been dequeued
    pub max_pages: Option<u64>,

    /// Stop dispatching after this much wall-clock time
    pub time_limit: Option<Duration>,
}

impl CrawlLimits {
    /// Builds limits from config values where 0 means unlimited
    pub fn from_config(max_pages: u64, time_limit_secs: u64) -> Self {
        Self {
            max_pages: (max_pages > 0).then_some(max_pages),
            time_limit: (time_limit_secs > 0).then(|| Duration::from_secs(time_limit_secs)),
        }
    }
}

/// Mutable state for one crawl run
#[derive(Debug)]
pub struct CrawlState {
    phase: RunPhase,
    frontier: Frontier,
    dequeued: u64,
    pages_processed: u64,
    total_tokens: u64,
    failed_urls: Vec<String>,
    partial_failures: Vec<PartialFailure>,
    content_fingerprints: HashSet<String>,
    started_at: DateTime<Utc>,
    started_instant: Instant,
    limits: CrawlLimits,
}

impl CrawlState {
    pub fn new(limits: CrawlLimits) -> Self {
        Self {
            phase: RunPhase::Idle,
            frontier: Frontier::new(),
            dequeued: 0,
            pages_processed: 0,
            total_tokens: 0,
            failed_urls: Vec::new(),
            partial_failures: Vec::new(),
            content_fingerprints: HashSet::new(),
            started_at: Utc::now(),
            started_instant: Instant::now(),
            limits,
        }
    }

    /// Moves the run to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: RunPhase) -> Result<(), ScraperError> {
        if !self.phase.can_transition_to(next) {
            return Err(ScraperError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "Run phase transition");
        self.phase = next;
        Ok(())
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Enqueues a task; false if its URL was already queued or visited
    pub fn enqueue(&mut self, task: CrawlTask) -> bool {
        self.frontier.push(task)
    }

    /// Claims a URL reached without being dequeued (a redirect target)
    ///
    /// Returns false if the URL is already queued or visited; otherwise
    /// marks it visited so later links to it are rejected.
    pub fn claim_url(&mut self, url: &Url) -> bool {
        if self.frontier.is_known(url) {
            return false;
        }
        self.frontier.mark_visited(url);
        true
    }

    /// Pops the next task, marks it visited and counts it as dequeued
    ///
    /// Returns None when the frontier is empty or a limit stops dispatch.
    pub fn next_task(&mut self) -> Option<CrawlTask> {
        if !self.dispatch_allowed() {
            return None;
        }
        let task = self.frontier.pop()?;
        self.frontier.mark_visited(&task.url);
        self.dequeued += 1;
        Some(task)
    }

    /// Returns false once a page-count or time limit has been reached
    pub fn dispatch_allowed(&self) -> bool {
        if let Some(max_pages) = self.limits.max_pages {
            if self.dequeued >= max_pages {
                return false;
            }
        }
        if let Some(limit) = self.limits.time_limit {
            if self.started_instant.elapsed() >= limit {
                return false;
            }
        }
        true
    }

    /// Returns true if a limit (not exhaustion) is what stops dispatch
    pub fn limit_reached(&self) -> bool {
        !self.dispatch_allowed()
    }

    pub fn record_processed(&mut self, tokens: u64) {
        self.pages_processed += 1;
        self.total_tokens += tokens;
    }

    pub fn record_failed(&mut self, url: &str) {
        self.failed_urls.push(url.to_string());
    }

    pub fn record_partial_failure(&mut self, failure: PartialFailure) {
        self.partial_failures.push(failure);
    }

    /// Remembers `content` and reports whether it was already seen at another URL
    pub fn is_duplicate_content(&mut self, content: &str) -> bool {
        let normalized: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
        let fingerprint = hex::encode(Sha256::digest(normalized.as_bytes()));
        !self.content_fingerprints.insert(fingerprint)
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued
    }

    pub fn pages_processed(&self) -> u64 {
        self.pages_processed
    }

    pub fn failed_urls(&self) -> &[String] {
        &self.failed_urls
    }

    pub fn elapsed(&self) -> Duration {
        self.started_instant.elapsed()
    }

    /// Snapshots the state as a run summary
    pub fn to_metadata(
        &self,
        project_name: &str,
        source: &str,
        output_directory: &str,
        exported: Vec<String>,
    ) -> RunMetadata {
        RunMetadata {
            project_name: project_name.to_string(),
            source: source.to_string(),
            run_time: self.started_at.to_rfc3339(),
            status: self.phase.as_str().to_string(),
            pages_processed: self.pages_processed,
            total_tokens: self.total_tokens,
            duration_seconds: self.started_instant.elapsed().as_secs_f64(),
            output_directory: output_directory.to_string(),
            failed_urls: self.failed_urls.clone(),
            partial_failures: self.partial_failures.clone(),
            exported,
        }
    }
}
