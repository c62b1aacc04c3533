//! Frontier: the FIFO work queue of pending URLs
//!
//! This module handles:
//! - Breadth-first ordering (discovery order) of pending crawl tasks
//! - Idempotent pushes gated by the queued and visited sets
//!
//! The frontier has a single owner (the coordinator's `CrawlState`), so it
//! needs no internal locking.

use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL accepted for fetching
///
/// Created when a link is accepted and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized URL to fetch
    pub url: Url,

    /// Link distance from the start URL
    pub depth: u32,

    /// Page on which the link was discovered (None for the start URL)
    pub origin_referrer: Option<Url>,

    /// Redirects followed to reach `url` from the dequeued URL
    pub redirect_hops: u32,
}

impl CrawlTask {
    pub fn new(url: Url, depth: u32, origin_referrer: Option<Url>) -> Self {
        Self {
            url,
            depth,
            origin_referrer,
            redirect_hops: 0,
        }
    }

    /// The task for a redirect target, at the same depth
    pub fn redirected(&self, target: Url) -> Self {
        Self {
            url: target,
            depth: self.depth,
            origin_referrer: Some(self.url.clone()),
            redirect_hops: self.redirect_hops + 1,
        }
    }
}

/// Visited-set-gated FIFO queue
#[derive(Debug, Default)]
pub struct Frontier {
    /// Pending tasks in discovery order
    queue: VecDeque<CrawlTask>,

    /// URLs pushed but not yet marked visited
    queued: HashSet<String>,

    /// URLs handed to a worker
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task to the back of the queue
    ///
    /// Returns false (and changes nothing) if the URL is already queued or visited.
    pub fn push(&mut self, task: CrawlTask) -> bool {
        let key = task.url.as_str();
        if self.visited.contains(key) || self.queued.contains(key) {
            return false;
        }
        self.queued.insert(key.to_string());
        self.queue.push_back(task);
        true
    }

    /// Removes the oldest pending task
    ///
    /// The URL stays in the queued set until `mark_visited` is called, so a
    /// concurrent rediscovery cannot re-enqueue it in between.
    pub fn pop(&mut self) -> Option<CrawlTask> {
        self.queue.pop_front()
    }

    /// Records that a URL has been handed to a worker
    pub fn mark_visited(&mut self, url: &Url) {
        self.queued.remove(url.as_str());
        self.visited.insert(url.as_str().to_string());
    }

    /// Returns true if the URL was ever accepted into the frontier
    pub fn is_known(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str()) || self.queued.contains(url.as_str())
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
