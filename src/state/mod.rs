//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RunPhase`: lifecycle of one run (idle, running, completed, aborted)
//! - `CrawlState`: counters, failures, frontier and limits, owned by the coordinator

mod crawl_state;
mod run_phase;

// Re-export main types
pub use crawl_state::{CrawlLimits, CrawlState};
pub use run_phase::RunPhase;
