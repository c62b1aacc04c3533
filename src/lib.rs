//! Context-Scraper: documentation crawler for AI training corpora
//!
//! This crate crawls a documentation site from a single start URL, extracts and
//! cleans page content, splits it into token-bounded chunks and writes per-page
//! JSON records, chunk text files, optional PDFs and a run summary.

pub mod chunker;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod trigger;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Run-level error type
///
/// Only fatal failures surface through this type. Page-level problems
/// (fetch, extraction, partial export) are absorbed into the run metadata.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid start URL {url}: {reason}")]
    StartUrl { url: String, reason: String },

    #[error("Cannot prepare output directory {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write run metadata: {0}")]
    Metadata(#[from] output::ExportError),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Invalid run transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunPhase,
        to: state::RunPhase,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, CrawlOutcome};
pub use output::RunMetadata;
pub use state::RunPhase;
pub use trigger::{run_scrape, ScrapeRequest, ScrapeResponse};
pub use crate::url::{normalize_url, Fingerprinter};
