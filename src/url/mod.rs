//! URL handling module for Context-Scraper
//!
//! This module provides the Fingerprinter: URL normalization for dedup and the
//! scope rules that decide whether a discovered link may enter the frontier.

mod matcher;
mod normalize;

use crate::config::ScopeConfig;
use std::fmt;
use url::{Position, Url};

// Re-export main functions
pub use matcher::{matches_path_prefix, matches_wildcard};
pub use normalize::{normalize_url, resolve_and_normalize};

/// File extensions that never hold crawlable document markup
const NON_DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "gz", "tgz", "tar", "rar", "7z", "bz2", "xz", "png", "jpg", "jpeg", "gif",
    "svg", "webp", "ico", "bmp", "tif", "tiff", "mp3", "mp4", "webm", "avi", "mov", "wav", "ogg",
    "woff", "woff2", "ttf", "otf", "eot", "css", "js", "mjs", "map", "json", "xml", "exe", "dmg",
    "msi", "apk", "deb", "rpm", "bin", "iso", "csv", "xls", "xlsx", "doc", "docx", "ppt", "pptx",
    "epub", "wasm",
];

/// Why a URL was kept out of the frontier
///
/// Rejection is a normal filtering outcome, not an error: it is never
/// retried and never reported as a failed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The href could not be resolved into an absolute URL
    Unparseable,
    /// Scheme is not in the allowed list
    Scheme,
    /// Host is outside the allowed hosts
    Host,
    /// Path or query contains an excluded pattern
    ExcludedPattern,
    /// Path is outside the allowed path prefixes
    PathPrefix,
    /// Link would exceed the configured crawl depth
    Depth,
    /// Link points at binary or asset content rather than a document
    NonDocument,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Unparseable => "unparseable",
            Self::Scheme => "scheme",
            Self::Host => "host",
            Self::ExcludedPattern => "excluded_pattern",
            Self::PathPrefix => "path_prefix",
            Self::Depth => "depth",
            Self::NonDocument => "non_document",
        };
        write!(f, "{}", reason)
    }
}

/// Which hosts a crawl may visit
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostScope {
    /// Only the start URL's host and explicit port (None for the scheme default)
    Origin { host: String, port: Option<u16> },
    /// `allowed-hosts` patterns, any port
    Patterns(Vec<String>),
}

impl HostScope {
    fn contains(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        match self {
            Self::Origin { host: origin, port } => {
                host.eq_ignore_ascii_case(origin) && url.port() == *port
            }
            Self::Patterns(patterns) => patterns
                .iter()
                .any(|pattern| matches_wildcard(pattern, host)),
        }
    }
}

/// Normalizes discovered URLs and enforces the crawl scope
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    schemes: Vec<String>,
    hosts: HostScope,
    path_prefixes: Vec<String>,
    exclude_patterns: Vec<String>,
    max_depth: u32,
}

impl Fingerprinter {
    /// Builds a fingerprinter for a crawl rooted at `start_url`
    ///
    /// When `allowed-hosts` is empty the scope is the start URL's host and
    /// port only. Default ports are equivalent, so `http://host/` and
    /// `https://host/` share a scope while `host:8080` and `host:9090` do not.
    pub fn new(scope: &ScopeConfig, max_depth: u32, start_url: &Url) -> Self {
        let hosts = if scope.allowed_hosts.is_empty() {
            HostScope::Origin {
                host: start_url.host_str().unwrap_or_default().to_lowercase(),
                port: start_url.port(),
            }
        } else {
            HostScope::Patterns(scope.allowed_hosts.clone())
        };

        Self {
            schemes: scope.allowed_schemes.clone(),
            hosts,
            path_prefixes: scope.allowed_path_prefixes.clone(),
            exclude_patterns: scope.exclude_patterns.clone(),
            max_depth,
        }
    }

    /// Resolves `raw` against `base`, normalizes it and applies the scope rules
    ///
    /// `depth` is the depth the URL would have if accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use context_scraper::config::ScopeConfig;
    /// use context_scraper::url::{Fingerprinter, Rejection};
    /// use url::Url;
    ///
    /// let start = Url::parse("https://docs.example.com/").unwrap();
    /// let fp = Fingerprinter::new(&ScopeConfig::default(), 3, &start);
    ///
    /// let url = fp.normalize("guide/#setup", &start, 1).unwrap();
    /// assert_eq!(url.as_str(), "https://docs.example.com/guide");
    /// assert_eq!(
    ///     fp.normalize("https://other.example.com/", &start, 1),
    ///     Err(Rejection::Host)
    /// );
    /// ```
    pub fn normalize(&self, raw: &str, base: &Url, depth: u32) -> Result<Url, Rejection> {
        let url = resolve_and_normalize(raw, base).map_err(|e| match e {
            crate::UrlError::InvalidScheme(_) => Rejection::Scheme,
            _ => Rejection::Unparseable,
        })?;
        self.check_scope(&url, depth)?;
        Ok(url)
    }

    /// Applies the scope rules to an already normalized URL
    pub fn check_scope(&self, url: &Url, depth: u32) -> Result<(), Rejection> {
        if !self.schemes.iter().any(|s| s == url.scheme()) {
            return Err(Rejection::Scheme);
        }

        if !self.hosts.contains(url) {
            return Err(Rejection::Host);
        }

        if !self.path_prefixes.is_empty()
            && !self
                .path_prefixes
                .iter()
                .any(|prefix| matches_path_prefix(prefix, url.path()))
        {
            return Err(Rejection::PathPrefix);
        }

        let path_and_query = &url[Position::BeforePath..Position::AfterQuery];
        if self
            .exclude_patterns
            .iter()
            .any(|pattern| path_and_query.contains(pattern.as_str()))
        {
            return Err(Rejection::ExcludedPattern);
        }

        if is_non_document(url) {
            return Err(Rejection::NonDocument);
        }

        if depth > self.max_depth {
            return Err(Rejection::Depth);
        }

        Ok(())
    }

    /// Maximum accepted depth
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}

/// Returns true if the last path segment carries a binary/asset extension
fn is_non_document(url: &Url) -> bool {
    let last_segment = url.path().rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            NON_DOCUMENT_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}
