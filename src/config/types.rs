use serde::Deserialize;

/// Main configuration structure for Context-Scraper
///
/// Every section is optional in the TOML file; missing sections and keys
/// fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub scope: ScopeConfig,
    pub extract: ExtractConfig,
    pub chunk: ChunkConfig,
    pub output: OutputConfig,
}

/// Crawl budget and concurrency configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent fetch/extract/export workers
    pub concurrency: u32,

    /// Maximum link depth from the start URL (0 = start page only)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages to dequeue (0 = unlimited)
    #[serde(rename = "max-pages")]
    pub max_pages: u64,

    /// Wall-clock limit for dispatching new work in seconds (0 = unlimited)
    #[serde(rename = "time-limit-secs")]
    pub time_limit_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_depth: 5,
            max_pages: 0,
            time_limit_secs: 0,
        }
    }
}

/// Which fetch backend retrieves pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Plain HTTP GET
    #[default]
    Http,
    /// Headless browser rendering for script-driven pages
    Render,
}

/// Fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub backend: BackendKind,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Retries after the initial attempt for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "backoff-cap-ms")]
    pub backoff_cap_ms: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Responses larger than this are rejected
    #[serde(rename = "max-body-bytes")]
    pub max_body_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Http,
            timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 1000,
            backoff_cap_ms: 30_000,
            user_agent: "AIContextScraper/1.0".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Crawl scope rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Host patterns (e.g. "docs.example.com" or "*.example.com").
    /// Empty means the start URL's host only.
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,

    /// Path prefixes a URL must start with. Empty means any path.
    #[serde(rename = "allowed-path-prefixes")]
    pub allowed_path_prefixes: Vec<String>,

    /// Substrings that exclude a URL when present anywhere in it
    #[serde(rename = "exclude-patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(rename = "allowed-schemes")]
    pub allowed_schemes: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            allowed_path_prefixes: Vec::new(),
            exclude_patterns: [".jpg", ".png", ".gif", ".css", ".js"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
        }
    }
}

/// Content extraction rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// CSS selectors for elements removed before text extraction
    #[serde(rename = "exclude-selectors")]
    pub exclude_selectors: Vec<String>,

    /// Skip exporting pages whose cleaned content was already seen at another URL
    #[serde(rename = "dedup-content")]
    pub dedup_content: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            exclude_selectors: [
                "script",
                "style",
                "noscript",
                "template",
                "nav",
                "header",
                "footer",
                "aside",
                "form",
                "iframe",
                "svg",
                ".ads",
                ".advertisement",
                "[role=navigation]",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            dedup_content: false,
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    #[serde(rename = "max-tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { max_tokens: 500 }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory under which each project gets its own folder
    pub root: String,

    /// Render a PDF per page
    pub pdf: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: "AI_Training_Corpora".to_string(),
            pdf: false,
        }
    }
}
