//! Page fetcher with retry and backoff
//!
//! This module handles:
//! - The `FetchBackend` seam (plain HTTP, or script rendering behind the `render` feature)
//! - Building the HTTP client with timeout and user agent
//! - Reporting redirects back to the caller instead of following them
//! - Classifying failures as transient or permanent
//! - Retrying transient failures with capped exponential backoff
//! - Abandoning fetches when the run is cancelled

use crate::config::{BackendKind, FetchConfig};
use crate::ScraperError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Maximum number of redirects followed from one dequeued URL
pub const MAX_REDIRECTS: u32 = 10;

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailureKind {
    /// Request or body read timed out
    Timeout,
    /// Connection refused or reset
    Connect,
    /// Host name did not resolve
    Dns,
    /// Non-success HTTP status
    HttpStatus(u16),
    /// URL could not be turned into a request
    InvalidUrl,
    /// Redirect chain exceeded `MAX_REDIRECTS` or looped
    RedirectLimit,
    /// Body exceeded `max-body-bytes`
    TooLarge,
    /// Response was not HTML, XHTML or plain text
    UnsupportedContent(String),
    /// Body stream broke off mid-read
    Body,
    /// Run was cancelled while the fetch was in flight
    Cancelled,
    /// Backend-specific failure
    Backend(String),
}

impl FetchFailureKind {
    /// Returns true if the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect | Self::Body => true,
            Self::HttpStatus(code) => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connection failed"),
            Self::Dns => write!(f, "dns resolution failed"),
            Self::HttpStatus(code) => write!(f, "http status {}", code),
            Self::InvalidUrl => write!(f, "invalid url"),
            Self::RedirectLimit => write!(f, "too many redirects"),
            Self::TooLarge => write!(f, "body too large"),
            Self::UnsupportedContent(ct) => write!(f, "unsupported content type '{}'", ct),
            Self::Body => write!(f, "body read interrupted"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

/// A single failed attempt, as reported by a backend
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct FetchError {
    pub kind: FetchFailureKind,

    /// Server-requested delay (from `Retry-After`)
    pub retry_after: Option<Duration>,
}

impl FetchError {
    pub fn new(kind: FetchFailureKind) -> Self {
        Self {
            kind,
            retry_after: None,
        }
    }
}

/// A successfully retrieved page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Decoded response body
    pub payload: String,

    /// Content-Type header value (empty when absent)
    pub content_type: String,

    /// URL after redirects
    pub final_url: Url,
}

/// What one backend attempt produced
#[derive(Debug, Clone)]
pub enum Retrieved {
    Page(FetchedPage),
    /// The server redirected to this absolute URL
    Redirect(Url),
}

/// Outcome of fetching one URL, after retries
#[derive(Debug, Clone)]
pub enum FetchStatus {
    Ok(FetchedPage),
    /// The URL redirects; the caller decides whether to follow
    Redirected {
        location: Url,
    },
    Failed {
        kind: FetchFailureKind,
        attempts: u32,
    },
}

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL that was requested
    pub url: Url,
    pub status: FetchStatus,
}

/// Retrieves raw payloads for URLs
///
/// One call is one attempt; retries are the `Fetcher`'s job. Backends
/// that can surface redirects return `Retrieved::Redirect` rather than
/// following them.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Retrieved, FetchError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Plain HTTP backend built on reqwest
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    max_body_bytes: u64,
}

impl HttpBackend {
    /// Builds the backend from the fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed here. The coordinator follows them so every
/// hop passes the crawl scope and the visited set. Gzip and brotli bodies
/// are decoded transparently.
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl FetchBackend for HttpBackend {
    async fn fetch(&self, url: &Url) -> Result<Retrieved, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::new(classify_reqwest_error(&e)))?;

        let status = response.status();
        if status.is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                let target = response
                    .url()
                    .join(location.trim())
                    .map_err(|_| FetchError::new(FetchFailureKind::InvalidUrl))?;
                return Ok(Retrieved::Redirect(target));
            }
        }

        if let Some(kind) = status_failure(status.as_u16()) {
            return Err(FetchError {
                kind,
                retry_after: retry_after(status, response.headers()),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_supported_content_type(&content_type) {
            return Err(FetchError::new(FetchFailureKind::UnsupportedContent(
                content_type,
            )));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes)
        {
            return Err(FetchError::new(FetchFailureKind::TooLarge));
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::new(classify_reqwest_error(&e)))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(FetchError::new(FetchFailureKind::TooLarge));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Retrieved::Page(FetchedPage {
            payload: String::from_utf8_lossy(&body).into_owned(),
            content_type,
            final_url,
        }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Maps a non-2xx document status onto a failure
pub(crate) fn status_failure(status: u16) -> Option<FetchFailureKind> {
    if (200..300).contains(&status) {
        None
    } else {
        Some(FetchFailureKind::HttpStatus(status))
    }
}

/// Returns true for HTML, XHTML and plain-text responses
///
/// A missing Content-Type is accepted and left to the extractor.
pub fn is_supported_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.is_empty()
        || mime == "text/html"
        || mime == "application/xhtml+xml"
        || mime == "text/plain"
}

/// Maps a reqwest error onto a failure kind
///
/// DNS failures surface as connect errors in reqwest; they are told apart by
/// walking the source chain, since a name that does not resolve will not
/// resolve on retry either.
fn classify_reqwest_error(error: &reqwest::Error) -> FetchFailureKind {
    if error.is_timeout() {
        FetchFailureKind::Timeout
    } else if error.is_builder() {
        FetchFailureKind::InvalidUrl
    } else if is_dns_error(error) {
        FetchFailureKind::Dns
    } else if error.is_connect() || error.is_request() {
        FetchFailureKind::Connect
    } else if error.is_body() || error.is_decode() {
        FetchFailureKind::Body
    } else {
        FetchFailureKind::Backend(error.to_string())
    }
}

fn is_dns_error(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        let message = err.to_string().to_lowercase();
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return true;
        }
        source = err.source();
    }
    false
}

/// Reads a `Retry-After` delay (seconds form) from a 429 or 503 response
fn retry_after(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Capped exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_cap_ms),
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Retry loop states
///
/// `Attempting(n) -> Backoff(n, delay) -> Attempting(n + 1)`, ending in `Done`.
#[derive(Debug)]
enum RetryState {
    Attempting { attempt: u32, last_delay: Duration },
    Backoff { attempt: u32, delay: Duration },
    Done(FetchStatus),
}

/// Fetches pages through a backend, retrying transient failures
pub struct Fetcher {
    backend: Box<dyn FetchBackend>,
    policy: RetryPolicy,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Fetcher {
    pub fn new(backend: Box<dyn FetchBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Builds the fetcher selected by `fetch.backend`
    pub async fn from_config(config: &FetchConfig) -> Result<Self, ScraperError> {
        let backend: Box<dyn FetchBackend> = match config.backend {
            BackendKind::Http => Box::new(
                HttpBackend::new(config).map_err(|e| ScraperError::Client(e.to_string()))?,
            ),
            #[cfg(feature = "render")]
            BackendKind::Render => Box::new(super::render::RenderBackend::launch(config).await?),
            #[cfg(not(feature = "render"))]
            BackendKind::Render => {
                return Err(ScraperError::Config(crate::ConfigError::Validation(
                    "fetch.backend = \"render\" requires the `render` feature".to_string(),
                )))
            }
        };

        Ok(Self::new(backend, RetryPolicy::from_config(config)))
    }

    /// Fetches `url`, retrying transient failures per the retry policy
    ///
    /// N consecutive transient failures (N < max-retries) lead to exactly
    /// N + 1 attempts. Delays never shrink from one retry to the next.
    /// Cancellation during an attempt or a backoff ends the loop with
    /// `FetchFailureKind::Cancelled`.
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> FetchResult {
        let mut state = RetryState::Attempting {
            attempt: 1,
            last_delay: Duration::ZERO,
        };

        loop {
            state = match state {
                RetryState::Attempting {
                    attempt,
                    last_delay,
                } => {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(FetchError::new(FetchFailureKind::Cancelled)),
                        result = self.backend.fetch(url) => result,
                    };

                    match outcome {
                        Ok(Retrieved::Page(page)) => RetryState::Done(FetchStatus::Ok(page)),
                        Ok(Retrieved::Redirect(location)) => {
                            RetryState::Done(FetchStatus::Redirected { location })
                        }
                        Err(err) if err.kind.is_transient() && attempt <= self.policy.max_retries => {
                            let mut delay = self.policy.delay(attempt);
                            if let Some(requested) = err.retry_after {
                                delay = delay.max(requested.min(self.policy.max_delay));
                            }
                            let delay = delay.max(last_delay);
                            tracing::warn!(
                                url = %url,
                                attempt,
                                error = %err,
                                delay_ms = delay.as_millis() as u64,
                                "Transient fetch failure, retrying"
                            );
                            RetryState::Backoff { attempt, delay }
                        }
                        Err(err) => RetryState::Done(FetchStatus::Failed {
                            kind: err.kind,
                            attempts: attempt,
                        }),
                    }
                }
                RetryState::Backoff { attempt, delay } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => RetryState::Done(FetchStatus::Failed {
                            kind: FetchFailureKind::Cancelled,
                            attempts: attempt,
                        }),
                        _ = tokio::time::sleep(delay) => RetryState::Attempting {
                            attempt: attempt + 1,
                            last_delay: delay,
                        },
                    }
                }
                RetryState::Done(status) => {
                    if let FetchStatus::Failed { kind, attempts } = &status {
                        tracing::debug!(url = %url, attempts, error = %kind, "Fetch failed");
                    }
                    return FetchResult {
                        url: url.clone(),
                        status,
                    };
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Backend that replays a fixed script of outcomes
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<Retrieved, FetchError>>>,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<Retrieved, FetchError>>) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            let backend = Self {
                script: Mutex::new(script.into()),
                calls: calls.clone(),
            };
            (backend, calls)
        }
    }

    #[async_trait]
    impl FetchBackend for ScriptedBackend {
        async fn fetch(&self, _url: &Url) -> Result<Retrieved, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::new(FetchFailureKind::Backend("exhausted".into()))))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Backend whose attempts never finish
    struct StalledBackend;

    #[async_trait]
    impl FetchBackend for StalledBackend {
        async fn fetch(&self, _url: &Url) -> Result<Retrieved, FetchError> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    fn page() -> Result<Retrieved, FetchError> {
        Ok(Retrieved::Page(FetchedPage {
            payload: "<html></html>".to_string(),
            content_type: "text/html".to_string(),
            final_url: Url::parse("https://example.com/").unwrap(),
        }))
    }

    fn cancel_after(delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
        cancel
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    fn transient() -> Result<Retrieved, FetchError> {
        Err(FetchError::new(FetchFailureKind::HttpStatus(503)))
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchFailureKind::Timeout.is_transient());
        assert!(FetchFailureKind::Connect.is_transient());
        assert!(FetchFailureKind::HttpStatus(500).is_transient());
        assert!(FetchFailureKind::HttpStatus(429).is_transient());
        assert!(!FetchFailureKind::HttpStatus(404).is_transient());
        assert!(!FetchFailureKind::HttpStatus(403).is_transient());
        assert!(!FetchFailureKind::Dns.is_transient());
        assert!(!FetchFailureKind::TooLarge.is_transient());
        assert!(!FetchFailureKind::UnsupportedContent("image/png".into()).is_transient());
    }

    #[test]
    fn test_backoff_delays_are_capped_and_non_decreasing() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(5), Duration::from_millis(1000));
        assert_eq!(policy.delay(64), Duration::from_millis(1000));

        let mut previous = Duration::ZERO;
        for retry in 1..20 {
            assert!(policy.delay(retry) >= previous);
            previous = policy.delay(retry);
        }
    }

    #[test]
    fn test_status_failure() {
        assert_eq!(status_failure(200), None);
        assert_eq!(status_failure(204), None);
        assert_eq!(status_failure(404), Some(FetchFailureKind::HttpStatus(404)));
        assert!(status_failure(503).is_some_and(|kind| kind.is_transient()));
        assert!(status_failure(410).is_some_and(|kind| !kind.is_transient()));
    }

    #[test]
    fn test_supported_content_types() {
        assert!(is_supported_content_type("text/html; charset=utf-8"));
        assert!(is_supported_content_type("application/xhtml+xml"));
        assert!(is_supported_content_type("TEXT/PLAIN"));
        assert!(is_supported_content_type(""));
        assert!(!is_supported_content_type("application/pdf"));
        assert!(!is_supported_content_type("image/png"));
    }

    #[tokio::test]
    async fn test_n_transient_failures_mean_n_plus_one_attempts() {
        let (backend, calls) = ScriptedBackend::new(vec![transient(), transient(), page()]);
        let fetcher = Fetcher::new(Box::new(backend), policy(3));

        let result = fetcher.fetch(&url(), &CancellationToken::new()).await;
        assert!(matches!(result.status, FetchStatus::Ok(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (backend, calls) =
            ScriptedBackend::new(vec![transient(), transient(), transient(), transient()]);
        let fetcher = Fetcher::new(Box::new(backend), policy(2));

        let result = fetcher.fetch(&url(), &CancellationToken::new()).await;
        match result.status {
            FetchStatus::Failed { kind, attempts } => {
                assert_eq!(kind, FetchFailureKind::HttpStatus(503));
                assert_eq!(attempts, 3);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let (backend, calls) = ScriptedBackend::new(vec![
            Err(FetchError::new(FetchFailureKind::HttpStatus(404))),
            page(),
        ]);
        let fetcher = Fetcher::new(Box::new(backend), policy(3));

        let result = fetcher.fetch(&url(), &CancellationToken::new()).await;
        assert!(matches!(
            result.status,
            FetchStatus::Failed {
                kind: FetchFailureKind::HttpStatus(404),
                attempts: 1
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let (backend, calls) = ScriptedBackend::new(vec![page()]);
        let fetcher = Fetcher::new(Box::new(backend), policy(3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher.fetch(&url(), &cancel).await;
        assert!(matches!(
            result.status,
            FetchStatus::Failed {
                kind: FetchFailureKind::Cancelled,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let (backend, calls) = ScriptedBackend::new(vec![transient(), page()]);
        let slow = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
        };
        let fetcher = Fetcher::new(Box::new(backend), slow);

        let started = std::time::Instant::now();
        let result = fetcher
            .fetch(&url(), &cancel_after(Duration::from_millis(50)))
            .await;
        assert!(matches!(
            result.status,
            FetchStatus::Failed {
                kind: FetchFailureKind::Cancelled,
                attempts: 1
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancelled_during_attempt() {
        let fetcher = Fetcher::new(Box::new(StalledBackend), policy(3));

        let result = fetcher
            .fetch(&url(), &cancel_after(Duration::from_millis(50)))
            .await;
        assert!(matches!(
            result.status,
            FetchStatus::Failed {
                kind: FetchFailureKind::Cancelled,
                attempts: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_redirect_is_reported_not_retried() {
        let target = Url::parse("https://example.com/new").unwrap();
        let (backend, calls) =
            ScriptedBackend::new(vec![Ok(Retrieved::Redirect(target.clone())), page()]);
        let fetcher = Fetcher::new(Box::new(backend), policy(3));

        let result = fetcher.fetch(&url(), &CancellationToken::new()).await;
        match result.status {
            FetchStatus::Redirected { location } => assert_eq!(location, target),
            other => panic!("expected redirect, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_backend_reports_redirect_location() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new?x=1"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>new</p>", "text/html"))
            .expect(0)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&FetchConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        match backend.fetch(&url).await.unwrap() {
            Retrieved::Redirect(target) => {
                assert_eq!(target.as_str(), format!("{}/new?x=1", server.uri()));
            }
            Retrieved::Page(_) => panic!("redirect was followed"),
        }
    }

    #[tokio::test]
    async fn test_http_backend_rejects_unsupported_content() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0u8, 1, 2]),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&FetchConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/logo", server.uri())).unwrap();
        let err = backend.fetch(&url).await.unwrap_err();
        assert_eq!(
            err.kind,
            FetchFailureKind::UnsupportedContent("image/png".to_string())
        );
    }

    #[tokio::test]
    async fn test_http_backend_body_limit() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("x".repeat(2048)),
            )
            .mount(&server)
            .await;

        let config = FetchConfig {
            max_body_bytes: 1024,
            ..FetchConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = backend.fetch(&url).await.unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::TooLarge);
    }

    #[tokio::test]
    async fn test_http_backend_reads_retry_after() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&FetchConfig::default()).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = backend.fetch(&url).await.unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::HttpStatus(429));
        assert_eq!(err.retry_after, Some(Duration::from_secs(2)));
    }
}
