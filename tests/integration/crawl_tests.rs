//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! fetch, extract, chunk and export cycle into a temporary output root.

use context_scraper::chunker::count_tokens;
use context_scraper::config::Config;
use context_scraper::crawler::crawl;
use context_scraper::output::{file_stem, read_metadata, JsonRecord, OutputFormat, OutputLayout};
use context_scraper::trigger::{run_scrape, ScrapeRequest, ScrapeResponse};
use context_scraper::ScraperError;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing under `root`
fn create_test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.output.root = root.to_string_lossy().into_owned();
    config.crawler.concurrency = 2;
    config.fetch.max_retries = 0;
    config.fetch.backoff_base_ms = 1;
    config.fetch.backoff_cap_ms = 5;
    config
}

fn html_page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>{}</title></head><body><main>{}</main></body></html>",
            title, body
        ),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, route: &str, title: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(title, body))
        .mount(server)
        .await;
}

fn count_files(dir: &Path, extension: &str) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().extension().map_or(false, |e| e == extension))
                .count()
        })
        .unwrap_or(0)
}

fn requests_to(requests: &[wiremock::Request], route: &str) -> usize {
    requests.iter().filter(|r| r.url.path() == route).count()
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Welcome to the docs.</p><a href="/page1">Page 1</a> <a href="/page2">Page 2</a>"#,
    )
    .await;
    mount_page(&mock_server, "/page1", "Page 1", "<p>Content one.</p>").await;
    mount_page(&mock_server, "/page2", "Page 2", "<p>Content two.</p>").await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(dir.path());
    let start_url = format!("{}/", mock_server.uri());

    let outcome = crawl(config, &start_url, "docs", CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(outcome.metadata.pages_processed, 3);
    assert!(outcome.metadata.failed_urls.is_empty());
    assert!(outcome.metadata.total_tokens > 0);

    let layout = OutputLayout::new(dir.path(), "docs");
    assert_eq!(outcome.output_directory, layout.project_dir());
    assert_eq!(count_files(&layout.dir_for(OutputFormat::Json), "json"), 3);
    assert_eq!(count_files(&layout.dir_for(OutputFormat::RawHtml), "html"), 3);
    assert!(count_files(&layout.dir_for(OutputFormat::Txt), "txt") >= 3);

    let page1 = Url::parse(&format!("{}/page1", mock_server.uri())).unwrap();
    let json = std::fs::read_to_string(layout.json_path(&file_stem(&page1)))
        .expect("Missing JSON record for page1");
    let record: JsonRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(record.title, "Page 1");
    assert_eq!(record.url, page1.as_str());
    assert!(record.content.contains("Content one."));
}

#[tokio::test]
async fn test_failed_page_is_recorded_and_run_succeeds() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/good">Good</a> <a href="/missing">Missing</a>"#,
    )
    .await;
    mount_page(&mock_server, "/good", "Good", "<p>Fine.</p>").await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let request = ScrapeRequest {
        start_url: format!("{}/", mock_server.uri()),
        project_name: Some("docs".to_string()),
        pdf_export: false,
    };

    let response = run_scrape(request, create_test_config(dir.path()), CancellationToken::new()).await;
    let ScrapeResponse::Success { data } = response else {
        panic!("expected success, got {:?}", response);
    };
    assert_eq!(data.pages_processed, 2);
    assert_eq!(
        data.failed_urls,
        vec![format!("{}/missing", mock_server.uri())]
    );
}

#[tokio::test]
async fn test_long_page_is_chunked_losslessly() {
    let mock_server = MockServer::start().await;
    let body: String = (0..60)
        .map(|i| format!("<p>Paragraph number {} explains one topic.</p>", i))
        .collect();
    mount_page(&mock_server, "/", "Long", &body).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.chunk.max_tokens = 20;
    let start_url = format!("{}/", mock_server.uri());

    crawl(config, &start_url, "docs", CancellationToken::new())
        .await
        .expect("Crawl failed");

    let layout = OutputLayout::new(dir.path(), "docs");
    let stem = file_stem(&Url::parse(&start_url).unwrap());
    let record: JsonRecord =
        serde_json::from_str(&std::fs::read_to_string(layout.json_path(&stem)).unwrap()).unwrap();

    let mut chunks = Vec::new();
    while let Ok(text) = std::fs::read_to_string(layout.chunk_path(&stem, chunks.len())) {
        chunks.push(text);
    }
    assert!(chunks.len() >= 2, "expected several chunks, got {}", chunks.len());
    for text in &chunks {
        assert!(count_tokens(text) <= 20);
    }
    assert_eq!(chunks.concat(), record.content);
    assert_eq!(
        chunks.iter().map(|t| count_tokens(t)).sum::<usize>(),
        record.tokens
    );
}

#[tokio::test]
async fn test_same_page_reached_by_several_links_is_fetched_once() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r##"<p>Index.</p><a href="/a">A</a> <a href="/b">B</a> <a href="/shared#top">Shared</a>"##,
    )
    .await;
    mount_page(&mock_server, "/a", "A", r#"<p>A.</p><a href="/shared/">Shared</a>"#).await;
    mount_page(&mock_server, "/b", "B", r#"<p>B.</p><a href="./shared?">Shared</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html_page("Shared", "<p>Shared page.</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = crawl(
        create_test_config(dir.path()),
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(outcome.metadata.pages_processed, 4);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_other_hosts_are_not_crawled() {
    let mock_server = MockServer::start().await;
    let port = Url::parse(&mock_server.uri()).unwrap().port().unwrap();
    mount_page(
        &mock_server,
        "/",
        "Home",
        &format!(
            r#"<p>Index.</p><a href="http://localhost:{}/other">Elsewhere</a> <a href="/local">Local</a>"#,
            port
        ),
    )
    .await;
    mount_page(&mock_server, "/local", "Local", "<p>Local.</p>").await;
    mount_page(&mock_server, "/other", "Other", "<p>Other.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = crawl(
        create_test_config(dir.path()),
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(outcome.metadata.pages_processed, 2);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/other"), 0);
    assert_eq!(requests_to(&requests, "/local"), 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/flaky">Flaky</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.fetch.max_retries = 2;

    let outcome = crawl(
        config,
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(outcome.metadata.pages_processed, 1);
    assert_eq!(
        outcome.metadata.failed_urls,
        vec![format!("{}/flaky", mock_server.uri())]
    );
    mock_server.verify().await;
}

#[tokio::test]
async fn test_max_pages_limits_dequeued_urls() {
    let mock_server = MockServer::start().await;
    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/p{}">P{}</a> "#, i, i))
        .collect();
    mount_page(&mock_server, "/", "Home", &format!("<p>Index.</p>{}", links)).await;
    for i in 1..=5 {
        mount_page(&mock_server, &format!("/p{}", i), "P", &format!("<p>Page {}.</p>", i)).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.concurrency = 1;
    config.crawler.max_pages = 2;

    let outcome = crawl(
        config,
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(outcome.metadata.pages_processed, 2);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_max_depth_zero_crawls_start_page_only() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/next">Next</a>"#,
    )
    .await;
    mount_page(&mock_server, "/next", "Next", "<p>Next.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.max_depth = 0;

    let outcome = crawl(
        config,
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(outcome.metadata.pages_processed, 1);
}

#[tokio::test]
async fn test_invalid_start_url_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let result = crawl(
        create_test_config(dir.path()),
        "not a url",
        "docs",
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(ScraperError::StartUrl { .. })));
    assert!(!OutputLayout::new(dir.path(), "docs").metadata_path().exists());
}

#[tokio::test]
async fn test_metadata_written_on_completion() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", "Home", "<p>Only page.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let start_url = format!("{}/", mock_server.uri());
    let outcome = crawl(
        create_test_config(dir.path()),
        &start_url,
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    let layout = OutputLayout::new(dir.path(), "docs");
    let metadata = read_metadata(&layout.metadata_path())
        .await
        .expect("metadata.json missing");
    assert_eq!(metadata, outcome.metadata);
    assert_eq!(metadata.project_name, "docs");
    assert_eq!(metadata.source, start_url);
    assert_eq!(metadata.status, "completed");
    assert_eq!(metadata.pages_processed, 1);
    assert_eq!(metadata.exported, vec!["json", "txt"]);
    assert!(metadata.duration_seconds >= 0.0);
}

#[tokio::test]
async fn test_pdf_export_on_request() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", "Home", "<p>Printable page.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let request = ScrapeRequest {
        start_url: format!("{}/", mock_server.uri()),
        project_name: Some("docs".to_string()),
        pdf_export: true,
    };

    let response = run_scrape(request, create_test_config(dir.path()), CancellationToken::new()).await;
    assert!(response.is_success());

    let layout = OutputLayout::new(dir.path(), "docs");
    assert_eq!(count_files(&layout.dir_for(OutputFormat::Pdf), "pdf"), 1);
}

#[tokio::test]
async fn test_duplicate_content_is_not_exported_twice() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/v1/intro">v1</a> <a href="/latest/intro">latest</a>"#,
    )
    .await;
    mount_page(&mock_server, "/v1/intro", "Intro", "<p>Same words.</p>").await;
    mount_page(&mock_server, "/latest/intro", "Intro", "<p>Same words.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.extract.dedup_content = true;

    let outcome = crawl(
        config,
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(outcome.metadata.pages_processed, 3);
    let layout = OutputLayout::new(dir.path(), "docs");
    assert_eq!(count_files(&layout.dir_for(OutputFormat::Json), "json"), 2);
}

#[tokio::test]
async fn test_cancelled_run_dispatches_nothing() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", "Home", "<p>Never fetched.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = crawl(
        create_test_config(dir.path()),
        &format!("{}/", mock_server.uri()),
        "docs",
        cancel,
    )
    .await
    .expect("Cancelled run still writes its summary");

    assert_eq!(outcome.metadata.pages_processed, 0);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_config_aborts_before_crawling() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", "Home", "<p>Never fetched.</p>").await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = create_test_config(dir.path());
    config.crawler.concurrency = 0;
    let result = crawl(
        config,
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await;
    assert!(matches!(result, Err(ScraperError::Config(_))));

    let mut config = create_test_config(dir.path());
    config.chunk.max_tokens = 0;
    config.fetch.backoff_base_ms = 500;
    config.fetch.backoff_cap_ms = 10;
    let request = ScrapeRequest {
        start_url: format!("{}/", mock_server.uri()),
        project_name: Some("docs".to_string()),
        pdf_export: false,
    };
    match run_scrape(request, config, CancellationToken::new()).await {
        ScrapeResponse::Error { message } => assert!(message.starts_with("Configuration error")),
        ScrapeResponse::Success { .. } => panic!("invalid configuration was accepted"),
    }

    assert!(mock_server.received_requests().await.unwrap().is_empty());
    let layout = OutputLayout::new(dir.path(), "docs");
    assert!(!layout.metadata_path().exists());
}

#[tokio::test]
async fn test_redirects_respect_scope_and_visited_set() {
    let mock_server = MockServer::start().await;
    let port = Url::parse(&mock_server.uri()).unwrap().port().unwrap();
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/old">Old</a> <a href="/new">New</a> <a href="/away">Away</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/new", "New", "<p>Current page.</p>").await;
    Mock::given(method("GET"))
        .and(path("/away"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("http://localhost:{}/offhost", port).as_str()),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/offhost", "Elsewhere", "<p>Off host.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = crawl(
        create_test_config(dir.path()),
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/new"), 1);
    assert_eq!(requests_to(&requests, "/old"), 1);
    assert_eq!(requests_to(&requests, "/offhost"), 0);

    assert_eq!(
        outcome.metadata.failed_urls,
        vec![format!("{}/away", mock_server.uri())]
    );
    // "/", "/new" and "/old" (whose target was already known)
    assert_eq!(outcome.metadata.pages_processed, 3);

    let layout = OutputLayout::new(dir.path(), "docs");
    assert_eq!(count_files(&layout.dir_for(OutputFormat::Json), "json"), 2);
}

#[tokio::test]
async fn test_redirect_target_is_exported_under_its_own_url() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/moved">Moved</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/target"))
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/target",
        "Target",
        r#"<p>Moved here.</p><a href="/target">Self</a> <a href="/moved">Old link</a>"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = crawl(
        create_test_config(dir.path()),
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/moved"), 1);
    assert_eq!(requests_to(&requests, "/target"), 1);
    assert_eq!(outcome.metadata.pages_processed, 2);
    assert!(outcome.metadata.failed_urls.is_empty());

    let layout = OutputLayout::new(dir.path(), "docs");
    let target = Url::parse(&format!("{}/target", mock_server.uri())).unwrap();
    let json = std::fs::read_to_string(layout.json_path(&file_stem(&target)))
        .expect("Missing JSON record for the redirect target");
    let record: JsonRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(record.url, target.as_str());
    assert_eq!(count_files(&layout.dir_for(OutputFormat::Json), "json"), 2);
}

#[tokio::test]
async fn test_cancel_during_in_flight_fetch_fails_the_url() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/slow">Slow</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_page("Slow", "<p>Late.</p>").set_delay(Duration::from_secs(30)))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.fetch.timeout_secs = 60;
    let start_url = format!("{}/", mock_server.uri());
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let run = tokio::spawn(async move { crawl(config, &start_url, "docs", token).await });

    let deadline = Instant::now() + Duration::from_secs(10);
    while requests_to(&mock_server.received_requests().await.unwrap(), "/slow") == 0 {
        assert!(Instant::now() < deadline, "slow page was never requested");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("cancelled run did not drain")
        .unwrap()
        .expect("Cancelled run still writes its summary");

    let metadata = &outcome.metadata;
    assert_eq!(metadata.pages_processed, 1);
    assert_eq!(
        metadata.failed_urls,
        vec![format!("{}/slow", mock_server.uri())]
    );
    assert_eq!(metadata.pages_processed + metadata.failed_urls.len() as u64, 2);
    assert_eq!(metadata.status, "completed");

    let layout = OutputLayout::new(dir.path(), "docs");
    let written = read_metadata(&layout.metadata_path()).await.unwrap();
    assert_eq!(written.failed_urls, metadata.failed_urls);
}

#[tokio::test]
async fn test_time_limit_drains_in_flight_and_completes() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Index.</p><a href="/slow">Slow</a> <a href="/later">Later</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            html_page("Slow", "<p>Worth the wait.</p>").set_delay(Duration::from_millis(1500)),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/later", "Later", "<p>Never reached.</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.concurrency = 1;
    config.crawler.time_limit_secs = 1;

    let outcome = crawl(
        config,
        &format!("{}/", mock_server.uri()),
        "docs",
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/later"), 0);
    assert_eq!(outcome.metadata.pages_processed, 2);
    assert!(outcome.metadata.failed_urls.is_empty());
    assert_eq!(outcome.metadata.status, "completed");
    assert!(outcome.metadata.duration_seconds >= 1.0);
}
