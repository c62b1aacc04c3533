//! Script-rendering fetch backend (headless Chromium)
//!
//! Compiled only with the `render` feature. The browser is launched once per
//! run and every fetch opens a fresh tab. The browser follows redirects
//! itself; the coordinator checks the reported final URL against the crawl
//! scope and the visited set.

use super::fetcher::{
    status_failure, FetchBackend, FetchError, FetchFailureKind, FetchedPage, Retrieved,
};
use crate::config::FetchConfig;
use crate::ScraperError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// How long to wait for the main document's response event after navigation
const STATUS_WAIT: Duration = Duration::from_secs(2);

/// Fetch backend that renders pages in headless Chromium
pub struct RenderBackend {
    browser: Browser,
    handler_task: JoinHandle<()>,
    timeout: Duration,
    max_body_bytes: u64,
}

impl RenderBackend {
    /// Launches the browser and its CDP event handler
    pub async fn launch(config: &FetchConfig) -> Result<Self, ScraperError> {
        let browser_config = BrowserConfig::builder()
            .no_sandbox()
            .arg(format!("--user-agent={}", config.user_agent))
            .arg("--disable-gpu")
            .arg("--mute-audio")
            .build()
            .map_err(|e| ScraperError::Client(format!("browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::Client(format!("failed to launch browser: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "Browser handler event error");
                }
            }
            tracing::debug!("Browser handler task completed");
        });

        tracing::info!("Headless browser launched");

        Ok(Self {
            browser,
            handler_task,
            timeout: Duration::from_secs(config.timeout_secs),
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn render(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(backend_error)?;

        let result = self.navigate(&page, url).await;

        if let Err(e) = page.close().await {
            tracing::debug!(url = %url, error = %e, "Failed to close browser tab");
        }
        result
    }

    async fn navigate(&self, page: &Page, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(backend_error)?;

        page.goto(url.as_str()).await.map_err(backend_error)?;

        let main_frame = page.mainframe().await.map_err(backend_error)?;
        match document_status(&mut responses, main_frame.as_ref()).await {
            Some(status) => {
                let code = u16::try_from(status).unwrap_or(0);
                if let Some(kind) = status_failure(code) {
                    return Err(FetchError::new(kind));
                }
            }
            None => tracing::debug!(url = %url, "No document response seen, status unchecked"),
        }

        let payload = page.content().await.map_err(backend_error)?;
        let final_url = page
            .url()
            .await
            .map_err(backend_error)?
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        if payload.len() as u64 > self.max_body_bytes {
            return Err(FetchError::new(FetchFailureKind::TooLarge));
        }

        Ok(FetchedPage {
            payload,
            content_type: "text/html".to_string(),
            final_url,
        })
    }
}

fn backend_error(e: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::new(FetchFailureKind::Backend(e.to_string()))
}

/// HTTP status of the main frame's document response
///
/// Redirect hops do not emit `responseReceived`, so the first document
/// response for the main frame is the final one.
async fn document_status(
    responses: &mut EventStream<EventResponseReceived>,
    main_frame: Option<&FrameId>,
) -> Option<i64> {
    loop {
        let event = tokio::time::timeout(STATUS_WAIT, responses.next())
            .await
            .ok()??;
        let in_main_frame = main_frame.is_none() || event.frame_id.as_ref() == main_frame;
        if event.r#type == ResourceType::Document && in_main_frame {
            return Some(event.response.status);
        }
    }
}

#[async_trait]
impl FetchBackend for RenderBackend {
    async fn fetch(&self, url: &Url) -> Result<Retrieved, FetchError> {
        match tokio::time::timeout(self.timeout, self.render(url)).await {
            Ok(result) => result.map(Retrieved::Page),
            Err(_) => Err(FetchError::new(FetchFailureKind::Timeout)),
        }
    }

    fn name(&self) -> &'static str {
        "render"
    }
}

impl Drop for RenderBackend {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
