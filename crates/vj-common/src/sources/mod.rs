//! Per-portal listing adapters.
//!
//! Every adapter walks its portal's pagination under the same loop
//! contract: check cancellation before each page, stop on HTTP error,
//! empty page, reported last page or a short page, and pace requests with
//! base-plus-jitter delays.

pub mod careerviet;
pub mod topcv;
pub mod topdev;
pub mod vieclam24h;
pub mod vietnamworks;

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::CrawlerConfig;
use crate::domain::{RawJob, SourceId};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("upstream api error: {0}")]
    Api(String),
    #[error("page handler failed: {0}")]
    Sink(String),
}

/// Receives each decoded page so dedup and publishing happen before the
/// next page is fetched.
#[async_trait]
pub trait PageSink: Send + Sync {
    async fn on_page(&self, jobs: Vec<RawJob>) -> Result<(), CrawlError>;
}

/// Sink that just accumulates, backing the non-streaming [`SourceAdapter::crawl`].
#[derive(Default)]
pub struct CollectSink {
    jobs: Mutex<Vec<RawJob>>,
}

impl CollectSink {
    pub async fn take(&self) -> Vec<RawJob> {
        std::mem::take(&mut *self.jobs.lock().await)
    }
}

#[async_trait]
impl PageSink for CollectSink {
    async fn on_page(&self, jobs: Vec<RawJob>) -> Result<(), CrawlError> {
        self.jobs.lock().await.extend(jobs);
        Ok(())
    }
}

/// Uniform capability set over the closed enumeration of portals.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    /// Streaming crawl: hand every page to `sink` as soon as it decodes.
    /// Cancellation is not an error; the adapter simply stops.
    async fn crawl_with_callback(
        &self,
        cancel: &CancellationToken,
        sink: &dyn PageSink,
    ) -> Result<(), CrawlError>;

    /// Convenience wrapper collecting the whole cycle into memory.
    async fn crawl(&self, cancel: &CancellationToken) -> Result<Vec<RawJob>, CrawlError> {
        let sink = CollectSink::default();
        self.crawl_with_callback(cancel, &sink).await?;
        Ok(sink.take().await)
    }
}

/// Shared HTTP client shape for all adapters: 30 s timeout, configured
/// user agent, optional proxy.
pub(crate) fn build_http_client(cfg: &CrawlerConfig) -> Result<reqwest::Client, CrawlError> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(cfg.user_agent.clone());

    if !cfg.proxy_url.is_empty() {
        let proxy = reqwest::Proxy::all(&cfg.proxy_url).map_err(CrawlError::Client)?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(CrawlError::Client)
}

/// Send a request, retrying transport errors and 5xx responses up to the
/// configured number of retries.
pub(crate) async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
) -> Result<reqwest::Response, CrawlError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let cloned = request.try_clone();

        let outcome = match cloned {
            Some(req) => req.send().await,
            // Streaming bodies cannot be cloned; send the original once.
            None => return Ok(request.send().await?),
        };

        match outcome {
            Ok(response) if response.status().is_server_error() && attempt <= max_retries => {
                warn!(status = %response.status(), attempt, "server error, retrying");
            }
            Ok(response) => return Ok(response),
            Err(err) if attempt <= max_retries => {
                warn!(error = %err, attempt, "request failed, retrying");
            }
            Err(err) => return Err(err.into()),
        }

        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
    }
}

/// Base delay plus uniform jitter in `0..spread_ms`.
pub(crate) fn jitter(base: Duration, spread_ms: u64) -> Duration {
    base + Duration::from_millis(rand::thread_rng().gen_range(0..spread_ms))
}

/// Sleep for `delay` unless cancelled first; returns false on cancel.
pub(crate) async fn pace(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
