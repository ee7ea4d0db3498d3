use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::settings::Settings;

const BASE_BACKOFF_MS: u64 = 2000;
/// Backoff stops doubling after this many retries.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// reqwest client with the age-gate cookie, a minimum gap between requests
/// and exponential backoff on transient statuses.
pub struct HttpFetcher {
    client: reqwest::Client,
    delay: Duration,
    max_retries: u32,
    last_request: Mutex<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("over18=1"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(HttpFetcher {
            client,
            delay: Duration::from_millis(settings.download_delay_ms),
            max_retries: settings.max_retries,
            last_request: Mutex::new(None),
        })
    }

    /// Wait until `delay` has passed since the previous request went out.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let next = prev + self.delay;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_once(&self, url: &str) -> reqwest::Result<FetchedPage> {
        self.pace().await;
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchedPage { status, body })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut attempt = 0;
        loop {
            let reason = match self.fetch_once(url).await {
                Ok(page) if !is_retryable(page.status) => {
                    debug!("{} {}", page.status, url);
                    return Ok(page);
                }
                Ok(page) if attempt == self.max_retries => return Ok(page),
                Ok(page) => format!("status {}", page.status),
                Err(e) if attempt == self.max_retries => {
                    return Err(e).with_context(|| format!("fetching {}", url))
                }
                Err(e) => e.to_string(),
            };

            let backoff = backoff_delay(attempt);
            warn!(
                "{} on {} (attempt {}/{}), backing off {:.1}s",
                reason,
                url,
                attempt + 1,
                self.max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS << attempt.min(MAX_BACKOFF_DOUBLINGS))
}

/// Transient statuses worth another try, including the CDN's 52x codes.
pub fn is_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 521 | 522 | 524)
}
