//! Page fetching with per-host politeness and exponential backoff.
//!
//! # Architecture
//!
//! - [`Fetch`]: core trait, "give me the HTML behind this URL"
//! - [`HttpFetcher`]: `reqwest` implementation that waits on a [`HostThrottle`]
//!   before every request
//! - [`RetryFetch`]: decorator that retries transient failures of any [`Fetch`]
//!
//! # Retry Strategy
//!
//! Only [`FetchError::Transient`] failures are retried (network errors,
//! timeouts, HTTP 429 and 5xx). The delay doubles per attempt from
//! `base_delay`, is capped at `max_delay`, and gets 0-250ms of random jitter.

use crate::config::CrawlerConfig;
use rand::{rng, Rng};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, instrument, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Worth retrying: the same request may succeed later.
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },
    /// The server answered with a status that will not change on retry.
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Something that turns a URL into page HTML.
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Minimum spacing between two requests to the same host.
///
/// Slots are reserved under the lock and slept on outside it, so concurrent
/// callers for one host queue up `min_delay` apart while other hosts proceed.
#[derive(Debug)]
pub struct HostThrottle {
    min_delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until `host` may be hit again.
    pub async fn wait(&self, host: &str) {
        if self.min_delay.is_zero() {
            return;
        }
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(host).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(host.to_string(), slot + self.min_delay);
            slot
        };
        sleep_until(slot).await;
    }
}

/// HTTP fetcher built from the crawler configuration.
pub struct HttpFetcher {
    client: Client,
    throttle: HostThrottle,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("throttle", &self.throttle)
            .finish()
    }
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            throttle: HostThrottle::new(Duration::from_millis(config.per_host_delay_ms)),
        })
    }
}

fn classify_status(url: &str, status: StatusCode) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        }
    } else {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.throttle.wait(parsed.host_str().unwrap_or_default()).await;

        let transient = |e: reqwest::Error| FetchError::Transient {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self.client.get(parsed).send().await.map_err(transient)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }
        let body = response.text().await.map_err(transient)?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter_ms: u64,
}

impl<T: Fetch> RetryFetch<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter_ms: 250,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.max_jitter_ms = 0;
        self
    }

    #[cfg(test)]
    fn inner(&self) -> &T {
        &self.inner
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: Fetch> Fetch for RetryFetch<T> {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0usize;
        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_transient() => {
                    warn!(error = %e, "Fetch failed permanently; not retrying");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(attempt, max = self.max_retries, error = %e, "fetch() exhausted retries");
                        return Err(e);
                    }
                    let delay = self.backoff(attempt);
                    warn!(attempt, max = self.max_retries, ?delay, error = %e, "fetch() attempt failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Build the production fetcher stack from configuration.
pub fn build_fetcher(config: &CrawlerConfig) -> Result<RetryFetch<HttpFetcher>, FetchError> {
    Ok(RetryFetch::new(
        HttpFetcher::new(config)?,
        config.max_retries,
        Duration::from_millis(config.base_backoff_ms),
    )
    .with_max_delay(Duration::from_millis(config.max_backoff_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
        transient: bool,
    }

    impl Fetch for Flaky {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.transient {
                    return Err(FetchError::Transient {
                        url: url.to_string(),
                        reason: "HTTP 503".to_string(),
                    });
                }
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok("<html></html>".to_string())
        }
    }

    fn flaky(failures: usize, transient: bool) -> Flaky {
        Flaky {
            calls: AtomicUsize::new(0),
            failures,
            transient,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let f = RetryFetch::new(flaky(2, true), 3, Duration::from_millis(10)).without_jitter();
        let body = f.fetch("https://example.com").await.unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(f.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let f = RetryFetch::new(flaky(10, true), 2, Duration::from_millis(10)).without_jitter();
        let err = f.fetch("https://example.com").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(f.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let f = RetryFetch::new(flaky(1, false), 5, Duration::from_millis(10));
        let err = f.fetch("https://example.com").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(f.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let f = RetryFetch::new(flaky(0, true), 5, Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300))
            .without_jitter();
        assert_eq!(f.backoff(1), Duration::from_millis(100));
        assert_eq!(f.backoff(2), Duration::from_millis(200));
        assert_eq!(f.backoff(3), Duration::from_millis(300));
        assert_eq!(f.backoff(9), Duration::from_millis(300));
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status("u", StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(classify_status("u", StatusCode::BAD_GATEWAY).is_transient());
        assert!(!classify_status("u", StatusCode::NOT_FOUND).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_requests_per_host() {
        let throttle = HostThrottle::new(Duration::from_millis(500));
        let t0 = Instant::now();
        throttle.wait("a.example").await;
        throttle.wait("a.example").await;
        throttle.wait("a.example").await;
        assert!(t0.elapsed() >= Duration::from_millis(1000));

        let t1 = Instant::now();
        throttle.wait("b.example").await;
        assert!(t1.elapsed() < Duration::from_millis(500));
    }
}
