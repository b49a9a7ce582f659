use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use url::Url;

use crate::core::config::ExtractConfig;
use crate::error::FetchError;

pub const MAX_ATTEMPTS: usize = 7;
pub const BACKOFF_START: Duration = Duration::from_secs(1);
pub const BACKOFF_CAP: Duration = Duration::from_secs(16);

const ACCEPT_HEADER: &str = "application/json, text/html, application/xml;q=0.9, */*;q=0.8";

/// Minimum-interval limiter shared by every outbound call. The lock is held
/// across the sleep so no two dispatches can race past the interval check.
pub struct RateLimiter {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Arc<Self> {
        Arc::new(RateLimiter {
            min_interval,
            last_dispatch: Mutex::new(None),
        })
    }

    pub async fn wait(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Success,
    Retry,
    Fail,
}

/// 404 is handed back to the caller: the FilingSummary discovery fallback
/// needs to see it. Rate-limit and 5xx responses are retried.
pub(crate) fn status_disposition(status: StatusCode) -> Disposition {
    if status.is_success() || status == StatusCode::NOT_FOUND {
        Disposition::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Disposition::Retry
    } else {
        Disposition::Fail
    }
}

/// Runs `attempt` up to `max_attempts` times, sleeping `backoff` (doubling,
/// capped) between transient failures. Exhausting the budget yields a
/// permanent error carrying the last observed failure.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    mut attempt: F,
    max_attempts: usize,
    mut backoff: Duration,
    cap: Duration,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut last: Option<FetchError> = None;
    for n in 0..max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err @ FetchError::Permanent { .. }) => return Err(err),
            Err(err) => {
                warn!("attempt {}/{} failed: {}", n + 1, max_attempts, err);
                last = Some(err);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, cap);
            }
        }
    }
    match last {
        Some(FetchError::Transient { url, reason }) => Err(FetchError::Permanent {
            url,
            reason: format!("retries exhausted: {}", reason),
        }),
        Some(err) => Err(err),
        None => unreachable!("max_attempts is never zero"),
    }
}

/// Rate-limited SEC client. Every request carries the identifying
/// User-Agent; its absence is rejected at construction, before any network
/// activity.
pub struct EdgarClient {
    http: Client,
    limiter: Arc<RateLimiter>,
    user_agent: String,
    max_response_bytes: usize,
}

impl EdgarClient {
    pub fn new(config: &ExtractConfig, limiter: Arc<RateLimiter>) -> anyhow::Result<Self> {
        config.validate()?;
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(EdgarClient {
            http,
            limiter,
            user_agent: config.user_agent.clone(),
            max_response_bytes: config.max_response_bytes,
        })
    }

    async fn attempt(&self, url: &str) -> Result<(StatusCode, Vec<u8>), FetchError> {
        // A malformed URL is a template bug, not a network condition.
        let parsed = Url::parse(url).map_err(|e| FetchError::Permanent {
            url: url.to_string(),
            reason: format!("invalid URL: {}", e),
        })?;
        self.limiter.wait().await;
        debug!("GET {}", url);
        let response = self
            .http
            .get(parsed)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, ACCEPT_HEADER)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        match status_disposition(status) {
            Disposition::Retry => Err(FetchError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            }),
            Disposition::Fail => Err(FetchError::Permanent {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            }),
            Disposition::Success => {
                let body = response.bytes().await.map_err(|e| FetchError::Transient {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                if body.len() > self.max_response_bytes {
                    return Err(FetchError::Permanent {
                        url: url.to_string(),
                        reason: format!("response too large ({} bytes)", body.len()),
                    });
                }
                Ok((status, body.to_vec()))
            }
        }
    }

    /// Fetches `url`, returning the status for 200 and 404 responses.
    pub async fn fetch_status(&self, url: &str) -> Result<(StatusCode, Vec<u8>), FetchError> {
        retry_with_backoff(|| self.attempt(url), MAX_ATTEMPTS, BACKOFF_START, BACKOFF_CAP).await
    }

    /// Fetches `url`; any non-2xx status (404 included) is a permanent error.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let (status, body) = self.fetch_status(url).await?;
        if !status.is_success() {
            return Err(FetchError::Permanent {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }
        Ok(body)
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self.fetch(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.fetch(url).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Permanent {
            url: url.to_string(),
            reason: format!("invalid JSON: {}", e),
        })
    }
}
