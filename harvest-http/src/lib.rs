//! Minimal HTTP client for fetching static pages.
//!
//! - GET a page body as text with a per-request timeout
//! - Retries connection failures, 429 and 5xx with exponential backoff and
//!   `Retry-After` support; a request that runs past its timeout fails at once
//! - Never logs secret-looking query parameters
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), harvest_http::HttpError> {
//! let client = harvest_http::HttpClient::new()?;
//! let html = client.get_text("https://example.com/movies?page=2").await?;
//! # let _ = html;
//! # Ok(()) }
//! ```
//!
//! Observability: `tracing` events are emitted for request start, response
//! status, retries and final errors under the `http` target.

use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const SNIPPET_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status} for {url}: {snippet}")]
    Status {
        status: StatusCode,
        url: String,
        snippet: String,
    },
}

/// Page fetcher with a retry budget.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client with a 15 s timeout and two retries.
    ///
    /// ```
    /// use harvest_http::HttpClient;
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new().unwrap();
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// ```
    pub fn new() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// ```
    /// use harvest_http::HttpClient;
    ///
    /// let client = HttpClient::new().unwrap().with_retries(0);
    /// assert_eq!(client.max_retries, 0);
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// GET `url` and return the body decoded as text.
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(format!("{url}: {e}")))?;
        let (host_path, query) = redact_query(&url);
        let mut attempt = 0usize;

        loop {
            tracing::debug!(
                target: "http",
                attempt = attempt + 1,
                max_retries = self.max_retries,
                host_path = %host_path,
                query = ?query,
                timeout_ms = self.default_timeout.as_millis() as u64,
                "http.request.start"
            );

            let started = Instant::now();
            let sent = self
                .inner
                .get(url.clone())
                .header(USER_AGENT, &self.user_agent)
                .timeout(self.default_timeout)
                .send()
                .await;

            let resp = match sent {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if err.is_timeout() {
                        tracing::warn!(target: "http", attempt, %message, "http.timeout");
                        return Err(HttpError::Network(message));
                    }
                    if attempt < self.max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            target: "http",
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            %message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(target: "http", attempt, %message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let body = match resp.text().await {
                Ok(body) => body,
                Err(err) => {
                    let message = err.to_string();
                    if err.is_timeout() {
                        tracing::warn!(target: "http", attempt, %message, "http.timeout");
                        return Err(HttpError::Network(message));
                    }
                    if attempt < self.max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            target: "http",
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            %message,
                            "http.retrying.body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Network(message));
                }
            };

            tracing::debug!(
                target: "http",
                %status,
                duration_ms = started.elapsed().as_millis() as u64,
                body_len = body.len(),
                "http.response"
            );

            if status.is_success() {
                return Ok(body);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.max_retries {
                attempt += 1;
                let delay = match retry_after_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if status == StatusCode::TOO_MANY_REQUESTS => {
                        backoff(attempt).max(Duration::from_millis(1100))
                    }
                    None => backoff(attempt),
                };
                tracing::warn!(
                    target: "http",
                    %status,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    "http.retrying.status"
                );
                sleep(delay).await;
                continue;
            }

            let snippet = snip(&body);
            tracing::warn!(target: "http", %status, host_path = %host_path, %snippet, "http.error");
            return Err(HttpError::Status {
                status,
                url: host_path,
                snippet,
            });
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(10)))
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

fn snip(body: &str) -> String {
    match body.char_indices().nth(SNIPPET_LEN) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Split a URL into "host + path" and a query list with secrets masked.
fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token" | "auth" | "key" | "api_key" | "token" | "secret" | "session"
            );
            let v = if secret { "<redacted>".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    (host_path, redacted)
}
