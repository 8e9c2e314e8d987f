//! HTTP transport with bounded retries, cancellation and two-tier timeouts.
//!
//! One [`HttpTransport`] owns a pooled [`reqwest::Client`] and is meant to be
//! shared by every request a process makes. All methods take `&self`, so
//! concurrent generations never serialize behind each other.

use crate::error::{GemImgError, Result, TransportError};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Linear backoff retry policy.
///
/// Attempt `n` (1-based) waits `retry_delay * n` before it is sent, so the
/// default policy sleeps 1s, 2s and 3s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay multiplied by the retry number.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.retry_delay.saturating_mul(retry)
    }

    /// Total delay slept when every retry is used.
    pub fn total_delay(&self) -> Duration {
        (1..=self.max_retries).map(|n| self.delay_for(n)).sum()
    }
}

/// Transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Time allowed from sending a request until response headers arrive.
    pub request_timeout: Duration,
    /// Time allowed for a whole exchange, body included.
    pub resource_timeout: Duration,
    /// Retry policy for 5xx responses and connectivity failures.
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            resource_timeout: Duration::from_secs(600),
            retry: RetryPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the overall timeout including body transfer.
    pub fn resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Sets the base retry delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry.retry_delay = delay;
        self
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
}

impl HttpResponse {
    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the body as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Pooled HTTP client shared by all generation calls.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
    shutdown: CancellationToken,
}

impl HttpTransport {
    /// Creates a transport with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    /// Creates a transport with the given settings.
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.resource_timeout)
            .build()
            .map_err(|e| GemImgError::Network {
                attempts: 0,
                source: TransportError::Http(e),
            })?;

        Ok(Self {
            client,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns the transport settings.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Cancels every in-flight call and rejects new ones.
    ///
    /// Pooled connections are released once the calls observe the
    /// cancellation and the transport is dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Sends a POST, retrying 5xx responses and connectivity failures.
    ///
    /// 4xx responses are returned as-is. When retries run out on a 5xx the
    /// final response is returned rather than an error, so the caller still
    /// sees the status and body.
    pub async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let mut headers = headers;
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let retry = self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            let request = self
                .client
                .post(url)
                .headers(headers.clone())
                .body(body.clone());

            let outcome = self.send_once(request, cancel).await?;
            let attempts = attempt + 1;

            match outcome {
                Ok((status, _)) if status.is_server_error() && attempt < retry.max_retries => {
                    tracing::warn!(
                        attempt = attempts,
                        max_retries = retry.max_retries,
                        status = status.as_u16(),
                        "server error, retrying"
                    );
                }
                Ok((status, body)) => {
                    return Ok(HttpResponse {
                        status,
                        body,
                        attempts,
                    })
                }
                Err(e) if attempt < retry.max_retries => {
                    tracing::warn!(
                        attempt = attempts,
                        max_retries = retry.max_retries,
                        "transport error, retrying: {e}"
                    );
                }
                Err(e) => {
                    return Err(GemImgError::Network {
                        attempts,
                        source: e,
                    })
                }
            }

            attempt += 1;
            let delay = retry.delay_for(attempt);
            tracing::debug!(delay_ms = delay.as_millis() as u64, "backing off");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GemImgError::Cancelled),
                _ = self.shutdown.cancelled() => return Err(GemImgError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Sends a GET. Any non-2xx response fails immediately without retry.
    pub async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let request = self.client.get(url).headers(headers);
        let (status, body) = self
            .send_once(request, cancel)
            .await?
            .map_err(|e| GemImgError::Network {
                attempts: 1,
                source: e,
            })?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(GemImgError::Api {
                status: status.as_u16(),
                message: crate::error::sanitize_error_message(&text),
            });
        }

        Ok(HttpResponse {
            status,
            body,
            attempts: 1,
        })
    }

    /// Performs one attempt.
    ///
    /// The outer `Result` carries cancellation, which is never retried. The
    /// inner one carries connectivity failures the caller may retry.
    async fn send_once(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<(StatusCode, Vec<u8>), TransportError>> {
        if self.is_cancelled(cancel) {
            return Err(GemImgError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GemImgError::Cancelled),
            _ = self.shutdown.cancelled() => return Err(GemImgError::Cancelled),
            outcome = self.exchange(request) => outcome,
        };

        if self.is_cancelled(cancel) {
            return Err(GemImgError::Cancelled);
        }

        Ok(outcome)
    }

    async fn exchange(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<(StatusCode, Vec<u8>), TransportError> {
        let timeout = self.config.request_timeout;
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    fn is_cancelled(&self, cancel: &CancellationToken) -> bool {
        cancel.is_cancelled() || self.shutdown.is_cancelled()
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
