//! HTTP utilities for GCP REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("secretmanager-action/", env!("CARGO_PKG_VERSION"));

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Retries after the first attempt for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Backoff before the first retry, doubled on every further attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Upper bound for a single backoff
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Time allowed for one request, from connect to the last body byte
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed to establish a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Statuses worth another attempt
fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Short user-facing hint for common API failures
pub fn status_hint(status: StatusCode) -> Option<&'static str> {
    match status.as_u16() {
        400 => Some("invalid request, check the secret reference"),
        401 => Some("authentication failed, check the workflow credentials"),
        403 => Some("permission denied, the caller needs roles/secretmanager.secretAccessor"),
        404 => Some("secret or version not found"),
        429 => Some("rate limit exceeded"),
        500..=599 => Some("Secret Manager temporarily unavailable"),
        _ => None,
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
    request_timeout: Duration,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Override the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Backoff before retry number `attempt + 1`, capped at [`MAX_RETRY_DELAY`]
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY)
    }

    /// Make a GET request to a GCP API, retrying transient failures
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        let mut attempt = 0;

        loop {
            tracing::debug!("GET {} (attempt {})", url, attempt + 1);

            let result = self
                .client
                .get(url)
                .bearer_auth(token)
                .timeout(self.request_timeout)
                .send()
                .await;

            let retry_reason = match &result {
                Ok(response) if is_retryable(response.status()) => {
                    Some(response.status().to_string())
                }
                Err(e) if e.is_connect() || e.is_timeout() => Some(e.to_string()),
                _ => None,
            };

            if let Some(reason) = retry_reason {
                if attempt < self.max_retries {
                    let delay = self.backoff(attempt);
                    tracing::warn!("GET {} failed ({}), retrying in {:?}", url, reason, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            }

            let response = result.context("Failed to send request")?;
            return Self::read_json(response).await;
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(match status_hint(status) {
                Some(hint) => anyhow::anyhow!("API request failed: {} ({})", status, hint),
                None => anyhow::anyhow!("API request failed: {}", status),
            });
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}
