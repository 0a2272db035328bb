//! Shared HTTP client for the provider backends
//!
//! One `reqwest::Client` per backend, with connect/pool settings fixed here and
//! a small retry loop for 5xx and network failures.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::LlmError;

/// Upper bound for any single request, whatever the caller asks for.
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries after the first attempt, for 5xx and network failures only.
const MAX_RETRIES: u32 = 2;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
        })
    }

    /// Start a POST request on the shared client.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Execute a request with the timeout and retry policy.
    ///
    /// The effective timeout is `min(request_timeout, max_timeout)`. 4xx
    /// responses are never retried; 5xx and network failures are retried up to
    /// twice with a linear backoff (1s, 2s).
    pub async fn execute_with_retry(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider: &str,
    ) -> Result<Response, LlmError> {
        let effective_timeout = request_timeout.min(self.max_timeout);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| LlmError::Transport("Failed to clone request for retry".into()))?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| LlmError::Transport(format!("Failed to build request: {e}")))?;

            debug!(
                provider,
                attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            let failure = match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_client_error() {
                        return Err(map_client_error(status, provider));
                    }
                    if !status.is_server_error() {
                        return Ok(response);
                    }
                    warn!(provider, attempt, status = status.as_u16(), "Server error");
                    LlmError::ProviderOutage(format!("{provider} returned server error: {status}"))
                }
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout {
                        duration: effective_timeout,
                    });
                }
                Err(e) => {
                    let message = redact_error_message(&e.to_string());
                    warn!(provider, attempt, error = %message, "Network error");
                    LlmError::Transport(format!("{provider} request failed: {message}"))
                }
            };

            if attempt > MAX_RETRIES {
                return Err(failure);
            }
            tokio::time::sleep(INITIAL_BACKOFF * attempt).await;
        }
    }
}

/// Map 4xx statuses: 401/403 to auth, 429 to quota, the rest to transport.
fn map_client_error(status: StatusCode, provider: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::ProviderAuth(format!("{provider} authentication failed: {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::ProviderQuota(format!("{provider} rate limit exceeded: {status}"))
        }
        _ => LlmError::Transport(format!("{provider} returned client error: {status}")),
    }
}

static URL_WITH_CREDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^:@\s]+:[^@\s]+@").unwrap());

/// 32+ chars of key alphabet, delimited on both sides.
static POTENTIAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_-])[A-Za-z0-9_-]{32,}(?:[^A-Za-z0-9_-]|$)").unwrap()
});

/// Strip credentials from a message before it is logged or surfaced.
pub(crate) fn redact_error_message(message: &str) -> String {
    let redacted = URL_WITH_CREDS.replace_all(message, "$1[REDACTED]@");
    POTENTIAL_KEY
        .replace_all(&redacted, "[REDACTED_KEY]")
        .into_owned()
}
