//! Stripe REST client.
//!
//! Direct HTTP via reqwest; no vendor SDK. Requests are form-encoded on the
//! way in and JSON on the way out, with bounded retry on rate limits, server
//! errors and transport failures.
//!
//! Modules:
//! - customers: roster listing + hourly-rate metadata updates
//! - invoices: invoice/line-item reads, draft creation, line-item writes

pub mod customers;
pub mod invoices;

use std::time::Duration;

use crate::ports::PortError;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Page size for list endpoints; Stripe's documented maximum.
pub const PAGE_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum StripeApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Stripe API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request exhausted retries")]
    RetriesExhausted,
}

impl From<StripeApiError> for PortError {
    fn from(err: StripeApiError) -> Self {
        match err {
            StripeApiError::Http(e) => PortError::Transport(e.to_string()),
            StripeApiError::Api { status: 401, message } => PortError::Auth(message),
            StripeApiError::Api { status, message } => PortError::Api { status, message },
            StripeApiError::RetriesExhausted => {
                PortError::Transport("request exhausted retries".into())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let backoff = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    Duration::from_millis(backoff)
}

/// Send a request, retrying retryable statuses and transport errors with
/// exponential backoff.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, StripeApiError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(StripeApiError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) && attempt < attempts {
                    let delay = retry_delay(attempt, policy);
                    log::warn!(
                        "stripe retry {attempt}/{attempts} after status {status} (sleep {delay:?})"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable = err.is_timeout() || err.is_connect();
                if retryable && attempt < attempts {
                    let delay = retry_delay(attempt, policy);
                    log::warn!(
                        "stripe retry {attempt}/{attempts} after transport error: {err} (sleep {delay:?})"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(StripeApiError::Http(err));
            }
        }
    }

    Err(StripeApiError::RetriesExhausted)
}

/// Authenticated Stripe client. One instance serves both the customer-roster
/// and billing-store ports.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl StripeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        StripeClient {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the client at a different host (local mock in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, StripeApiError> {
        let request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .query(query);
        let response = send_with_retry(request, &self.retry).await?;
        Self::decode(response).await
    }

    pub(crate) async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<serde_json::Value, StripeApiError> {
        let request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .form(form);
        let response = send_with_retry(request, &self.retry).await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<serde_json::Value, StripeApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StripeApiError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response.json().await?)
    }
}

/// Pull the human-readable message out of a Stripe error payload, falling
/// back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
