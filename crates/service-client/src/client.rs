//! Retrying GET client for read-only JSON services.

use log::debug;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;

use linktag_core::RetryPolicy;

use crate::error::{RetryClass, Result, ServiceClientError};

/// Default timeout for a single request attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_LOG_BODY_CHARS: usize = 512;

/// Client for an external read-only service.
///
/// Every call is independent: 404 answers surface as [`ServiceClientError::NotFound`] at once,
/// transport failures and 408/429/5xx answers are retried under the [`RetryPolicy`], and any
/// other non-success status is returned as [`ServiceClientError::Api`].
#[derive(Debug, Clone)]
pub struct ResilientClient {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

fn preview(body: &str) -> String {
    let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        preview.push_str("...");
    }
    preview
}

impl ResilientClient {
    /// Create a client with the default per-request timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root of the service (e.g. "http://links.internal:8000")
    /// * `policy` - Bounds the attempts made per call
    pub fn new(base_url: &str, policy: RetryPolicy) -> Result<Self> {
        Self::with_timeout(base_url, policy, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, policy: RetryPolicy, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ServiceClientError::invalid_request(format!(
                "base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` and decode the JSON body into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get_body(path).await?;
        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response from {}. Body: {}, Error: {}",
                path,
                preview(&body),
                e
            );
            ServiceClientError::Json(e)
        })
    }

    /// GET `path` and return the JSON body as-is.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        self.get(path).await
    }

    async fn get_body(&self, path: &str) -> Result<String> {
        let url = self.url(path);
        let mut attempt = 1;

        loop {
            let error = match self.attempt(&url, path).await {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if error.retry_class() != RetryClass::Retryable {
                return Err(error);
            }
            if self.policy.is_exhausted(attempt) {
                debug!("GET {} failed after {} attempt(s): {}", url, attempt, error);
                return Err(ServiceClientError::RetryExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let wait = self.policy.wait_before(attempt);
            debug!(
                "GET {} retry attempt {}/{} in {:?} after: {}",
                url,
                attempt + 1,
                self.policy.max_attempts(),
                wait,
                error
            );
            sleep(wait).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &str, path: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("API response status: {}", status);
            return Err(ServiceClientError::NotFound {
                path: path.to_string(),
            });
        }

        let body = response.text().await?;
        if status.is_success() {
            debug!("API response status: {}", status);
            return Ok(body);
        }

        let preview = preview(&body);
        debug!("API response error ({}): {}", status, preview);
        Err(ServiceClientError::api(
            status.as_u16(),
            format!("Request failed: {}", preview),
        ))
    }
}
