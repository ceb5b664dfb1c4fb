//! Authenticated, throttled API client
//!
//! Every attempt goes through the `Scheduler`, then obtains a credential,
//! then dispatches. The retry loop lives in `call` alone:
//! - transport failures and 5xx responses share one retry budget
//! - a rate-limit advisory reschedules the identical request after the
//!   advised wait without consuming budget (when automatic retries are on)
//! - 3xx/4xx are returned untouched; they are not transient
//! - a 5xx that survives the budget is returned as `Ok` with its status
//!
//! Retries re-issue the identical request, so non-idempotent calls (POST)
//! may be delivered more than once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::RetryPolicy;
use listing_auth::{API_ORIGIN, CredentialManager};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use tracing::{debug, info, warn};
use url::Url;

use crate::PageSource;
use crate::classify::{ResponseClass, classify};
use crate::error::{Error, Result};
use crate::listing::{Item, parse_page};
use crate::scheduler::{Priority, Scheduler};

/// Additional attempts after the first for transport failures and 5xx.
pub const DEFAULT_RETRIES: u32 = 3;

/// Status and decoded body of a received response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body, or the raw text as a JSON string when not JSON
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Rate-limited, retrying client for the listing API.
pub struct ApiClient {
    http: reqwest::Client,
    origin: Url,
    credentials: Arc<CredentialManager>,
    scheduler: Scheduler,
    user_agent: String,
    automatic_retries: bool,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Client against the default API origin. `user_agent` is taken from the
    /// credential manager's identity.
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<CredentialManager>,
        scheduler: Scheduler,
    ) -> Result<Self> {
        let origin = parse_origin(API_ORIGIN)?;
        let user_agent = credentials.identity().user_agent.clone();
        Ok(Self {
            http,
            origin,
            credentials,
            scheduler,
            user_agent,
            automatic_retries: true,
            retry: RetryPolicy::immediate(DEFAULT_RETRIES),
        })
    }

    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        self.origin = parse_origin(origin)?;
        Ok(self)
    }

    pub fn with_automatic_retries(mut self, enabled: bool) -> Self {
        self.automatic_retries = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve an endpoint path against the API origin.
    pub fn resolve(&self, endpoint: &str) -> Result<Url> {
        self.origin
            .join(endpoint)
            .map_err(|e| Error::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn get(&self, endpoint: &str, data: &serde_json::Value) -> Result<ApiResponse> {
        self.call(endpoint, Method::GET, data).await
    }

    pub async fn post(&self, endpoint: &str, data: &serde_json::Value) -> Result<ApiResponse> {
        self.call(endpoint, Method::POST, data).await
    }

    pub async fn patch(&self, endpoint: &str, data: &serde_json::Value) -> Result<ApiResponse> {
        self.call(endpoint, Method::PATCH, data).await
    }

    pub async fn put(&self, endpoint: &str, data: &serde_json::Value) -> Result<ApiResponse> {
        self.call(endpoint, Method::PUT, data).await
    }

    pub async fn delete(&self, endpoint: &str, data: &serde_json::Value) -> Result<ApiResponse> {
        self.call(endpoint, Method::DELETE, data).await
    }

    /// Issue one logical API call, retrying per the client's policy.
    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        data: &serde_json::Value,
    ) -> Result<ApiResponse> {
        let url = self.resolve(endpoint)?;
        let mut attempts = 0u32;
        let mut explicit_delay: Option<Duration> = None;

        loop {
            let outcome = self
                .scheduler
                .schedule(
                    self.attempt(&url, &method, data),
                    Priority::Normal,
                    explicit_delay.take(),
                )
                .await;
            attempts += 1;

            let response = match outcome {
                Ok(response) => response,
                Err(AttemptError::Credential(e)) => return Err(Error::Credential(e)),
                Err(AttemptError::Transport(e)) if self.retry.should_retry(attempts) => {
                    warn!(%url, attempt = attempts, error = %e, "request failed, retrying");
                    continue;
                }
                Err(AttemptError::Transport(e)) => {
                    warn!(%url, attempts, error = %e, "request failed, retries exhausted");
                    return Err(Error::Transport {
                        attempts,
                        message: e.to_string(),
                    });
                }
            };

            match classify(response.status, &response.body) {
                ResponseClass::Success | ResponseClass::PassThrough => return Ok(response),
                ResponseClass::RateLimited(wait) if self.automatic_retries => {
                    info!(%url, wait_ms = wait.as_millis() as u64, "rate limited, rescheduling");
                    // Advisory reschedules do not consume the retry budget
                    attempts -= 1;
                    explicit_delay = Some(wait);
                }
                ResponseClass::RateLimited(wait) => {
                    return Err(Error::RateLimited {
                        wait,
                        status: response.status,
                        body: response.body,
                    });
                }
                ResponseClass::ServerError if self.retry.should_retry(attempts) => {
                    warn!(%url, status = response.status, attempt = attempts, "server error, retrying");
                }
                ResponseClass::ServerError => {
                    warn!(%url, status = response.status, attempts, "server error, retries exhausted");
                    return Ok(response);
                }
                ResponseClass::Unrecognized => {
                    return Err(Error::Unrecognized {
                        status: response.status,
                        body: response.body,
                    });
                }
            }
        }
    }

    /// One scheduled attempt: credential, then dispatch.
    async fn attempt(
        &self,
        url: &Url,
        method: &Method,
        data: &serde_json::Value,
    ) -> std::result::Result<ApiResponse, AttemptError> {
        let credential = self
            .credentials
            .get_credential()
            .await
            .map_err(AttemptError::Credential)?;

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, credential.authorization())
            .header(USER_AGENT, &self.user_agent);

        request = if *method == Method::GET {
            request.query(&to_pairs(data))
        } else if *method == Method::POST {
            // form() sets Content-Type: application/x-www-form-urlencoded
            request.form(&to_pairs(data))
        } else if data.is_null() {
            request
        } else {
            request.json(data)
        };

        let response = request.send().await.map_err(AttemptError::Transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(AttemptError::Transport)?;
        debug!(%url, %method, status, "api response");

        Ok(ApiResponse {
            status,
            body: decode_body(text),
        })
    }
}

enum AttemptError {
    Credential(listing_auth::Error),
    Transport(reqwest::Error),
}

impl PageSource for ApiClient {
    fn id(&self) -> &str {
        "api"
    }

    fn fetch_page<'a>(
        &'a self,
        path: &'a str,
        after: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>>> + Send + 'a>> {
        Box::pin(async move {
            let params = serde_json::json!({ "after": after.unwrap_or("") });
            let response = self.get(path, &params).await?;
            if !response.is_success() {
                return Err(Error::Status {
                    status: response.status,
                });
            }
            parse_page(&response.body)
        })
    }
}

fn parse_origin(origin: &str) -> Result<Url> {
    Url::parse(origin).map_err(|e| Error::InvalidEndpoint {
        endpoint: origin.to_string(),
        reason: e.to_string(),
    })
}

/// Flatten a JSON object into string pairs for query/form encoding.
///
/// Strings are used verbatim, nulls are dropped, other values use their
/// JSON text. Non-object data encodes to nothing.
pub(crate) fn to_pairs(data: &serde_json::Value) -> Vec<(String, String)> {
    let Some(object) = data.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn decode_body(text: String) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}
