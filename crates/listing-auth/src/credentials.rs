//! Cached access credential with proactive refresh
//!
//! The manager holds at most one credential for the lifetime of the process.
//! A refreshed credential is considered valid for half of its issued lifetime,
//! so it is replaced well before the server would reject it mid-request.
//!
//! The tokio Mutex is held across the exchange: concurrent callers that find
//! the cache stale wait for one refresh instead of racing their own.

use std::time::Duration;

use common::{RetryPolicy, Secret};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::constants::{CREDENTIAL_RETRIES, MAX_TOKEN_LIFETIME_SECS, TOKEN_ENDPOINT};
use crate::error::{Error, Result};
use crate::token::{AppIdentity, TokenResponse, exchange_password};

/// An access credential as returned by the token endpoint.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token_type: String,
    pub access_token: Secret<String>,
    /// Instant after which the cached credential must not be handed out
    pub expires_at: Instant,
}

impl Credential {
    /// Build a credential from a token response received at `now`.
    ///
    /// Lifetimes above `MAX_TOKEN_LIFETIME_SECS` are capped.
    pub fn from_response(response: TokenResponse, now: Instant) -> Self {
        let lifetime = Duration::from_secs(response.expires_in.min(MAX_TOKEN_LIFETIME_SECS));
        Self {
            token_type: response.token_type,
            access_token: Secret::new(response.access_token),
            expires_at: now.checked_add(lifetime / 2).unwrap_or(now),
        }
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    /// Value for the `Authorization` header: `"<token_type> <access_token>"`.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose())
    }
}

/// Lazily obtains and caches the access credential.
pub struct CredentialManager {
    http: reqwest::Client,
    identity: AppIdentity,
    token_endpoint: String,
    retry: RetryPolicy,
    cached: Mutex<Option<Credential>>,
}

impl CredentialManager {
    pub fn new(http: reqwest::Client, identity: AppIdentity) -> Self {
        Self {
            http,
            identity,
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            retry: RetryPolicy::immediate(CREDENTIAL_RETRIES),
            cached: Mutex::new(None),
        }
    }

    /// Point the exchange at a different token endpoint.
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Return the cached credential, exchanging for a new one when stale.
    ///
    /// Exchange failures are retried without delay up to the retry budget;
    /// exhausting it yields `RetriesExhausted` and leaves the cache untouched.
    pub async fn get_credential(&self) -> Result<Credential> {
        let mut cached = self.cached.lock().await;
        if let Some(credential) = cached.as_ref() {
            if credential.is_valid_at(Instant::now()) {
                return Ok(credential.clone());
            }
        }

        let mut attempts = 0;
        loop {
            let delay = self.retry.delay_before(attempts);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            match exchange_password(&self.http, &self.token_endpoint, &self.identity).await {
                Ok(response) => {
                    let credential = Credential::from_response(response, Instant::now());
                    debug!(
                        attempts,
                        valid_for_secs = credential
                            .expires_at
                            .saturating_duration_since(Instant::now())
                            .as_secs(),
                        "refreshed access credential"
                    );
                    *cached = Some(credential.clone());
                    return Ok(credential);
                }
                Err(e) if self.retry.should_retry(attempts) => {
                    warn!(attempt = attempts, error = %e, "credential exchange failed, retrying");
                }
                Err(e) => {
                    error!(attempts, error = %e, "credential exchange failed, giving up");
                    return Err(Error::RetriesExhausted {
                        attempts,
                        last_error: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::test_identity;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_body(access: &str, expires_in: u64) -> serde_json::Value {
        serde_json::json!({
            "token_type": "bearer",
            "access_token": access,
            "expires_in": expires_in
        })
    }

    fn manager(server: &MockServer) -> CredentialManager {
        CredentialManager::new(reqwest::Client::new(), test_identity())
            .with_token_endpoint(format!("{}/api/v1/access_token", server.uri()))
    }

    #[test]
    fn refreshed_credential_expires_at_half_lifetime() {
        let now = Instant::now();
        let credential = Credential::from_response(
            TokenResponse {
                token_type: "bearer".into(),
                access_token: "at".into(),
                expires_in: 3600,
            },
            now,
        );
        assert_eq!(credential.expires_at, now + Duration::from_secs(1800));
        assert!(credential.is_valid_at(now + Duration::from_secs(1800)));
        assert!(!credential.is_valid_at(now + Duration::from_secs(1801)));
    }

    #[test]
    fn huge_lifetime_is_capped() {
        let now = Instant::now();
        let credential = Credential::from_response(
            TokenResponse {
                token_type: "bearer".into(),
                access_token: "at".into(),
                expires_in: u64::MAX,
            },
            now,
        );
        assert_eq!(
            credential.expires_at,
            now + Duration::from_secs(MAX_TOKEN_LIFETIME_SECS / 2)
        );
    }

    #[test]
    fn authorization_joins_type_and_token() {
        let credential = Credential {
            token_type: "bearer".into(),
            access_token: Secret::new("at_xyz".into()),
            expires_at: Instant::now(),
        };
        assert_eq!(credential.authorization(), "bearer at_xyz");
    }

    #[tokio::test]
    async fn cached_credential_is_reused_within_validity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at_1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let first = manager.get_credential().await.unwrap();
        let second = manager.get_credential().await.unwrap();
        let third = manager.get_credential().await.unwrap();

        assert_eq!(first.access_token.expose(), "at_1");
        assert_eq!(second.access_token.expose(), "at_1");
        assert_eq!(first.expires_at, third.expires_at);
    }

    #[tokio::test]
    async fn expired_credential_triggers_new_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at_short", 0)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at_long", 3600)))
            .mount(&server)
            .await;

        let manager = manager(&server);
        let first = manager.get_credential().await.unwrap();
        assert_eq!(first.access_token.expose(), "at_short");

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = manager.get_credential().await.unwrap();
        assert_eq!(second.access_token.expose(), "at_long");
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at_ok", 3600)))
            .mount(&server)
            .await;

        let credential = manager(&server).get_credential().await.unwrap();
        assert_eq!(credential.access_token.expose(), "at_ok");
    }

    #[tokio::test]
    async fn exhausted_retries_yield_error_after_six_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(6)
            .mount(&server)
            .await;

        let result = manager(&server).get_credential().await;
        match result {
            Err(Error::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 6),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }
}
