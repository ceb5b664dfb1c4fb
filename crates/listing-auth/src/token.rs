//! Password-grant token exchange
//!
//! One POST to the token endpoint, authenticated with the application's
//! id/secret as HTTP basic auth, carrying the account's username and
//! password as a form body. The response is a short-lived bearer token.

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::constants::GRANT_TYPE;
use crate::error::{Error, Result};

/// Application and account identity used for the exchange.
#[derive(Debug, Clone)]
pub struct AppIdentity {
    pub app_id: String,
    pub app_secret: Secret<String>,
    pub username: String,
    pub password: Secret<String>,
    /// Client-identity string sent as `User-Agent` on every request
    pub user_agent: String,
}

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: u64,
}

/// Exchange the account password for an access token.
pub async fn exchange_password(
    client: &reqwest::Client,
    endpoint: &str,
    identity: &AppIdentity,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint)
        .basic_auth(&identity.app_id, Some(identity.app_secret.expose()))
        .header(reqwest::header::USER_AGENT, &identity.user_agent)
        .form(&[
            ("grant_type", GRANT_TYPE),
            ("username", identity.username.as_str()),
            ("password", identity.password.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the app id/secret pair was rejected
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "token endpoint rejected app credentials ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    // A 200 with {"error": "invalid_grant"} fails here as well
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}
