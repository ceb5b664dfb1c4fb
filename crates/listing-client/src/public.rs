//! Unauthenticated page source
//!
//! Plain GET against the public origin with the client-identity header and
//! the `after` cursor. No credential, no throttling of its own: the watcher's
//! poll interval is the only spacing applied.

use std::future::Future;
use std::pin::Pin;

use listing_auth::PUBLIC_ORIGIN;
use reqwest::header::USER_AGENT;
use tracing::debug;
use url::Url;

use crate::PageSource;
use crate::error::{Error, Result};
use crate::listing::{Item, parse_page};

/// Listing pages fetched anonymously from the public origin.
pub struct PublicSource {
    http: reqwest::Client,
    origin: Url,
    user_agent: String,
}

impl PublicSource {
    pub fn new(http: reqwest::Client, user_agent: impl Into<String>) -> Result<Self> {
        Self::with_origin(http, user_agent, PUBLIC_ORIGIN)
    }

    pub fn with_origin(
        http: reqwest::Client,
        user_agent: impl Into<String>,
        origin: &str,
    ) -> Result<Self> {
        let origin = Url::parse(origin).map_err(|e| Error::InvalidEndpoint {
            endpoint: origin.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            http,
            origin,
            user_agent: user_agent.into(),
        })
    }
}

impl PageSource for PublicSource {
    fn id(&self) -> &str {
        "public"
    }

    fn fetch_page<'a>(
        &'a self,
        path: &'a str,
        after: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.origin.join(path).map_err(|e| Error::InvalidEndpoint {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })?;

            let response = self
                .http
                .get(url.clone())
                .header(USER_AGENT, &self.user_agent)
                .query(&[("after", after.unwrap_or(""))])
                .send()
                .await
                .map_err(|e| Error::Transport {
                    attempts: 1,
                    message: e.to_string(),
                })?;

            let status = response.status();
            debug!(%url, status = status.as_u16(), "public page response");
            if !status.is_success() {
                return Err(Error::Status {
                    status: status.as_u16(),
                });
            }

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| Error::Decode(e.to_string()))?;
            parse_page(&body)
        })
    }
}
