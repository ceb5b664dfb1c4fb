//! Error types for API calls and page fetches

use std::time::Duration;

/// Errors from the API client and page sources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential unavailable: {0}")]
    Credential(#[from] listing_auth::Error),

    #[error("no response after {attempts} attempts: {message}")]
    Transport { attempts: u32, message: String },

    #[error("you are doing this too much, try again in: {secs} seconds", secs = .wait.as_secs_f64())]
    RateLimited {
        wait: Duration,
        status: u16,
        body: serde_json::Value,
    },

    #[error("unrecognized response status {status}")]
    Unrecognized {
        status: u16,
        body: serde_json::Value,
    },

    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("listing request returned status {status}")]
    Status { status: u16 },

    #[error("malformed listing: {0}")]
    Decode(String),
}

impl Error {
    /// Status/body pair carried by errors that did receive a response.
    pub fn response(&self) -> Option<(u16, &serde_json::Value)> {
        match self {
            Error::RateLimited { status, body, .. } | Error::Unrecognized { status, body } => {
                Some((*status, body))
            }
            _ => None,
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
