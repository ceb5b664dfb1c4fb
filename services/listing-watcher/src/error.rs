//! Service-specific error types

use thiserror::Error;

/// Startup errors raised while wiring sources and watchers from config.
///
/// Per-cycle failures never reach this type: they are published on each
/// watcher's error event and logged there.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] common::Error),

    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("listing client setup failed: {0}")]
    Client(#[from] listing_client::Error),

    #[error("watcher setup failed: {0}")]
    Watch(#[from] listing_watch::Error),

    #[error("account section is missing its {0}")]
    IncompleteAccount(&'static str),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = Error::from(listing_watch::Error::InvalidListing("gilded".into()));
        assert_eq!(
            err.to_string(),
            "watcher setup failed: invalid listing type: gilded"
        );
        assert_eq!(
            Error::IncompleteAccount("password").to_string(),
            "account section is missing its password"
        );
        assert!(
            Error::from(common::Error::invalid("client.user_agent", "must not be empty"))
                .to_string()
                .contains("client.user_agent")
        );
    }
}
