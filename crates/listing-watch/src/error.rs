//! Error types for sweeps and watcher setup

use listing_client::Item;

/// A sweep that ended without reaching its stopping condition.
///
/// Both variants carry the items accumulated before the failure.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(
        "requested too many items, the listing does not keep this many ({count} accumulated)",
        count = .partial.len()
    )]
    FeedExhausted { partial: Vec<Item> },

    #[error("page fetch failed after {attempts} attempts: {source}")]
    Page {
        source: listing_client::Error,
        attempts: u32,
        partial: Vec<Item>,
    },
}

impl SweepError {
    pub fn partial(&self) -> &[Item] {
        match self {
            SweepError::FeedExhausted { partial } | SweepError::Page { partial, .. } => partial,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SweepError::FeedExhausted { .. } => "feed_exhausted",
            SweepError::Page { .. } => "page_fetch",
        }
    }
}

/// Errors from watcher construction and subscription.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("event type {event:?} not recognized, use a valid event type like: error or {expected}")]
    UnknownEvent { event: String, expected: String },

    #[error("invalid listing type: {0}")]
    InvalidListing(String),
}

/// Result alias for watcher operations.
pub type Result<T> = std::result::Result<T, Error>;
