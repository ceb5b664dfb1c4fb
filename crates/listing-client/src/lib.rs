//! Rate-limited, retrying client for a paginated listing API
//!
//! `ApiClient` throttles every outbound attempt through a `Scheduler`,
//! authenticates with the cached credential from `listing-auth`, and retries
//! according to the response class. `PageSource` is the seam the feed
//! fetcher consumes: the authenticated client and the anonymous
//! `PublicSource` both implement it.

pub mod classify;
pub mod client;
pub mod error;
pub mod listing;
pub mod public;
pub mod scheduler;

pub use classify::{ResponseClass, classify, rate_limit_advisory};
pub use client::{ApiClient, ApiResponse, DEFAULT_RETRIES};
pub use error::{Error, Result};
pub use listing::{Item, parse_page};
pub use public::PublicSource;
pub use scheduler::{Priority, Scheduler};

use std::future::Future;
use std::pin::Pin;

/// Fetches one page of a listing.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn PageSource>`).
pub trait PageSource: Send + Sync {
    /// Identifier for logging (e.g. "api", "public")
    fn id(&self) -> &str;

    /// Fetch the page of `path` that follows `after` (the head when `None`).
    ///
    /// Items come back in server order, newest first for feed listings.
    fn fetch_page<'a>(
        &'a self,
        path: &'a str,
        after: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>>> + Send + 'a>>;
}
