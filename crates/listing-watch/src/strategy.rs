//! Per-cycle polling strategies
//!
//! A listing whose order is not chronological (hot, top, ...) is polled for a
//! fixed window and de-duplicated against recent history. A chronological
//! feed is swept from the head down to the newest identifier of the previous
//! cycle, so no history is needed.

use std::future::Future;
use std::pin::Pin;

use listing_client::Item;
use tracing::debug;

use crate::error::SweepError;
use crate::fetcher::{Fetcher, SweepOutcome, SweepRequest};
use crate::history::SeenHistory;

/// History kept per item of the polled window.
pub const HISTORY_FACTOR: usize = 5;

/// Produces the new items of one poll cycle, in emission order.
pub trait PollStrategy: Send {
    fn kind(&self) -> &'static str;

    fn poll<'a>(
        &'a mut self,
        fetcher: &'a Fetcher,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, SweepError>> + Send + 'a>>;
}

/// Fixed window of `limit` items, filtered through a bounded seen-history.
#[derive(Debug)]
pub struct ListingStrategy {
    limit: usize,
    history: SeenHistory,
}

impl ListingStrategy {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            history: SeenHistory::new(limit.saturating_mul(HISTORY_FACTOR)),
        }
    }

    pub fn history(&self) -> &SeenHistory {
        &self.history
    }
}

impl PollStrategy for ListingStrategy {
    fn kind(&self) -> &'static str {
        "listing"
    }

    fn poll<'a>(
        &'a mut self,
        fetcher: &'a Fetcher,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, SweepError>> + Send + 'a>> {
        Box::pin(async move {
            let request = SweepRequest::head(path).target(self.limit);
            match fetcher.fetch_until(request, None).await? {
                SweepOutcome::Complete(items) => Ok(items
                    .into_iter()
                    .filter(|item| self.history.insert(&item.name))
                    .collect()),
                SweepOutcome::Probed | SweepOutcome::Cancelled => Ok(Vec::new()),
            }
        })
    }
}

/// Head-to-anchor sweep of a chronological feed.
///
/// The first cycle only records the newest identifier. Each later cycle
/// returns everything above the anchor, newest first, and moves the anchor
/// to the head of what it saw. The anchor advances even when the sweep
/// fails so a broken cycle is not replayed.
#[derive(Debug, Default)]
pub struct FeedStrategy {
    anchor: Option<String>,
}

impl FeedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }
}

impl PollStrategy for FeedStrategy {
    fn kind(&self) -> &'static str {
        "feed"
    }

    fn poll<'a>(
        &'a mut self,
        fetcher: &'a Fetcher,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, SweepError>> + Send + 'a>> {
        Box::pin(async move {
            let mut newest: Option<String> = None;
            let mut record = |name: &str| newest = Some(name.to_string());

            let request = SweepRequest::head(path).until(self.anchor.as_deref());
            let result = fetcher.fetch_until(request, Some(&mut record)).await;

            if let Some(newest) = newest {
                self.anchor = Some(newest);
            }

            match result? {
                SweepOutcome::Complete(items) => Ok(items),
                SweepOutcome::Probed => {
                    debug!(path, anchor = ?self.anchor, "feed anchored");
                    Ok(Vec::new())
                }
                SweepOutcome::Cancelled => Ok(Vec::new()),
            }
        })
    }
}
