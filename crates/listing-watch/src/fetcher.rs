//! Paginated sweep over a listing
//!
//! A sweep walks pages from the head (or a given cursor) until it has
//! gathered `target` items, reached the `sentinel` identifier, or, with
//! neither condition set, seen exactly one page. Pages are spaced by the
//! page interval; a failing page is retried on the same cursor before the
//! sweep gives up with whatever it accumulated.

use std::sync::Arc;
use std::time::Duration;

use common::{Backoff, RetryPolicy};
use listing_client::{Item, PageSource};
use tracing::{debug, warn};

use crate::error::SweepError;
use crate::signal::CloseSignal;

/// Retries of a single failing page before the sweep errors.
pub const PAGE_RETRIES: u32 = 3;

/// Where a sweep starts and when it stops.
#[derive(Debug, Clone, Copy)]
pub struct SweepRequest<'a> {
    pub path: &'a str,
    pub after: Option<&'a str>,
    pub target: Option<usize>,
    pub sentinel: Option<&'a str>,
}

impl<'a> SweepRequest<'a> {
    pub fn head(path: &'a str) -> Self {
        Self {
            path,
            after: None,
            target: None,
            sentinel: None,
        }
    }

    pub fn target(mut self, count: usize) -> Self {
        self.target = Some(count);
        self
    }

    pub fn until(mut self, sentinel: Option<&'a str>) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn after(mut self, cursor: &'a str) -> Self {
        self.after = Some(cursor);
        self
    }
}

#[derive(Debug, PartialEq)]
pub enum SweepOutcome {
    /// Stopping condition reached; items in server order.
    Complete(Vec<Item>),
    /// Neither target nor sentinel given; one page fetched, nothing returned.
    Probed,
    /// The close signal fired before the sweep finished.
    Cancelled,
}

/// Drives sweeps against one page source.
pub struct Fetcher {
    source: Arc<dyn PageSource>,
    page_interval: Duration,
    retry: RetryPolicy,
    close: Arc<CloseSignal>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn PageSource>, page_interval: Duration, close: Arc<CloseSignal>) -> Self {
        Self {
            source,
            page_interval,
            retry: RetryPolicy::new(PAGE_RETRIES, Backoff::Fixed(page_interval)),
            close,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn page_interval(&self) -> Duration {
        self.page_interval
    }

    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Run one sweep.
    ///
    /// `on_first_page` receives the newest identifier of the first page when
    /// the sweep starts from the head and that page is non-empty.
    pub async fn fetch_until(
        &self,
        request: SweepRequest<'_>,
        mut on_first_page: Option<&mut (dyn FnMut(&str) + Send)>,
    ) -> Result<SweepOutcome, SweepError> {
        let mut cursor = request.after.map(str::to_string);
        let mut remaining = request.target;
        let mut items: Vec<Item> = Vec::new();
        let mut failures = 0u32;

        loop {
            if self.close.is_closed() {
                return Ok(SweepOutcome::Cancelled);
            }

            let mut page = match self
                .source
                .fetch_page(request.path, cursor.as_deref())
                .await
            {
                Ok(page) => {
                    failures = 0;
                    page
                }
                Err(e) => {
                    failures += 1;
                    if !self.retry.should_retry(failures) {
                        return Err(SweepError::Page {
                            source: e,
                            attempts: failures,
                            partial: items,
                        });
                    }
                    warn!(
                        source = self.source.id(),
                        path = request.path,
                        after = cursor.as_deref().unwrap_or(""),
                        attempt = failures,
                        error = %e,
                        "page fetch failed, retrying"
                    );
                    if !self.pause(self.retry.delay_before(failures)).await {
                        return Ok(SweepOutcome::Cancelled);
                    }
                    continue;
                }
            };

            if page.is_empty() {
                return Err(SweepError::FeedExhausted { partial: items });
            }

            if cursor.is_none()
                && let Some(callback) = on_first_page.as_deref_mut()
            {
                callback(&page[0].name);
            }

            if request.target.is_none() && request.sentinel.is_none() {
                return Ok(SweepOutcome::Probed);
            }

            let mut done = false;
            if let Some(wanted) = remaining
                && page.len() >= wanted
            {
                page.truncate(wanted);
                done = true;
            }
            if let Some(sentinel) = request.sentinel
                && let Some(at) = page.iter().position(|i| i.name == sentinel)
            {
                page.truncate(at);
                done = true;
            }

            remaining = remaining.map(|n| n.saturating_sub(page.len()));
            let last = page.last().map(|i| i.name.clone());
            items.extend(page);

            if done {
                debug!(path = request.path, items = items.len(), "sweep complete");
                return Ok(SweepOutcome::Complete(items));
            }

            cursor = last;
            if !self.pause(self.page_interval).await {
                return Ok(SweepOutcome::Cancelled);
            }
        }
    }

    /// Sleep for `delay` unless closed first. Returns `false` when closed.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => !self.close.is_closed(),
            _ = self.close.closed() => false,
        }
    }
}
