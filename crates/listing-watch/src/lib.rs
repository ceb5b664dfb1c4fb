//! Incremental feed watcher
//!
//! A `Watcher` repeatedly sweeps one listing through a `Fetcher` and hands
//! the new items to its subscribers. Two `PollStrategy` implementations
//! decide what counts as new: `ListingStrategy` keeps a bounded history of
//! emitted identifiers, `FeedStrategy` anchors each sweep on the newest
//! identifier of the previous one.

pub mod error;
pub mod fetcher;
pub mod history;
pub mod signal;
pub mod state;
pub mod strategy;
pub mod target;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use error::{Error, Result, SweepError};
pub use fetcher::{Fetcher, PAGE_RETRIES, SweepOutcome, SweepRequest};
pub use history::SeenHistory;
pub use signal::CloseSignal;
pub use state::{WatcherAction, WatcherEvent, WatcherState, handle_event};
pub use strategy::{FeedStrategy, HISTORY_FACTOR, ListingStrategy, PollStrategy};
pub use target::{FeedTarget, ListingSort, MIN_POLL_INTERVAL, poll_interval};
pub use watcher::{ERROR_EVENT, WatchEvent, Watcher, WatcherHandle, WatcherStats};
