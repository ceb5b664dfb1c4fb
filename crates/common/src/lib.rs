//! Shared types for the listing watcher workspace

mod error;
mod retry;
mod secret;

pub use error::{Error, Result};
pub use retry::{Backoff, RetryPolicy};
pub use secret::Secret;
