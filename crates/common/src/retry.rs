//! Bounded retry budgets
//!
//! A `RetryPolicy` only answers two questions for a call site that owns the
//! loop: may another attempt be made, and how long to wait before it. Keeping
//! the loop at the call site lets each caller decide which outcomes consume
//! budget (a rate-limit reschedule does not, a 5xx does).

use std::time::Duration;

/// Delay applied before a retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed(Duration),
}

/// Retry budget: `retries` additional attempts after the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn new(retries: u32, backoff: Backoff) -> Self {
        Self { retries, backoff }
    }

    /// Retries with no delay between attempts.
    pub const fn immediate(retries: u32) -> Self {
        Self::new(retries, Backoff::None)
    }

    /// Total attempts including the first.
    pub const fn max_attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts()
    }

    /// Delay to wait before attempt number `attempts_made + 1`.
    pub fn delay_before(&self, attempts_made: u32) -> Duration {
        if attempts_made == 0 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
        }
    }
}
