//! Outbound request spacing
//!
//! A single watermark records when the most recent request was (or will be)
//! released. A new request runs at `max(now, watermark + spacing)` and moves
//! the watermark to that instant, so a burst of calls issued together is
//! released as a strictly periodic sequence instead of all at once when the
//! first gap elapses.
//!
//! Requests carrying an explicit delay (server backoff hints) bypass the
//! watermark entirely and neither read nor advance it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Scheduling priority. Accepted for future reordering; currently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Enforces a minimum spacing between released requests.
#[derive(Debug)]
pub struct Scheduler {
    spacing: Duration,
    watermark: Mutex<Option<Instant>>,
}

impl Scheduler {
    /// Spacing is `60s / requests_per_minute`. Zero is treated as one.
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_spacing(Duration::from_secs(60) / requests_per_minute.max(1))
    }

    pub fn with_spacing(spacing: Duration) -> Self {
        Self {
            spacing,
            watermark: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Claim the next release slot and return the instant it opens.
    pub async fn reserve(&self, priority: Priority, explicit_delay: Option<Duration>) -> Instant {
        let now = Instant::now();
        if let Some(delay) = explicit_delay {
            trace!(?priority, delay_ms = delay.as_millis() as u64, "explicit delay");
            return now + delay;
        }

        let mut watermark = self.watermark.lock().await;
        let release = match *watermark {
            Some(last) if now < last + self.spacing => last + self.spacing,
            _ => now,
        };
        *watermark = Some(release);

        if release > now {
            trace!(
                ?priority,
                wait_ms = (release - now).as_millis() as u64,
                "throttling request"
            );
        }
        release
    }

    /// Run `action` once its release slot opens.
    pub async fn schedule<F, T>(
        &self,
        action: F,
        priority: Priority,
        explicit_delay: Option<Duration>,
    ) -> T
    where
        F: Future<Output = T>,
    {
        let release = self.reserve(priority, explicit_delay).await;
        if release > Instant::now() {
            tokio::time::sleep_until(release).await;
        }
        action.await
    }
}
