//! Watch loop: repeated sweeps, publication, and cooperative close
//!
//! Subscribing only registers a callback; the loop begins at `start()`.
//! Every cycle runs the poll strategy once, publishes its items (or its
//! error) to subscribers in registration order, and sleeps for the poll
//! interval. A failed cycle is reported and the loop carries on: only
//! `close()` ends it. The close flag is checked before every page, every
//! cycle, and every emitted event.

use std::sync::Arc;
use std::time::Duration;

use listing_client::{Item, PageSource};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::error::{Error, Result, SweepError};
use crate::fetcher::Fetcher;
use crate::signal::CloseSignal;
use crate::state::{WatcherAction, WatcherEvent, WatcherState, handle_event};
use crate::strategy::PollStrategy;
use crate::target::{FeedTarget, poll_interval};

/// Name of the error event.
pub const ERROR_EVENT: &str = "error";

/// Payload delivered to subscribers.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Item(Item),
    Error(Arc<SweepError>),
}

type Handler = Box<dyn Fn(&WatchEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Item,
    Error,
}

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub cycles: u64,
    pub items: u64,
    pub errors: u64,
}

pub struct Watcher {
    name: String,
    path: String,
    item_event: String,
    strategy: Box<dyn PollStrategy>,
    fetcher: Fetcher,
    interval: Duration,
    close: Arc<CloseSignal>,
    handlers: Vec<(Channel, Handler)>,
}

impl Watcher {
    /// Watcher for `target`, paced by a requests-per-minute budget.
    pub fn new(source: Arc<dyn PageSource>, target: &FeedTarget, requests_per_minute: u32) -> Self {
        Self::with_strategy(
            source,
            target.to_string(),
            target.path(),
            target.item_event(),
            target.strategy(),
            poll_interval(requests_per_minute),
        )
    }

    pub fn with_strategy(
        source: Arc<dyn PageSource>,
        name: impl Into<String>,
        path: impl Into<String>,
        item_event: impl Into<String>,
        strategy: Box<dyn PollStrategy>,
        interval: Duration,
    ) -> Self {
        let close = Arc::new(CloseSignal::new());
        Self {
            name: name.into(),
            path: path.into(),
            item_event: item_event.into(),
            strategy,
            fetcher: Fetcher::new(source, interval, close.clone()),
            interval,
            close,
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn item_event(&self) -> &str {
        &self.item_event
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Register `handler` for `event`: the item event name or `"error"`.
    pub fn on<F>(&mut self, event: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&WatchEvent) + Send + 'static,
    {
        let channel = if event == self.item_event {
            Channel::Item
        } else if event == ERROR_EVENT {
            Channel::Error
        } else {
            return Err(Error::UnknownEvent {
                event: event.to_string(),
                expected: self.item_event.clone(),
            });
        };
        self.handlers.push((channel, Box::new(handler)));
        Ok(self)
    }

    /// Close capability usable before `start()` (e.g. from a handler).
    pub fn close_signal(&self) -> Arc<CloseSignal> {
        self.close.clone()
    }

    /// Spawn the watch loop on the current runtime.
    pub fn start(self) -> WatcherHandle {
        let name = self.name.clone();
        let close = self.close.clone();
        let task = tokio::spawn(self.run());
        WatcherHandle { name, close, task }
    }

    async fn run(mut self) -> WatcherStats {
        let mut stats = WatcherStats::default();
        let mut state = WatcherState::new();
        let mut event = WatcherEvent::Start;

        info!(
            watcher = %self.name,
            source = self.fetcher.source_id(),
            strategy = self.strategy.kind(),
            interval_ms = self.interval.as_millis() as u64,
            "watcher started"
        );

        loop {
            if self.close.is_closed() {
                event = WatcherEvent::Close;
            }
            let (next, action) = handle_event(state, event, self.interval);
            state = next;

            event = match action {
                WatcherAction::Sweep { cycle } => {
                    debug!(watcher = %self.name, cycle, "poll cycle");
                    let outcome = self.strategy.poll(&self.fetcher, &self.path).await;
                    let (emitted, failed) = self.publish(outcome);
                    stats.cycles = cycle;
                    stats.items += emitted as u64;
                    stats.errors += u64::from(failed);
                    WatcherEvent::SweepFinished { emitted, failed }
                }
                WatcherAction::ScheduleNext { delay } => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.close.closed() => {}
                    }
                    WatcherEvent::TimerFired
                }
                WatcherAction::Stop => break,
                WatcherAction::None => {
                    warn!(watcher = %self.name, state = ?state, "unexpected watcher transition");
                    WatcherEvent::Close
                }
            };
        }

        info!(
            watcher = %self.name,
            cycles = stats.cycles,
            items = stats.items,
            errors = stats.errors,
            "watcher closed"
        );
        stats
    }

    /// Deliver one cycle's result. Returns (items emitted, cycle failed).
    fn publish(&self, outcome: std::result::Result<Vec<Item>, SweepError>) -> (usize, bool) {
        match outcome {
            Ok(items) => {
                let mut emitted = 0;
                for item in items {
                    if self.close.is_closed() {
                        break;
                    }
                    self.dispatch(Channel::Item, &WatchEvent::Item(item));
                    emitted += 1;
                }
                (emitted, false)
            }
            Err(err) => {
                warn!(
                    watcher = %self.name,
                    kind = err.kind(),
                    partial = err.partial().len(),
                    error = %err,
                    "poll cycle failed"
                );
                if !self.close.is_closed() {
                    self.dispatch(Channel::Error, &WatchEvent::Error(Arc::new(err)));
                }
                (0, true)
            }
        }
    }

    fn dispatch(&self, channel: Channel, event: &WatchEvent) {
        for (_, handler) in self.handlers.iter().filter(|(c, _)| *c == channel) {
            handler(event);
        }
    }
}

/// Running watcher.
pub struct WatcherHandle {
    name: String,
    close: Arc<CloseSignal>,
    task: JoinHandle<WatcherStats>,
}

impl WatcherHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop scheduling further pages and cycles. In-flight requests finish.
    pub fn close(&self) {
        self.close.close();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    pub async fn join(self) -> std::result::Result<WatcherStats, JoinError> {
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSource, failure, page};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn record_items(watcher: &mut Watcher, event: &str) -> Log {
        let log: Log = Arc::default();
        let sink = log.clone();
        watcher
            .on(event, move |event| {
                if let WatchEvent::Item(item) = event {
                    sink.lock().unwrap().push(item.name.clone());
                }
            })
            .unwrap();
        log
    }

    fn record_errors(watcher: &mut Watcher) -> Log {
        let log: Log = Arc::default();
        let sink = log.clone();
        watcher
            .on(ERROR_EVENT, move |event| {
                if let WatchEvent::Error(err) = event {
                    sink.lock().unwrap().push(err.kind().to_string());
                }
            })
            .unwrap();
        log
    }

    fn snapshot(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn listing_watcher_emits_only_unseen_items() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&["a", "b", "c"])),
            Ok(page(&["b", "c", "d"])),
        ]));
        let target = FeedTarget::listing(Some("rust"), "hot", 3).unwrap();
        let mut watcher = Watcher::new(source.clone(), &target, 10);
        let items = record_items(&mut watcher, "item");

        let handle = watcher.start();
        tokio::time::sleep(Duration::from_secs(7)).await;
        handle.close();
        let stats = handle.join().await.unwrap();

        assert_eq!(snapshot(&items), vec!["a", "b", "c", "d"]);
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.items, 4);
        assert_eq!(source.calls()[0].0, "r/rust/hot.json");
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_published_and_loop_continues() {
        let source = Arc::new(ScriptedSource::new(vec![
            failure(),
            failure(),
            failure(),
            failure(),
            Ok(page(&["b", "a"])),
            Ok(page(&["c", "b", "a"])),
        ]));
        let target = FeedTarget::comments("rust");
        let mut watcher = Watcher::new(source.clone(), &target, 10);
        let items = record_items(&mut watcher, "comment");
        let errors = record_errors(&mut watcher);

        let handle = watcher.start();
        // Failing cycle with retries ends at 18s, probe at 24s, delta at 30s
        tokio::time::sleep(Duration::from_secs(33)).await;
        handle.close();
        let stats = handle.join().await.unwrap();

        assert_eq!(snapshot(&errors), vec!["page_fetch"]);
        assert_eq!(snapshot(&items), vec!["c"]);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn close_from_handler_stops_remaining_items() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page(&["a", "b", "c"]))]));
        let target = FeedTarget::listing(None, "new", 3).unwrap();
        let mut watcher = Watcher::new(source.clone(), &target, 10);
        let close = watcher.close_signal();
        let log: Log = Arc::default();
        let sink = log.clone();
        watcher
            .on("item", move |event| {
                if let WatchEvent::Item(item) = event {
                    sink.lock().unwrap().push(item.name.clone());
                    close.close();
                }
            })
            .unwrap();

        let handle = watcher.start();
        let stats = handle.join().await.unwrap();

        assert_eq!(snapshot(&log), vec!["a"]);
        assert_eq!(stats.items, 1);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_before_start_fetches_nothing() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page(&["a"]))]));
        let watcher = Watcher::new(source.clone(), &FeedTarget::posts("rust"), 10);
        watcher.close_signal().close();

        let handle = watcher.start();
        assert!(handle.is_closed());
        let stats = handle.join().await.unwrap();

        assert_eq!(stats, WatcherStats::default());
        assert!(source.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handlers_run_in_registration_order() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page(&["a"]))]));
        let target = FeedTarget::listing(None, "hot", 1).unwrap();
        let mut watcher = Watcher::new(source, &target, 10);
        let log: Log = Arc::default();
        for label in ["first", "second"] {
            let sink = log.clone();
            watcher
                .on("item", move |event| {
                    if let WatchEvent::Item(item) = event {
                        sink.lock().unwrap().push(format!("{label}:{}", item.name));
                    }
                })
                .unwrap();
        }

        let handle = watcher.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.close();
        handle.join().await.unwrap();

        assert_eq!(snapshot(&log), vec!["first:a", "second:a"]);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let source = Arc::new(ScriptedSource::default());
        let mut watcher = Watcher::new(source, &FeedTarget::comments("rust"), 10);

        let err = watcher.on("post", |_| {}).err().unwrap();
        assert!(matches!(err, Error::UnknownEvent { ref event, .. } if event == "post"));
        assert!(watcher.on("comment", |_| {}).is_ok());
        assert!(watcher.on(ERROR_EVENT, |_| {}).is_ok());
    }
}
