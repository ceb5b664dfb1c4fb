//! Watcher state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! The watch loop in `watcher.rs` executes the I/O implied by each action.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherState {
    /// Waiting to start or between cycles
    Idle { cycles: u64 },
    /// A sweep for cycle `cycle` is in progress
    Polling { cycle: u64 },
    /// Terminal state
    Closed,
}

impl WatcherState {
    pub fn new() -> Self {
        WatcherState::Idle { cycles: 0 }
    }
}

impl Default for WatcherState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// `start()` called
    Start,
    /// Sweep ended and its results were published
    SweepFinished { emitted: usize, failed: bool },
    /// Poll interval elapsed
    TimerFired,
    /// `close()` called
    Close,
}

/// Actions the watch loop should execute after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherAction {
    /// Run the poll strategy once
    Sweep { cycle: u64 },
    /// Sleep, then deliver `TimerFired`
    ScheduleNext { delay: Duration },
    /// Leave the loop
    Stop,
    /// No-op
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(
    state: WatcherState,
    event: WatcherEvent,
    interval: Duration,
) -> (WatcherState, WatcherAction) {
    match (state, event) {
        (WatcherState::Closed, _) => (WatcherState::Closed, WatcherAction::Stop),

        (_, WatcherEvent::Close) => (WatcherState::Closed, WatcherAction::Stop),

        (WatcherState::Idle { cycles: 0 }, WatcherEvent::Start) => (
            WatcherState::Polling { cycle: 1 },
            WatcherAction::Sweep { cycle: 1 },
        ),

        (WatcherState::Idle { cycles }, WatcherEvent::TimerFired) => (
            WatcherState::Polling { cycle: cycles + 1 },
            WatcherAction::Sweep { cycle: cycles + 1 },
        ),

        (WatcherState::Polling { cycle }, WatcherEvent::SweepFinished { .. }) => (
            WatcherState::Idle { cycles: cycle },
            WatcherAction::ScheduleNext { delay: interval },
        ),

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, WatcherAction::None),
    }
}
