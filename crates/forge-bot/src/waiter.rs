//! Polling the chat until a command's result shows up.
//!
//! Both waits re-read the whole transcript every `poll_interval`, check the
//! stop signal first on every iteration, and give up on a best-effort value
//! once their deadline passes. Deadlines are wall-clock and approximate: a
//! slow read can overshoot them by its own latency.

use std::thread;
use std::time::{Duration, Instant};

use forge_core::model::event::Event;
use forge_core::model::state::State;
use forge_core::model::tier::Tier;
use forge_core::transcript::{ENHANCE_COMMAND, command_result_not_ready, parse_latest_state};
use tracing::{Level, event};

use crate::signal::StopSignal;
use crate::surface::ChatSurface;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(180);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15);
pub const DEFAULT_SELL_MAX_WAIT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    pub poll_interval: Duration,
    /// Deadline for an enhance result.
    pub max_wait: Duration,
    /// Deadline for the balance to move after a sell.
    pub sell_max_wait: Duration,
    /// Command text whose last occurrence marks where a pending result starts.
    pub enhance_command: String,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            sell_max_wait: DEFAULT_SELL_MAX_WAIT,
            enhance_command: ENHANCE_COMMAND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A fresh result was observed.
    Resolved(State),
    /// The deadline passed; this is the best reading available.
    TimedOut(State),
    Cancelled,
}

impl WaitOutcome {
    pub fn state(&self) -> Option<State> {
        match self {
            WaitOutcome::Resolved(state) | WaitOutcome::TimedOut(state) => Some(*state),
            WaitOutcome::Cancelled => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldOutcome {
    Changed(u64),
    /// Deadline passed with the balance still at the old value.
    Unchanged(u64),
    Cancelled,
}

impl GoldOutcome {
    pub fn gold(&self) -> Option<u64> {
        match self {
            GoldOutcome::Changed(gold) | GoldOutcome::Unchanged(gold) => Some(*gold),
            GoldOutcome::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutcomeWaiter {
    config: WaitConfig,
    stop: StopSignal,
}

impl OutcomeWaiter {
    pub fn new(config: WaitConfig, stop: StopSignal) -> Self {
        Self { config, stop }
    }

    /// Wait for the result of the enhance command just issued.
    ///
    /// `prev_gold`/`prev_tier` are the values before the command; they serve
    /// as the fallback tier and as the baseline for spotting an unclassified
    /// but changed reading.
    pub fn wait_for_enhance_outcome(
        &self,
        surface: &mut dyn ChatSurface,
        prev_gold: u64,
        prev_tier: Tier,
    ) -> WaitOutcome {
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            if self.stop.is_raised() {
                return WaitOutcome::Cancelled;
            }
            polls += 1;

            let overdue = start.elapsed() > self.config.max_wait;
            let Some(text) = self.read(surface) else {
                if overdue {
                    let state = State::new(prev_gold, prev_tier, Event::Unknown, 0);
                    self.log_timeout(&state, polls, "transcript unreadable");
                    return WaitOutcome::TimedOut(state);
                }
                self.pause();
                continue;
            };

            if command_result_not_ready(&text, &self.config.enhance_command) {
                if overdue && let Some(state) = parse_latest_state(&text, prev_tier) {
                    self.log_timeout(&state, polls, "result never posted");
                    return WaitOutcome::TimedOut(state);
                }
                self.pause();
                continue;
            }

            let Some(state) = parse_latest_state(&text, prev_tier) else {
                event!(
                    target: "forge_bot::waiter",
                    Level::DEBUG,
                    polls,
                    "no gold figure in transcript"
                );
                self.pause();
                continue;
            };

            if state.event() != Event::Unknown || state.differs_from(prev_gold, prev_tier) {
                event!(
                    target: "forge_bot::waiter",
                    Level::DEBUG,
                    polls,
                    event = %state.event(),
                    gold = state.gold(),
                    tier = %state.tier(),
                    "enhance outcome resolved"
                );
                return WaitOutcome::Resolved(state);
            }

            if overdue {
                self.log_timeout(&state, polls, "outcome still unclassified");
                return WaitOutcome::TimedOut(state);
            }

            self.pause();
        }
    }

    /// Wait for the balance to move away from `old_gold` after a sell.
    pub fn wait_for_gold_change(
        &self,
        surface: &mut dyn ChatSurface,
        old_gold: u64,
        fallback_tier: Tier,
    ) -> GoldOutcome {
        let start = Instant::now();

        loop {
            if self.stop.is_raised() {
                return GoldOutcome::Cancelled;
            }

            if let Some(state) = self
                .read(surface)
                .and_then(|text| parse_latest_state(&text, fallback_tier))
                && state.gold() != old_gold
            {
                return GoldOutcome::Changed(state.gold());
            }

            if start.elapsed() > self.config.sell_max_wait {
                event!(
                    target: "forge_bot::waiter",
                    Level::WARN,
                    old_gold,
                    "gold did not change before deadline"
                );
                return GoldOutcome::Unchanged(old_gold);
            }

            self.pause();
        }
    }

    fn read(&self, surface: &mut dyn ChatSurface) -> Option<String> {
        match surface.read_transcript() {
            Ok(text) => Some(text),
            Err(err) => {
                event!(
                    target: "forge_bot::waiter",
                    Level::WARN,
                    error = %err,
                    "transcript read failed"
                );
                None
            }
        }
    }

    fn log_timeout(&self, state: &State, polls: u32, reason: &str) {
        event!(
            target: "forge_bot::waiter",
            Level::WARN,
            polls,
            reason,
            event = %state.event(),
            gold = state.gold(),
            tier = %state.tier(),
            "enhance wait timed out; using best-effort reading"
        );
    }

    fn pause(&self) {
        thread::sleep(self.config.poll_interval);
    }
}
