use std::thread;
use std::time::Duration;

use forge_core::model::event::Event;
use forge_core::model::tier::Tier;
use forge_core::planner::{Action, Plan, Planner};
use forge_core::transcript::{ENHANCE_COMMAND, SELL_COMMAND, parse_latest_state};
use tracing::{Level, event};

use crate::record::{EnhanceRecord, FinishReason, RecordSink, SellRecord, SessionRecord};
use crate::signal::StopSignal;
use crate::surface::ChatSurface;
use crate::waiter::{GoldOutcome, OutcomeWaiter, WaitConfig, WaitOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Required probability of reaching the chosen target with current gold.
    pub confidence: f64,
    pub enhance_command: String,
    pub sell_command: String,
    /// Settle time after typing a command before polling starts.
    pub after_command: Duration,
    /// Pause before waiting again after a "still enhancing" notice.
    pub waiting_retry: Duration,
    /// Pause between loop iterations.
    pub loop_gap: Duration,
    pub init_attempts: u32,
    pub init_retry: Duration,
    pub max_actions: Option<u64>,
    pub wait: WaitConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence: 0.90,
            enhance_command: ENHANCE_COMMAND.to_string(),
            sell_command: SELL_COMMAND.to_string(),
            after_command: Duration::from_millis(30),
            waiting_retry: Duration::from_millis(600),
            loop_gap: Duration::from_millis(30),
            init_attempts: 12,
            init_retry: Duration::from_millis(250),
            max_actions: None,
            wait: WaitConfig::default(),
        }
    }
}

/// How a session ended and what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub reason: FinishReason,
    pub gold: u64,
    pub tier: Tier,
    pub enhances: u64,
    pub sells: u64,
    /// Commands the surface refused to deliver.
    pub undelivered: u64,
}

impl SessionSummary {
    /// Commands issued, delivered or not; this is what the action limit counts.
    pub fn actions(&self) -> u64 {
        self.enhances + self.sells + self.undelivered
    }
}

enum Step {
    Continue,
    Finish(FinishReason),
}

/// The enhance/sell control loop.
pub struct Orchestrator {
    planner: Planner,
    config: OrchestratorConfig,
    stop: StopSignal,
    waiter: OutcomeWaiter,
    gold: u64,
    tier: Tier,
    observed: bool,
    enhances: u64,
    sells: u64,
    undelivered: u64,
}

impl Orchestrator {
    pub fn new(planner: Planner, config: OrchestratorConfig, stop: StopSignal) -> Self {
        let waiter = OutcomeWaiter::new(config.wait.clone(), stop.clone());
        Self {
            planner,
            config,
            stop,
            waiter,
            gold: 0,
            tier: Tier::ZERO,
            observed: false,
            enhances: 0,
            sells: 0,
            undelivered: 0,
        }
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Run until stopped, out of gold, at `+20`, or out of actions.
    pub fn run(
        &mut self,
        surface: &mut dyn ChatSurface,
        sink: &mut dyn RecordSink,
    ) -> SessionSummary {
        let reason = match self.read_initial_state(surface) {
            Some(reason) => reason,
            None => {
                sink.record(&SessionRecord::Init {
                    gold: self.gold,
                    tier: self.tier,
                    confidence: self.config.confidence,
                });
                self.drive(surface, sink)
            }
        };

        event!(
            target: "forge_bot::orchestrator",
            Level::INFO,
            reason = %reason,
            gold = self.gold,
            tier = %self.tier,
            enhances = self.enhances,
            sells = self.sells,
            undelivered = self.undelivered,
            "session finished"
        );
        sink.record(&SessionRecord::Finish {
            reason,
            gold: self.gold,
            tier: self.tier,
        });

        SessionSummary {
            reason,
            gold: self.gold,
            tier: self.tier,
            enhances: self.enhances,
            sells: self.sells,
            undelivered: self.undelivered,
        }
    }

    fn read_initial_state(&mut self, surface: &mut dyn ChatSurface) -> Option<FinishReason> {
        for attempt in 0..self.config.init_attempts {
            if self.stop.is_raised() {
                return Some(FinishReason::Stopped);
            }
            let parsed = match surface.read_transcript() {
                Ok(text) => parse_latest_state(&text, Tier::ZERO),
                Err(err) => {
                    event!(
                        target: "forge_bot::orchestrator",
                        Level::WARN,
                        error = %err,
                        attempt,
                        "transcript read failed"
                    );
                    None
                }
            };
            if let Some(state) = parsed {
                self.gold = state.gold();
                self.tier = state.tier();
                self.observed = true;
                event!(
                    target: "forge_bot::orchestrator",
                    Level::INFO,
                    gold = self.gold,
                    tier = %self.tier,
                    attempt,
                    "initial state"
                );
                return None;
            }
            thread::sleep(self.config.init_retry);
        }

        event!(
            target: "forge_bot::orchestrator",
            Level::WARN,
            attempts = self.config.init_attempts,
            "no balance visible in chat; starting from zero"
        );
        None
    }

    fn drive(&mut self, surface: &mut dyn ChatSurface, sink: &mut dyn RecordSink) -> FinishReason {
        loop {
            if self.stop.is_raised() {
                return FinishReason::Stopped;
            }
            if self.tier.is_max() {
                return FinishReason::MaxTier;
            }
            if self
                .config
                .max_actions
                .is_some_and(|limit| self.enhances + self.sells + self.undelivered >= limit)
            {
                return FinishReason::ActionLimit;
            }
            if self.is_bankrupt() {
                return FinishReason::Bankrupt;
            }

            let plan = self
                .planner
                .decide(self.gold, self.tier, self.config.confidence);
            event!(
                target: "forge_bot::orchestrator",
                Level::INFO,
                gold = self.gold,
                tier = %self.tier,
                target = %plan.target,
                action = %plan.action,
                confidence = plan.confidence,
                "decision"
            );

            let command = match plan.action {
                Action::Enhance => self.config.enhance_command.clone(),
                Action::Sell => self.config.sell_command.clone(),
            };
            if let Err(err) = surface.issue_command(&command) {
                event!(
                    target: "forge_bot::orchestrator",
                    Level::WARN,
                    error = %err,
                    command = %command,
                    "command delivery failed"
                );
                self.undelivered += 1;
                thread::sleep(self.config.loop_gap);
                continue;
            }
            thread::sleep(self.config.after_command);

            let step = match plan.action {
                Action::Enhance => self.settle_enhance(surface, sink, &plan),
                Action::Sell => self.settle_sell(surface, sink, &plan),
            };
            if let Step::Finish(reason) = step {
                return reason;
            }

            thread::sleep(self.config.loop_gap);
        }
    }

    fn settle_enhance(
        &mut self,
        surface: &mut dyn ChatSurface,
        sink: &mut dyn RecordSink,
        plan: &Plan,
    ) -> Step {
        let gold_before = self.gold;
        let tier_before = self.tier;
        self.enhances += 1;

        let mut outcome = self
            .waiter
            .wait_for_enhance_outcome(surface, gold_before, tier_before);
        if outcome.state().map(|s| s.event()) == Some(Event::Waiting) {
            sink.record(&SessionRecord::Waiting {
                before_tier: tier_before,
            });
            thread::sleep(self.config.waiting_retry);
            outcome = self
                .waiter
                .wait_for_enhance_outcome(surface, gold_before, tier_before);
        }

        let (state, timed_out) = match outcome {
            WaitOutcome::Resolved(state) => (state, false),
            WaitOutcome::TimedOut(state) => (state, true),
            WaitOutcome::Cancelled => return Step::Finish(FinishReason::Stopped),
        };

        let spent = if state.spent_gold() > 0 {
            state.spent_gold()
        } else {
            gold_before.saturating_sub(state.gold())
        };
        let after_tier = if state.event() == Event::Destroy {
            Tier::ZERO
        } else {
            state.tier()
        };

        sink.record(&SessionRecord::Enhance(EnhanceRecord {
            before_tier: tier_before,
            after_tier,
            event: state.event(),
            spent,
            gold_before,
            gold_after: state.gold(),
            target_tier: plan.target,
            spent_parsed: state.spent_gold(),
            timed_out,
        }));

        self.gold = state.gold();
        self.tier = after_tier;
        self.observed = true;

        if self.tier.is_max() {
            Step::Finish(FinishReason::MaxTier)
        } else {
            Step::Continue
        }
    }

    fn settle_sell(
        &mut self,
        surface: &mut dyn ChatSurface,
        sink: &mut dyn RecordSink,
        plan: &Plan,
    ) -> Step {
        let gold_before = self.gold;
        let tier_before = self.tier;
        self.sells += 1;

        let (gold_after, timed_out) =
            match self
                .waiter
                .wait_for_gold_change(surface, gold_before, Tier::ZERO)
            {
                GoldOutcome::Changed(gold) => (gold, false),
                GoldOutcome::Unchanged(gold) => (gold, true),
                GoldOutcome::Cancelled => return Step::Finish(FinishReason::Stopped),
            };

        event!(
            target: "forge_bot::orchestrator",
            Level::DEBUG,
            expected = self.planner.expected_sell_value(tier_before),
            received = gold_after.saturating_sub(gold_before),
            tier = %tier_before,
            "sell settled"
        );
        sink.record(&SessionRecord::Sell(SellRecord {
            before_tier: tier_before,
            gold_before,
            gold_after,
            earned: gold_after.saturating_sub(gold_before),
            target_tier: plan.target,
            timed_out,
        }));

        self.gold = gold_after;
        self.tier = Tier::ZERO;
        Step::Continue
    }

    fn is_bankrupt(&self) -> bool {
        self.observed
            && self.tier == Tier::ZERO
            && self
                .planner
                .table()
                .cost(Tier::ZERO)
                .is_some_and(|cost| cost > self.gold)
    }
}
