use std::io::{self, BufRead};
use std::thread;

use forge_bot::{FinishReason, Orchestrator, StopSignal};
use forge_core::model::tier::Tier;
use forge_core::planner::Planner;
use thiserror::Error;
use tracing::{Level, event};

use crate::config::{ResolvedOutputs, RunnerConfig, ValidationError};
use crate::stats::{RunStatistics, StatsError, StatsOutputs};
use crate::surface::SurfaceBlueprint;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
    #[error("statistics output failed: {0}")]
    Stats(#[from] StatsError),
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub reason: FinishReason,
    pub gold: u64,
    pub tier: Tier,
    pub enhances: u64,
    pub sells: u64,
    pub outputs: StatsOutputs,
}

/// Wires configuration, surface, orchestrator and statistics into one session.
pub struct SessionRunner {
    config: RunnerConfig,
    outputs: ResolvedOutputs,
    planner: Planner,
    blueprint: SurfaceBlueprint,
}

impl SessionRunner {
    pub fn new(config: RunnerConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let planner = config.planner()?;
        let blueprint = SurfaceBlueprint::from_config(&config.surface, &config.commands)?;
        Ok(Self {
            config,
            outputs,
            planner,
            blueprint,
        })
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Run with a stop signal raised by pressing Enter on stdin.
    pub fn run(self) -> Result<RunSummary, RunnerError> {
        let stop = StopSignal::new();
        spawn_stdin_watcher(stop.clone());
        self.run_with_stop(stop)
    }

    pub fn run_with_stop(self, stop: StopSignal) -> Result<RunSummary, RunnerError> {
        let mut stats =
            RunStatistics::create(&self.config.run_id, &self.outputs, &self.config.stats)?;
        let mut surface = self.blueprint.build(self.planner.table());

        event!(
            target: "forge_runner::session",
            Level::INFO,
            run_id = %self.config.run_id,
            surface = ?self.blueprint.kind(),
            confidence = self.config.planning.confidence,
            max_actions = ?self.config.limits.max_actions,
            "session starting"
        );

        let mut orchestrator =
            Orchestrator::new(self.planner, self.config.orchestrator_config(), stop);
        let session = orchestrator.run(surface.as_mut(), &mut stats);
        let outputs = stats.finish()?;

        Ok(RunSummary {
            run_id: self.config.run_id,
            reason: session.reason,
            gold: session.gold,
            tier: session.tier,
            enhances: session.enhances,
            sells: session.sells,
            outputs,
        })
    }
}

/// Raise `stop` when a line arrives on stdin. A closed stdin never stops the run.
pub fn spawn_stdin_watcher(stop: StopSignal) {
    let spawned = thread::Builder::new()
        .name("stop-watcher".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => {}
                Ok(_) => {
                    event!(
                        target: "forge_runner::session",
                        Level::INFO,
                        "stop requested from terminal"
                    );
                    stop.raise();
                }
            }
        });
    if let Err(err) = spawned {
        event!(
            target: "forge_runner::session",
            Level::WARN,
            error = %err,
            "could not start stop watcher; session can only end on its own"
        );
    }
}
