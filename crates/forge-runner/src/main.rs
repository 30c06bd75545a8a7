use std::path::PathBuf;

use clap::Parser;

use forge_runner::config::{ResolvedOutputs, RunnerConfig};
use forge_runner::logging::init_logging;
use forge_runner::session::SessionRunner;

/// Enhance-and-sell automation for the chat weapon game.
#[derive(Debug, Parser)]
#[command(
    name = "forge-runner",
    author,
    version,
    about = "Plans and drives enhance/sell sessions through the game chat"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "configs/forge.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the required probability of reaching the target tier.
    #[arg(long, value_name = "P")]
    confidence: Option<f64>,

    /// Stop after this many enhance and sell commands.
    #[arg(long, value_name = "COUNT")]
    max_actions: Option<u64>,

    /// Override the simulated game's RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Exit after validating the configuration (no session is run).
    #[arg(long)]
    validate_only: bool,

    /// Print the target table for a gold budget and exit.
    #[arg(long, value_name = "GOLD")]
    plan: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = RunnerConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(confidence) = cli.confidence {
        config.planning.confidence = confidence;
    }

    if let Some(max_actions) = cli.max_actions {
        config.limits.max_actions = Some(max_actions);
    }

    if let Some(seed) = cli.seed {
        config.surface.seed = Some(seed);
    }

    config.validate()?;

    if let Some(budget) = cli.plan {
        print_plan(&config, budget)?;
        return Ok(());
    }

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();

    println!(
        "Loaded configuration '{run_id}' ({:?} surface, confidence {:.2})",
        config.surface.kind, config.planning.confidence
    );

    let _logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let runner = SessionRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: session skipped.");
        return Ok(());
    }

    println!("Press Enter to stop.");
    let summary = runner.run()?;
    println!(
        "Session '{run_id}' finished ({}): {} enhances, {} sells, gold {} at {}",
        summary.reason, summary.enhances, summary.sells, summary.gold, summary.tier
    );
    println!("Event log: {}", summary.outputs.events_path.display());
    println!("Summary (JSON): {}", summary.outputs.json_path.display());
    println!(
        "Summary (Markdown): {}",
        summary.outputs.markdown_path.display()
    );
    let overall = &summary.outputs.summary.overall;
    if let Some(rate) = overall.success_rate {
        println!(
            "  {} attempts, success rate {:.1}%, net {}G",
            overall.counts.attempts,
            rate * 100.0,
            overall.net
        );
    }

    Ok(())
}

fn print_plan(config: &RunnerConfig, budget: u64) -> anyhow::Result<()> {
    let planner = config.planner()?;
    let confidence = config.planning.confidence;
    let best = planner.best_target_tier(budget, confidence);

    println!("Budget {budget}G, confidence {confidence:.2}: target {best}");
    println!("{:>6} {:>10} {:>16} {:>10}", "target", "reach", "run cost", "P(budget)");
    for row in planner.outlook(budget) {
        let marker = if row.target == best { " <" } else { "" };
        println!(
            "{:>6} {:>10.6} {:>16.1} {:>10.4}{marker}",
            row.target.to_string(),
            row.reach,
            row.run_cost,
            row.probability
        );
    }
    Ok(())
}
