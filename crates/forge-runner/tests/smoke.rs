use std::fs;

use forge_bot::{FinishReason, StopSignal};
use forge_runner::config::RunnerConfig;
use forge_runner::session::SessionRunner;
use forge_runner::stats::read_event_log;
use tempfile::tempdir;

fn load_config(output_dir: &std::path::Path, max_actions: u64) -> RunnerConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
planning:
  confidence: 0.9
timing:
  poll_interval_ms: 1
  max_wait_ms: 2000
  sell_max_wait_ms: 2000
  after_command_ms: 0
  waiting_retry_ms: 0
  loop_gap_ms: 0
  init_attempts: 3
  init_retry_ms: 1
surface:
  kind: "simulated"
  seed: 4242
  params:
    starting_gold: 100000
    result_delay_reads: 1
outputs:
  events_jsonl: "{events}"
  summary_json: "{summary}"
stats:
  flush_every_n: 5
limits:
  max_actions: {max_actions}
logging:
  enable_structured: false
"#,
        events = output_dir.join("{run_id}/enhance_log.jsonl").display(),
        summary = output_dir.join("{run_id}/enhance_summary.json").display(),
    );

    let mut cfg: RunnerConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

fn run(output_dir: &std::path::Path, stop: StopSignal) -> forge_runner::session::RunSummary {
    let config = load_config(output_dir, 40);
    let outputs = config.resolved_outputs();
    let runner = SessionRunner::new(config, outputs).expect("runner created");
    runner.run_with_stop(stop).expect("session completes")
}

fn outcome_trace(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|value| {
            format!(
                "{}:{}:{}:{}",
                value["type"], value["event"], value["after_tier"], value["gold_after"]
            )
        })
        .collect()
}

#[test]
fn simulated_session_runs_to_action_limit() {
    let dir = tempdir().expect("temp dir");
    let summary = run(dir.path(), StopSignal::new());

    assert_eq!(summary.reason, FinishReason::ActionLimit);
    assert_eq!(summary.enhances + summary.sells, 40);
    assert!(summary.outputs.events_path.ends_with("test_smoke/enhance_log.jsonl"));

    let events = read_event_log(&summary.outputs.events_path).expect("event log readable");
    assert_eq!(events[0]["type"], "init");
    assert_eq!(events[events.len() - 1]["type"], "finish");
    assert_eq!(events[0]["gold"], 100_000);
    assert!(events.iter().all(|e| e["ts"].is_f64()));

    let enhances = events.iter().filter(|e| e["type"] == "enhance").count() as u64;
    assert_eq!(enhances, summary.enhances);
    assert_eq!(summary.outputs.summary.overall.counts.attempts, summary.enhances);
    assert_eq!(summary.outputs.summary.overall.counts.timed_out, 0);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary.outputs.json_path).unwrap()).unwrap();
    assert_eq!(json["finish"], "action_limit");
    assert_eq!(json["current_gold"], summary.gold);

    let markdown = fs::read_to_string(&summary.outputs.markdown_path).expect("markdown");
    assert!(markdown.contains("## Per Tier"));
}

#[test]
fn same_seed_replays_same_session() {
    let first = tempdir().expect("temp dir");
    let second = tempdir().expect("temp dir");
    let a = run(first.path(), StopSignal::new());
    let b = run(second.path(), StopSignal::new());

    let trace_a = outcome_trace(&read_event_log(&a.outputs.events_path).unwrap());
    let trace_b = outcome_trace(&read_event_log(&b.outputs.events_path).unwrap());
    assert_eq!(trace_a, trace_b);
    assert_eq!(a.gold, b.gold);
}

#[test]
fn raised_stop_finishes_without_commands() {
    let dir = tempdir().expect("temp dir");
    let stop = StopSignal::new();
    stop.raise();
    let summary = run(dir.path(), stop);

    assert_eq!(summary.reason, FinishReason::Stopped);
    assert_eq!(summary.enhances + summary.sells, 0);
    let events = read_event_log(&summary.outputs.events_path).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["reason"], "stopped");
}
