use std::thread;
use std::time::Duration;

use forge_bot::{
    FinishReason, Orchestrator, OrchestratorConfig, SessionRecord, StopSignal, WaitConfig,
};
use forge_core::model::table::ProbabilityTable;
use forge_core::planner::Planner;
use forge_core::sim::{SimConfig, SimulatedGame};

fn quick_config(max_actions: Option<u64>) -> OrchestratorConfig {
    OrchestratorConfig {
        after_command: Duration::ZERO,
        waiting_retry: Duration::ZERO,
        loop_gap: Duration::ZERO,
        init_attempts: 3,
        init_retry: Duration::from_millis(1),
        max_actions,
        wait: WaitConfig {
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(500),
            sell_max_wait: Duration::from_millis(20),
            ..WaitConfig::default()
        },
        ..OrchestratorConfig::default()
    }
}

fn game(table: ProbabilityTable, seed: u64, gold: u64) -> SimulatedGame {
    SimulatedGame::new(
        table,
        SimConfig {
            seed,
            starting_gold: gold,
            result_delay_reads: 2,
            ..SimConfig::default()
        },
    )
}

#[test]
fn records_chain_gold_between_actions() {
    let table = ProbabilityTable::standard();
    let mut game = game(table.clone(), 11, 100_000);
    let mut orchestrator =
        Orchestrator::new(Planner::new(table.clone()), quick_config(Some(60)), StopSignal::new());
    let mut records = Vec::new();
    let summary = orchestrator.run(&mut game, &mut records);

    assert_eq!(summary.reason, FinishReason::ActionLimit);
    assert_eq!(summary.actions(), 60);
    assert_eq!(summary.gold, game.gold());
    assert_eq!(summary.tier, game.tier());
    assert_eq!(game.counters().attempts, summary.enhances);
    assert_eq!(game.counters().sells, summary.sells);

    let mut gold = match records[0] {
        SessionRecord::Init { gold, .. } => gold,
        other => panic!("expected init first, got {other:?}"),
    };
    for record in &records[1..] {
        match record {
            SessionRecord::Enhance(enhance) => {
                assert_eq!(enhance.gold_before, gold);
                assert_eq!(enhance.spent, enhance.gold_before - enhance.gold_after);
                assert_eq!(Some(enhance.spent), table.cost(enhance.before_tier));
                assert!(!enhance.timed_out);
                gold = enhance.gold_after;
            }
            SessionRecord::Sell(sell) => {
                assert_eq!(sell.gold_before, gold);
                assert_eq!(sell.earned, table.sell_value(sell.before_tier).round() as u64);
                gold = sell.gold_after;
            }
            SessionRecord::Finish { gold: last, .. } => assert_eq!(*last, gold),
            SessionRecord::Waiting { .. } => {}
            SessionRecord::Init { .. } => panic!("init recorded twice"),
        }
    }
}

#[test]
fn worthless_sales_end_in_bankruptcy() {
    let standard = ProbabilityTable::standard();
    let table = ProbabilityTable::new(
        *standard.success_column(),
        *standard.destroy_column(),
        *standard.cost_column(),
        [0.0; 21],
    )
    .expect("valid table");
    let mut game = game(table.clone(), 3, 25);
    let mut orchestrator =
        Orchestrator::new(Planner::new(table), quick_config(None), StopSignal::new());
    let mut records = Vec::new();
    let summary = orchestrator.run(&mut game, &mut records);

    assert_eq!(summary.reason, FinishReason::Bankrupt);
    assert_eq!(summary.gold, 5);
    assert_eq!(summary.enhances, 2);
    assert_eq!(summary.sells, 2);
    assert!(records.iter().all(|record| match record {
        SessionRecord::Sell(sell) => sell.timed_out && sell.earned == 0,
        _ => true,
    }));
}

#[test]
fn stop_signal_ends_a_running_session() {
    let stop = StopSignal::new();
    let handle = stop.clone();
    let mut config = quick_config(None);
    config.after_command = Duration::from_millis(1);

    let table = ProbabilityTable::standard();
    let mut game = game(table.clone(), 5, 100_000);
    let mut orchestrator = Orchestrator::new(Planner::new(table), config, stop);

    let raiser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.raise();
    });
    let mut records = Vec::new();
    let summary = orchestrator.run(&mut game, &mut records);
    raiser.join().unwrap();

    assert_eq!(summary.reason, FinishReason::Stopped);
    assert!(matches!(
        records.last(),
        Some(SessionRecord::Finish {
            reason: FinishReason::Stopped,
            ..
        })
    ));
}
