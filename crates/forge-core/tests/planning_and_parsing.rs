use forge_core::model::event::Event;
use forge_core::model::table::ProbabilityTable;
use forge_core::model::tier::Tier;
use forge_core::planner::{Action, Planner};
use forge_core::sim::{SimConfig, SimulatedGame};
use forge_core::transcript::{ENHANCE_COMMAND, SELL_COMMAND, enhance_result_not_ready, parse_latest_state};

fn tier(value: u8) -> Tier {
    Tier::new(value).unwrap()
}

#[test]
fn target_grows_with_budget_and_shrinks_with_confidence() {
    let planner = Planner::standard();
    let budgets = [0u64, 10, 1_000, 10_000, 100_000, 1_000_000, 10_000_000, 100_000_000];

    let mut previous = Tier::ZERO;
    for budget in budgets {
        let target = planner.best_target_tier(budget, 0.9);
        assert!(target >= previous, "budget {budget} lowered the target");
        previous = target;
    }

    let mut previous = Tier::MAX;
    for confidence in [0.1, 0.5, 0.9, 0.99, 0.999] {
        let target = planner.best_target_tier(1_000_000, confidence);
        assert!(target <= previous, "confidence {confidence} raised the target");
        previous = target;
    }
}

#[test]
fn fixed_budget_fixture() {
    let planner = Planner::standard();
    assert_eq!(planner.best_target_tier(100_000, 0.90), tier(9));
    for target in Tier::targets() {
        assert_eq!(planner.probability_with_budget(0, target), 0.0);
    }
}

#[test]
fn decide_sells_once_target_is_met_and_enhances_below_it() {
    let planner = Planner::standard();
    let plan = planner.decide(100_000, tier(9), 0.9);
    assert_eq!(plan.target, tier(9));
    assert_eq!(plan.action, Action::Sell);

    let plan = planner.decide(100_000, tier(4), 0.9);
    assert_eq!(plan.action, Action::Enhance);
    assert!(plan.affordable);
}

#[test]
fn simulated_transcripts_parse_back_to_game_state() {
    let mut game = SimulatedGame::new(
        ProbabilityTable::standard(),
        SimConfig {
            seed: 7,
            starting_gold: 10_000_000,
            result_delay_reads: 0,
            ..SimConfig::default()
        },
    );

    let mut seen = [0usize; 3];
    for _ in 0..300 {
        let before = game.tier();
        if before >= tier(10) {
            game.submit(SELL_COMMAND);
            let state = parse_latest_state(&game.read(), Tier::ZERO).expect("gold after sell");
            assert_eq!(state.gold(), game.gold());
            continue;
        }

        game.submit(ENHANCE_COMMAND);
        let text = game.read();
        assert!(!enhance_result_not_ready(&text));
        let state = parse_latest_state(&text, before).expect("state after enhance");
        assert_eq!(state.gold(), game.gold());
        assert_eq!(state.tier(), game.tier());
        assert_eq!(state.spent_gold(), ProbabilityTable::standard().cost(before).unwrap());
        match state.event() {
            Event::Success => seen[0] += 1,
            Event::Keep => seen[1] += 1,
            Event::Destroy => seen[2] += 1,
            other => panic!("unexpected event {other}"),
        }
    }

    assert!(seen.iter().all(|count| *count > 0), "outcome mix {seen:?}");
}
