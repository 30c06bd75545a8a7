//! In-process stand-in for the game chat, for dry runs and tests.
//!
//! The simulated game echoes commands, rolls enhance outcomes from a
//! [`ProbabilityTable`], credits sell values and writes result lines in the
//! same format the live chat uses. Results are posted after a configurable
//! number of transcript reads so that callers see the same "not yet resolved"
//! states they would in the live game.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::model::event::Event;
use crate::model::table::ProbabilityTable;
use crate::model::tier::Tier;
use crate::transcript::{ENHANCE_COMMAND, SELL_COMMAND};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub starting_gold: u64,
    pub starting_tier: Tier,
    /// Reads after a command before its result line appears.
    pub result_delay_reads: u32,
    pub speaker: String,
    pub enhance_command: String,
    pub sell_command: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            starting_gold: 100_000,
            starting_tier: Tier::ZERO,
            result_delay_reads: 1,
            speaker: "나".to_string(),
            enhance_command: ENHANCE_COMMAND.to_string(),
            sell_command: SELL_COMMAND.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingPost {
    remaining_reads: u32,
    lines: String,
}

/// Running totals of what the simulated game has resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCounters {
    pub attempts: u64,
    pub success: u64,
    pub keep: u64,
    pub destroy: u64,
    pub sells: u64,
    pub refused: u64,
}

#[derive(Debug)]
pub struct SimulatedGame {
    table: ProbabilityTable,
    config: SimConfig,
    rng: SmallRng,
    gold: u64,
    tier: Tier,
    transcript: String,
    pending: Option<PendingPost>,
    counters: SimCounters,
}

impl SimulatedGame {
    pub fn new(table: ProbabilityTable, config: SimConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        let gold = config.starting_gold;
        let tier = config.starting_tier;
        let transcript = format!(
            "[{tier}] 강화 대기 중인 무기\n남은 골드: {}G\n",
            format_gold(gold)
        );
        Self {
            table,
            config,
            rng,
            gold,
            tier,
            transcript,
            pending: None,
            counters: SimCounters::default(),
        }
    }

    pub fn gold(&self) -> u64 {
        self.gold
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn counters(&self) -> SimCounters {
        self.counters
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn has_pending_result(&self) -> bool {
        self.pending.is_some()
    }

    /// Snapshot the chat as a reader would see it, advancing pending posts.
    pub fn read(&mut self) -> String {
        if let Some(pending) = self.pending.as_mut() {
            pending.remaining_reads = pending.remaining_reads.saturating_sub(1);
            if pending.remaining_reads == 0 {
                self.flush_pending();
            }
        }
        self.transcript.clone()
    }

    fn push_line(&mut self, line: &str) {
        self.transcript.push_str(line);
        self.transcript.push('\n');
    }

    pub fn submit(&mut self, command: &str) {
        let echo = format!("{}: {command}", self.config.speaker);
        self.push_line(&echo);

        let command = command.trim();
        if command == self.config.enhance_command {
            self.enhance();
        } else if command == self.config.sell_command {
            self.sell();
        }
    }

    fn enhance(&mut self) {
        if self.pending.is_some() {
            self.push_line("강화 중이니 잠깐 기다리도록");
            return;
        }
        let from = self.tier;
        let Some(cost) = self.table.cost(from) else {
            self.counters.refused += 1;
            self.push_line("이미 최고 단계다");
            return;
        };
        if cost > self.gold {
            self.counters.refused += 1;
            self.push_line(&format!(
                "골드가 부족하다 (필요: {}G)",
                format_gold(cost)
            ));
            return;
        }

        self.gold -= cost;
        self.counters.attempts += 1;
        let event = self.roll(from);
        let headline = match event {
            Event::Success => {
                self.counters.success += 1;
                let to = from.next().unwrap_or(Tier::MAX);
                self.tier = to;
                format!("강화 성공! {from} → {to}")
            }
            Event::Destroy => {
                self.counters.destroy += 1;
                self.tier = Tier::ZERO;
                format!("강화 파괴 [{from}] 무기가 산산조각 났다")
            }
            _ => {
                self.counters.keep += 1;
                format!("강화 유지 [{from}]")
            }
        };
        let lines = format!(
            "{headline}\n사용 골드: -{}G\n남은 골드: {}G\n",
            format_gold(cost),
            format_gold(self.gold)
        );
        self.post(lines);
    }

    fn sell(&mut self) {
        if self.tier == Tier::ZERO {
            self.push_line("팔 수 있는 무기가 없다");
            return;
        }
        let sold = self.tier;
        let earned = self.table.sell_value(sold).round() as u64;
        self.gold = self.gold.saturating_add(earned);
        self.tier = Tier::ZERO;
        self.counters.sells += 1;
        let lines = format!(
            "판매 완료 [{sold}] 획득 골드: +{}G\n남은 골드: {}G\n",
            format_gold(earned),
            format_gold(self.gold)
        );
        self.post(lines);
    }

    fn roll(&mut self, from: Tier) -> Event {
        let draw: f64 = self.rng.r#gen();
        let success = self.table.success(from);
        if draw < success {
            Event::Success
        } else if draw < success + self.table.destroy(from) {
            Event::Destroy
        } else {
            Event::Keep
        }
    }

    fn post(&mut self, lines: String) {
        if self.config.result_delay_reads == 0 {
            self.transcript.push_str(&lines);
        } else {
            self.pending = Some(PendingPost {
                remaining_reads: self.config.result_delay_reads,
                lines,
            });
        }
    }

    fn flush_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.transcript.push_str(&pending.lines);
        }
    }
}

/// Format a gold amount with `,` thousands separators.
pub fn format_gold(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{enhance_result_not_ready, parse_latest_state};

    fn game(config: SimConfig) -> SimulatedGame {
        SimulatedGame::new(ProbabilityTable::standard(), config)
    }

    #[test]
    fn formats_thousands() {
        assert_eq!(format_gold(0), "0");
        assert_eq!(format_gold(999), "999");
        assert_eq!(format_gold(1_000), "1,000");
        assert_eq!(format_gold(1_234_567), "1,234,567");
    }

    #[test]
    fn initial_transcript_parses() {
        let mut game = game(SimConfig::default());
        let state = parse_latest_state(&game.read(), Tier::ZERO).expect("state");
        assert_eq!(state.gold(), 100_000);
        assert_eq!(state.event(), Event::Unknown);
    }

    #[test]
    fn first_attempt_always_succeeds_after_delay() {
        let mut game = game(SimConfig {
            result_delay_reads: 2,
            ..SimConfig::default()
        });
        game.submit(ENHANCE_COMMAND);
        let first = game.read();
        assert!(enhance_result_not_ready(&first));
        let second = game.read();
        assert!(!enhance_result_not_ready(&second));
        let state = parse_latest_state(&second, Tier::ZERO).expect("state");
        assert_eq!(state.event(), Event::Success);
        assert_eq!(state.tier(), Tier::new(1).unwrap());
        assert_eq!(state.gold(), 99_990);
        assert_eq!(state.spent_gold(), 10);
    }

    #[test]
    fn repeated_command_while_pending_posts_waiting_notice() {
        let mut game = game(SimConfig {
            result_delay_reads: 3,
            ..SimConfig::default()
        });
        game.submit(ENHANCE_COMMAND);
        game.submit(ENHANCE_COMMAND);
        let state = parse_latest_state(&game.read(), Tier::ZERO).unwrap();
        assert_eq!(state.event(), Event::Waiting);
        assert!(game.has_pending_result());
    }

    #[test]
    fn sell_credits_table_value() {
        let mut game = game(SimConfig {
            result_delay_reads: 0,
            starting_tier: Tier::new(5).unwrap(),
            starting_gold: 1_000,
            ..SimConfig::default()
        });
        game.submit(SELL_COMMAND);
        let state = parse_latest_state(&game.read(), Tier::ZERO).unwrap();
        assert_eq!(state.gold(), 1_759);
        assert_eq!(game.tier(), Tier::ZERO);
        assert_eq!(game.counters().sells, 1);
    }

    #[test]
    fn refuses_unaffordable_attempt() {
        let mut game = game(SimConfig {
            starting_gold: 5,
            ..SimConfig::default()
        });
        game.submit(ENHANCE_COMMAND);
        assert_eq!(game.counters().refused, 1);
        assert_eq!(game.gold(), 5);
        assert!(enhance_result_not_ready(&game.read()));
    }

    #[test]
    fn same_seed_replays_same_outcomes() {
        let config = SimConfig {
            seed: 42,
            result_delay_reads: 0,
            starting_gold: 1_000_000,
            ..SimConfig::default()
        };
        let mut a = game(config.clone());
        let mut b = game(config);
        for _ in 0..50 {
            a.submit(ENHANCE_COMMAND);
            b.submit(ENHANCE_COMMAND);
        }
        assert_eq!(a.transcript(), b.transcript());
        assert_eq!(a.counters(), b.counters());
    }
}
