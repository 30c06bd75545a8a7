//! Budget planning over the enhance/destroy process.
//!
//! A destroy sends the item back to `+0`, so progress is modelled as a series
//! of independent attempt-runs from `+0`. The planner prices one run to a
//! target tier, counts how many whole runs the current gold pays for, and picks
//! the highest target still reached with the requested confidence.

use core::fmt;

use serde::Serialize;

use crate::model::table::ProbabilityTable;
use crate::model::tier::Tier;

/// Probability that an attempt from `from` succeeds before the item is destroyed,
/// ignoring keep outcomes. Zero when the tier can neither succeed nor be destroyed.
pub fn success_before_destroy(table: &ProbabilityTable, from: Tier) -> f64 {
    let ended = table.success(from) + table.destroy(from);
    if ended <= 0.0 {
        0.0
    } else {
        table.success(from) / ended
    }
}

/// Expected number of attempts at `from` until something other than keep happens.
pub fn expected_attempts(table: &ProbabilityTable, from: Tier) -> f64 {
    let ended = table.success(from) + table.destroy(from);
    if ended <= 0.0 {
        f64::INFINITY
    } else {
        1.0 / ended
    }
}

/// Probability of reaching each tier from `+0` within a single attempt-run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reach([f64; Tier::COUNT]);

impl Reach {
    pub fn from_table(table: &ProbabilityTable) -> Self {
        let mut reach = [1.0; Tier::COUNT];
        for step in 0..Tier::STEPS {
            let from = Tier::from_index(step).unwrap_or(Tier::MAX);
            reach[step + 1] = reach[step] * success_before_destroy(table, from);
        }
        Self(reach)
    }

    pub fn get(&self, tier: Tier) -> f64 {
        self.0[tier.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

pub fn reach_probabilities(table: &ProbabilityTable) -> Reach {
    Reach::from_table(table)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Enhance,
    Sell,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Enhance => "enhance",
            Action::Sell => "sell",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision for the current gold and item tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    pub target: Tier,
    pub action: Action,
    /// Probability of reaching `target` with the current gold.
    pub confidence: f64,
    /// Whether the gold covers one more attempt at the current tier.
    pub affordable: bool,
}

/// One row of the per-target outlook table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetOutlook {
    pub target: Tier,
    pub reach: f64,
    pub run_cost: f64,
    pub probability: f64,
}

#[derive(Debug, Clone)]
pub struct Planner {
    table: ProbabilityTable,
    reach: Reach,
}

impl Planner {
    pub fn new(table: ProbabilityTable) -> Self {
        let reach = Reach::from_table(&table);
        Self { table, reach }
    }

    pub fn standard() -> Self {
        Self::new(ProbabilityTable::standard())
    }

    pub fn table(&self) -> &ProbabilityTable {
        &self.table
    }

    pub fn reach(&self) -> &Reach {
        &self.reach
    }

    /// Expected gold spent on one attempt-run from `+0` towards `target`,
    /// weighted by the chance of still being alive at each intermediate tier.
    pub fn expected_run_cost(&self, target: Tier) -> f64 {
        let mut total = 0.0;
        for step in 0..target.index() {
            let Some(from) = Tier::from_index(step) else {
                break;
            };
            let alive = self.reach.get(from);
            if alive <= 0.0 {
                continue;
            }
            let cost = self.table.cost(from).unwrap_or(0) as f64;
            total += alive * cost * expected_attempts(&self.table, from);
        }
        total
    }

    /// Chance of reaching `target` at least once when `budget` is spent on
    /// whole expected-cost runs.
    pub fn probability_with_budget(&self, budget: u64, target: Tier) -> f64 {
        let run_cost = self.expected_run_cost(target);
        if run_cost <= 0.0 || !run_cost.is_finite() {
            return 0.0;
        }
        let runs = (budget as f64 / run_cost).floor();
        if runs < 1.0 {
            return 0.0;
        }
        let miss = 1.0 - self.reach.get(target);
        1.0 - miss.powf(runs)
    }

    /// Highest target reached with at least `confidence`; `+1` when none is.
    pub fn best_target_tier(&self, budget: u64, confidence: f64) -> Tier {
        let mut best = Tier::new(1).unwrap_or(Tier::MAX);
        for target in Tier::targets() {
            if self.probability_with_budget(budget, target) >= confidence {
                best = target;
            }
        }
        best
    }

    pub fn decide(&self, gold: u64, tier: Tier, confidence: f64) -> Plan {
        let target = self.best_target_tier(gold, confidence);
        let affordable = self.table.cost(tier).is_some_and(|cost| cost <= gold);
        let action = if tier >= target || (!affordable && tier > Tier::ZERO) {
            Action::Sell
        } else {
            Action::Enhance
        };
        Plan {
            target,
            action,
            confidence: self.probability_with_budget(gold, target),
            affordable,
        }
    }

    pub fn outlook(&self, budget: u64) -> Vec<TargetOutlook> {
        Tier::targets()
            .map(|target| TargetOutlook {
                target,
                reach: self.reach.get(target),
                run_cost: self.expected_run_cost(target),
                probability: self.probability_with_budget(budget, target),
            })
            .collect()
    }

    pub fn expected_sell_value(&self, tier: Tier) -> f64 {
        self.table.sell_value(tier)
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::standard()
    }
}
