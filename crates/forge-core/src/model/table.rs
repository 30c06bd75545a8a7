use core::fmt;

use crate::model::tier::Tier;

const STEPS: usize = Tier::STEPS;
const TIERS: usize = Tier::COUNT;

/// Probability tolerance when checking that success and destroy leave room for keep.
const SUM_EPSILON: f64 = 1e-9;

// index k = attempt from +k to +(k+1), pooled from observed outcomes
const STANDARD_SUCCESS: [f64; STEPS] = [
    1.000, 0.898, 0.803, 0.702, 0.596, 0.498, 0.455, 0.401, 0.358, 0.296, 0.256, 0.220, 0.216,
    0.195, 0.158, 0.141, 0.102, 0.083, 0.048, 0.022,
];

const STANDARD_DESTROY: [f64; STEPS] = [
    0.000, 0.000, 0.000, 0.018, 0.053, 0.106, 0.098, 0.101, 0.102, 0.095, 0.104, 0.089, 0.090,
    0.097, 0.095, 0.102, 0.117, 0.098, 0.128, 0.109,
];

const STANDARD_COST: [u64; STEPS] = [
    10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000, 10_000, 20_000, 30_000, 40_000, 50_000,
    70_000, 100_000, 200_000, 500_000, 1_000_000, 2_000_000,
];

// observed up to +13, extrapolated above
const STANDARD_SELL: [f64; TIERS] = [
    0.0,
    10.5,
    40.0,
    117.0,
    300.0,
    759.0,
    2_459.0,
    5_413.0,
    14_964.0,
    33_301.0,
    101_061.0,
    228_825.0,
    440_403.0,
    768_998.0,
    1_500_000.0,
    3_100_000.0,
    7_120_000.0,
    19_600_000.0,
    53_970_000.0,
    148_600_000.0,
    410_000_000.0,
];

/// Per-tier outcome probabilities, attempt costs and sell prices.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityTable {
    success: [f64; STEPS],
    destroy: [f64; STEPS],
    cost: [u64; STEPS],
    sell: [f64; TIERS],
}

impl ProbabilityTable {
    pub fn new(
        success: [f64; STEPS],
        destroy: [f64; STEPS],
        cost: [u64; STEPS],
        sell: [f64; TIERS],
    ) -> Result<Self, TableError> {
        for step in 0..STEPS {
            let (s, d) = (success[step], destroy[step]);
            if !s.is_finite() || !(0.0..=1.0).contains(&s) {
                return Err(TableError::ProbabilityOutOfRange {
                    column: "success",
                    step,
                    value: s,
                });
            }
            if !d.is_finite() || !(0.0..=1.0).contains(&d) {
                return Err(TableError::ProbabilityOutOfRange {
                    column: "destroy",
                    step,
                    value: d,
                });
            }
            if s + d > 1.0 + SUM_EPSILON {
                return Err(TableError::ProbabilitySum { step, sum: s + d });
            }
        }

        if let Some((tier, value)) = sell
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(TableError::InvalidSellValue { tier, value });
        }

        Ok(Self {
            success,
            destroy,
            cost,
            sell,
        })
    }

    /// Tables pooled from observed outcomes in the live game.
    pub fn standard() -> Self {
        Self {
            success: STANDARD_SUCCESS,
            destroy: STANDARD_DESTROY,
            cost: STANDARD_COST,
            sell: STANDARD_SELL,
        }
    }

    /// Probability that an attempt from `from` succeeds. Zero at `+20`.
    pub fn success(&self, from: Tier) -> f64 {
        self.success.get(from.index()).copied().unwrap_or(0.0)
    }

    /// Probability that an attempt from `from` destroys the item. Zero at `+20`.
    pub fn destroy(&self, from: Tier) -> f64 {
        self.destroy.get(from.index()).copied().unwrap_or(0.0)
    }

    /// Probability that an attempt leaves the item unchanged.
    pub fn keep(&self, from: Tier) -> f64 {
        (1.0 - self.success(from) - self.destroy(from)).max(0.0)
    }

    /// Gold charged for one attempt from `from`; `None` at `+20`.
    pub fn cost(&self, from: Tier) -> Option<u64> {
        self.cost.get(from.index()).copied()
    }

    pub fn sell_value(&self, tier: Tier) -> f64 {
        self.sell[tier.index()]
    }

    pub fn success_column(&self) -> &[f64; STEPS] {
        &self.success
    }

    pub fn destroy_column(&self) -> &[f64; STEPS] {
        &self.destroy
    }

    pub fn cost_column(&self) -> &[u64; STEPS] {
        &self.cost
    }

    pub fn sell_column(&self) -> &[f64; TIERS] {
        &self.sell
    }
}

impl Default for ProbabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    ProbabilityOutOfRange {
        column: &'static str,
        step: usize,
        value: f64,
    },
    ProbabilitySum {
        step: usize,
        sum: f64,
    },
    InvalidSellValue {
        tier: usize,
        value: f64,
    },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::ProbabilityOutOfRange {
                column,
                step,
                value,
            } => write!(f, "{column}[{step}] = {value} is not a probability"),
            TableError::ProbabilitySum { step, sum } => {
                write!(f, "success[{step}] + destroy[{step}] = {sum} exceeds 1")
            }
            TableError::InvalidSellValue { tier, value } => {
                write!(f, "sell[{tier}] = {value} must be a non-negative number")
            }
        }
    }
}

impl std::error::Error for TableError {}
