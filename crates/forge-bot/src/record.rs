use core::fmt;

use forge_core::model::event::Event;
use forge_core::model::tier::Tier;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Stop signal raised.
    Stopped,
    /// Item reached `+20`.
    MaxTier,
    /// No item and not enough gold for a `+0` attempt.
    Bankrupt,
    /// Configured action limit reached.
    ActionLimit,
}

impl FinishReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            FinishReason::Stopped => "stopped",
            FinishReason::MaxTier => "max_tier",
            FinishReason::Bankrupt => "bankrupt",
            FinishReason::ActionLimit => "action_limit",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnhanceRecord {
    pub before_tier: Tier,
    pub after_tier: Tier,
    pub event: Event,
    pub spent: u64,
    pub gold_before: u64,
    pub gold_after: u64,
    pub target_tier: Tier,
    /// Spent figure as printed by the game; 0 when it was not shown.
    pub spent_parsed: u64,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SellRecord {
    pub before_tier: Tier,
    pub gold_before: u64,
    pub gold_after: u64,
    pub earned: u64,
    pub target_tier: Tier,
    pub timed_out: bool,
}

/// Everything the control loop reports to the statistics collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionRecord {
    Init {
        gold: u64,
        tier: Tier,
        confidence: f64,
    },
    Waiting {
        before_tier: Tier,
    },
    Enhance(EnhanceRecord),
    Sell(SellRecord),
    Finish {
        reason: FinishReason,
        gold: u64,
        tier: Tier,
    },
}

impl SessionRecord {
    pub const fn kind(&self) -> &'static str {
        match self {
            SessionRecord::Init { .. } => "init",
            SessionRecord::Waiting { .. } => "waiting",
            SessionRecord::Enhance(_) => "enhance",
            SessionRecord::Sell(_) => "sell",
            SessionRecord::Finish { .. } => "finish",
        }
    }
}

pub trait RecordSink {
    fn record(&mut self, record: &SessionRecord);
}

impl RecordSink for Vec<SessionRecord> {
    fn record(&mut self, record: &SessionRecord) {
        self.push(*record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_serialize_with_type_tag() {
        let record = SessionRecord::Enhance(EnhanceRecord {
            before_tier: Tier::new(3).unwrap(),
            after_tier: Tier::new(4).unwrap(),
            event: Event::Success,
            spent: 100,
            gold_before: 1_000,
            gold_after: 900,
            target_tier: Tier::new(9).unwrap(),
            spent_parsed: 100,
            timed_out: false,
        });
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(value["type"], "enhance");
        assert_eq!(value["before_tier"], 3);
        assert_eq!(value["event"], "success");
        assert_eq!(record.kind(), "enhance");

        let finish = SessionRecord::Finish {
            reason: FinishReason::MaxTier,
            gold: 5,
            tier: Tier::MAX,
        };
        let value = serde_json::to_value(finish).unwrap();
        assert_eq!(value["type"], "finish");
        assert_eq!(value["reason"], "max_tier");
    }
}
