use serde::{Deserialize, Serialize};

use crate::model::event::Event;
use crate::model::tier::Tier;

/// One observation of the chat log: balance, item tier and what just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    gold: u64,
    tier: Tier,
    event: Event,
    spent_gold: u64,
}

impl State {
    pub const fn new(gold: u64, tier: Tier, event: Event, spent_gold: u64) -> Self {
        Self {
            gold,
            tier,
            event,
            spent_gold,
        }
    }

    pub const fn gold(&self) -> u64 {
        self.gold
    }

    pub const fn tier(&self) -> Tier {
        self.tier
    }

    pub const fn event(&self) -> Event {
        self.event
    }

    /// Gold the game reported as spent on the attempt; 0 when not shown.
    pub const fn spent_gold(&self) -> u64 {
        self.spent_gold
    }

    /// Gold or tier differ from a previous snapshot.
    pub fn differs_from(&self, gold: u64, tier: Tier) -> bool {
        self.gold != gold || self.tier != tier
    }
}
