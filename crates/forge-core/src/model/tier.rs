use core::fmt;
use serde::{Deserialize, Serialize};

/// Upgrade level of the live item, `+0` through `+20`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    pub const ZERO: Tier = Tier(0);
    pub const MAX: Tier = Tier(20);
    /// Number of attemptable transitions (`+0 -> +1` through `+19 -> +20`).
    pub const STEPS: usize = Self::MAX.0 as usize;
    /// Number of distinct tiers including `+0` and `+20`.
    pub const COUNT: usize = Self::STEPS + 1;

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX.0 {
            Some(Tier(value))
        } else {
            None
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        if index <= Self::MAX.0 as usize {
            Some(Tier(index as u8))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_max(self) -> bool {
        self.0 == Self::MAX.0
    }

    pub const fn next(self) -> Option<Tier> {
        Tier::new(self.0 + 1)
    }

    /// Every tier from `+1` to `+20`, ascending.
    pub fn targets() -> impl Iterator<Item = Tier> {
        (1..=Self::MAX.0).map(Tier)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.0
    }
}

impl TryFrom<u8> for Tier {
    type Error = TierOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::new(value).ok_or(TierOutOfRange(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierOutOfRange(pub u8);

impl fmt::Display for TierOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {} exceeds +{}", self.0, Tier::MAX.0)
    }
}

impl std::error::Error for TierOutOfRange {}

#[cfg(test)]
mod tests {
    use super::Tier;

    #[test]
    fn rejects_values_above_max() {
        assert_eq!(Tier::new(20), Some(Tier::MAX));
        assert_eq!(Tier::new(21), None);
        assert!(Tier::try_from(30u8).is_err());
    }

    #[test]
    fn next_stops_at_max() {
        assert_eq!(Tier::ZERO.next(), Tier::new(1));
        assert_eq!(Tier::MAX.next(), None);
    }

    #[test]
    fn targets_cover_one_through_twenty() {
        let targets: Vec<u8> = Tier::targets().map(Tier::value).collect();
        assert_eq!(targets.first(), Some(&1));
        assert_eq!(targets.last(), Some(&20));
        assert_eq!(targets.len(), Tier::STEPS);
    }

    #[test]
    fn displays_with_plus_prefix() {
        assert_eq!(Tier::new(7).unwrap().to_string(), "+7");
    }

    #[test]
    fn serializes_as_plain_number() {
        let tier = Tier::new(12).unwrap();
        assert_eq!(serde_json::to_string(&tier).unwrap(), "12");
        let parsed: Tier = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, Tier::new(3).unwrap());
        assert!(serde_json::from_str::<Tier>("21").is_err());
    }
}
