//! Tier domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::Actor;

/// Partner tier. Determines the default commission rate of new deals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Entry tier for referral partners.
    Referral,
    /// Content creators; same rank as referral with a higher default rate.
    Creator,
    /// Reached at the agency revenue threshold.
    Agency,
    /// Reached at the enterprise revenue threshold.
    Enterprise,
}

impl Tier {
    /// Returns the string representation of the tier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Referral => "referral",
            Self::Creator => "creator",
            Self::Agency => "agency",
            Self::Enterprise => "enterprise",
        }
    }

    /// Parses a tier from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "referral" => Some(Self::Referral),
            "creator" => Some(Self::Creator),
            "agency" => Some(Self::Agency),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// Rank used for upgrade ordering. Referral and creator share rank 0.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Referral | Self::Creator => 0,
            Self::Agency => 1,
            Self::Enterprise => 2,
        }
    }

    /// Default commission rate for deals registered under this tier.
    #[must_use]
    pub fn default_commission_rate(&self) -> Decimal {
        match self {
            Self::Referral => dec!(0.10),
            Self::Creator => dec!(0.15),
            Self::Agency => dec!(0.20),
            Self::Enterprise => dec!(0.25),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Revenue thresholds for automatic upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Lifetime referred revenue that earns the agency tier.
    pub agency: Decimal,
    /// Lifetime referred revenue that earns the enterprise tier.
    pub enterprise: Decimal,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            agency: dec!(10000),
            enterprise: dec!(50000),
        }
    }
}

impl TierThresholds {
    /// Highest tier earned by a revenue figure, if any threshold is crossed.
    #[must_use]
    pub fn tier_for_revenue(&self, revenue: Decimal) -> Option<Tier> {
        if revenue >= self.enterprise {
            Some(Tier::Enterprise)
        } else if revenue >= self.agency {
            Some(Tier::Agency)
        } else {
            None
        }
    }
}

/// Governance state of a partner's tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStatus {
    /// Current tier.
    pub tier: Tier,
    /// Set when an admin pinned the tier; blocks automatic upgrades.
    pub tier_override: bool,
    /// Blocks every tier change until unlocked.
    pub tier_locked: bool,
    /// Reason attached to the latest override, lock or unlock.
    pub tier_override_reason: Option<String>,
    /// When the tier last changed.
    pub tier_last_changed_at: Option<DateTime<Utc>>,
    /// Who last changed the tier.
    pub tier_last_changed_by: Option<String>,
}

impl TierStatus {
    /// Fresh status for a newly created partner.
    #[must_use]
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            tier_override: false,
            tier_locked: false,
            tier_override_reason: None,
            tier_last_changed_at: None,
            tier_last_changed_by: None,
        }
    }
}

/// A decided tier change, ready to persist and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierChange {
    /// Tier before the change.
    pub old_tier: Tier,
    /// Tier after the change.
    pub new_tier: Tier,
    /// Why the change happened.
    pub reason: String,
    /// Who made the change.
    pub changed_by: Actor,
    /// When the change was decided.
    pub changed_at: DateTime<Utc>,
    /// True when the new tier ranks below the old one.
    pub is_downgrade: bool,
    /// Manual changes pin the tier so the next close does not undo them.
    pub pins_override: bool,
}

/// A decided change to the lock or override flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierFlagChange {
    /// New value of `tier_locked`.
    pub tier_locked: bool,
    /// New value of `tier_override`.
    pub tier_override: bool,
    /// Reason recorded alongside the flags.
    pub reason: String,
    /// Who made the change.
    pub changed_by: Actor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(dec!(0), None)]
    #[case(dec!(9999.99), None)]
    #[case(dec!(10000), Some(Tier::Agency))]
    #[case(dec!(49999.99), Some(Tier::Agency))]
    #[case(dec!(50000), Some(Tier::Enterprise))]
    #[case(dec!(1000000), Some(Tier::Enterprise))]
    fn test_tier_for_revenue(#[case] revenue: Decimal, #[case] expected: Option<Tier>) {
        assert_eq!(TierThresholds::default().tier_for_revenue(revenue), expected);
    }

    #[test]
    fn test_rank_order() {
        assert_eq!(Tier::Referral.rank(), Tier::Creator.rank());
        assert!(Tier::Agency.rank() > Tier::Creator.rank());
        assert!(Tier::Enterprise.rank() > Tier::Agency.rank());
    }

    #[test]
    fn test_parse_round_trip() {
        for tier in [Tier::Referral, Tier::Creator, Tier::Agency, Tier::Enterprise] {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("AGENCY"), Some(Tier::Agency));
        assert_eq!(Tier::parse("gold"), None);
    }

    #[test]
    fn test_default_rates() {
        assert_eq!(Tier::Referral.default_commission_rate(), dec!(0.10));
        assert_eq!(Tier::Enterprise.default_commission_rate(), dec!(0.25));
    }
}
