//! Program-wide commission policy.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use referra_shared::CommissionConfig;

use crate::tier::TierThresholds;

/// Commission policy shared by every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionPolicy {
    /// Time between a sale closing and its commission becoming approved.
    pub hold_period: Duration,
    /// Minimum approved balance for payout inclusion.
    pub payout_threshold: Decimal,
    /// Academy completion bonus.
    pub academy_bonus_amount: Decimal,
    /// Revenue thresholds for automatic tier upgrades.
    pub tier_thresholds: TierThresholds,
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self {
            hold_period: Duration::days(14),
            payout_threshold: dec!(50.00),
            academy_bonus_amount: dec!(100.00),
            tier_thresholds: TierThresholds::default(),
        }
    }
}

impl From<&CommissionConfig> for CommissionPolicy {
    fn from(config: &CommissionConfig) -> Self {
        Self {
            hold_period: Duration::days(i64::from(config.hold_period_days)),
            payout_threshold: config.payout_threshold,
            academy_bonus_amount: config.academy_bonus_amount,
            tier_thresholds: TierThresholds {
                agency: config.agency_revenue_threshold,
                enterprise: config.enterprise_revenue_threshold,
            },
        }
    }
}
