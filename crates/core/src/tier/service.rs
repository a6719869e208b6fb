//! Tier governance.
//!
//! Decides tier changes and flag changes; persisting and auditing them is the
//! caller's job. Automatic upgrades never downgrade and never touch a locked or
//! overridden partner.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use referra_shared::types::{AdminId, PartnerId};

use crate::audit::Actor;
use crate::error::EngineError;
use crate::money::require_reason;
use crate::tier::types::{Tier, TierChange, TierFlagChange, TierStatus, TierThresholds};

/// Stateless service for tier governance decisions.
pub struct TierGovernance;

impl TierGovernance {
    /// Evaluates an automatic upgrade after the partner's revenue changed.
    ///
    /// Returns `None` when the partner is locked, overridden, or the revenue
    /// earns no tier ranked strictly above the current one.
    #[must_use]
    pub fn evaluate_auto_upgrade(
        status: &TierStatus,
        lifetime_revenue: Decimal,
        thresholds: &TierThresholds,
        now: DateTime<Utc>,
    ) -> Option<TierChange> {
        if status.tier_locked || status.tier_override {
            return None;
        }
        let target = thresholds.tier_for_revenue(lifetime_revenue)?;
        if target.rank() <= status.tier.rank() {
            return None;
        }
        Some(TierChange {
            old_tier: status.tier,
            new_tier: target,
            reason: format!(
                "lifetime referred revenue {lifetime_revenue} reached the {target} threshold"
            ),
            changed_by: Actor::System,
            changed_at: now,
            is_downgrade: false,
            pins_override: false,
        })
    }

    /// Decides a manual tier change by an admin.
    ///
    /// Downgrades are allowed and flagged through `is_downgrade`.
    ///
    /// # Errors
    ///
    /// * `TierLocked` if the tier is locked
    /// * `Validation` if the reason is empty or the tier would not change
    pub fn change_manually(
        partner_id: PartnerId,
        status: &TierStatus,
        new_tier: Tier,
        reason: &str,
        admin: AdminId,
        now: DateTime<Utc>,
    ) -> Result<TierChange, EngineError> {
        if status.tier_locked {
            return Err(EngineError::TierLocked(partner_id));
        }
        let reason = require_reason(reason)?;
        if new_tier == status.tier {
            return Err(EngineError::Validation(format!(
                "partner is already on the {new_tier} tier"
            )));
        }
        Ok(TierChange {
            old_tier: status.tier,
            new_tier,
            reason,
            changed_by: Actor::Admin(admin),
            changed_at: now,
            is_downgrade: new_tier.rank() < status.tier.rank(),
            pins_override: true,
        })
    }

    /// Locks the tier.
    ///
    /// # Errors
    ///
    /// * `Validation` if the reason is empty
    /// * `StateConflict` if the tier is already locked
    pub fn lock(
        status: &TierStatus,
        reason: &str,
        admin: AdminId,
    ) -> Result<TierFlagChange, EngineError> {
        let reason = require_reason(reason)?;
        if status.tier_locked {
            return Err(EngineError::StateConflict("tier is already locked".to_string()));
        }
        Ok(TierFlagChange {
            tier_locked: true,
            tier_override: status.tier_override,
            reason,
            changed_by: Actor::Admin(admin),
        })
    }

    /// Unlocks the tier.
    ///
    /// # Errors
    ///
    /// * `Validation` if the reason is empty
    /// * `StateConflict` if the tier is not locked
    pub fn unlock(
        status: &TierStatus,
        reason: &str,
        admin: AdminId,
    ) -> Result<TierFlagChange, EngineError> {
        let reason = require_reason(reason)?;
        if !status.tier_locked {
            return Err(EngineError::StateConflict("tier is not locked".to_string()));
        }
        Ok(TierFlagChange {
            tier_locked: false,
            tier_override: status.tier_override,
            reason,
            changed_by: Actor::Admin(admin),
        })
    }

    /// Sets or clears the override flag.
    ///
    /// # Errors
    ///
    /// * `TierLocked` if the tier is locked
    /// * `Validation` if the reason is empty
    pub fn set_override(
        partner_id: PartnerId,
        status: &TierStatus,
        enabled: bool,
        reason: &str,
        admin: AdminId,
    ) -> Result<TierFlagChange, EngineError> {
        if status.tier_locked {
            return Err(EngineError::TierLocked(partner_id));
        }
        let reason = require_reason(reason)?;
        Ok(TierFlagChange {
            tier_locked: false,
            tier_override: enabled,
            reason,
            changed_by: Actor::Admin(admin),
        })
    }

    /// Applies a decided change to a status.
    #[must_use]
    pub fn apply(status: &TierStatus, change: &TierChange) -> TierStatus {
        TierStatus {
            tier: change.new_tier,
            tier_override: status.tier_override || change.pins_override,
            tier_locked: status.tier_locked,
            tier_override_reason: if change.pins_override {
                Some(change.reason.clone())
            } else {
                status.tier_override_reason.clone()
            },
            tier_last_changed_at: Some(change.changed_at),
            tier_last_changed_by: Some(change.changed_by.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_crossing_agency_threshold_upgrades() {
        let status = TierStatus::new(Tier::Referral);
        let change = TierGovernance::evaluate_auto_upgrade(
            &status,
            dec!(10000),
            &TierThresholds::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(change.old_tier, Tier::Referral);
        assert_eq!(change.new_tier, Tier::Agency);
        assert_eq!(change.changed_by, Actor::System);
        assert_eq!(change.changed_by.to_string(), "system");
        assert!(!change.is_downgrade);
    }

    #[test]
    fn test_below_threshold_no_change() {
        let status = TierStatus::new(Tier::Referral);
        let change = TierGovernance::evaluate_auto_upgrade(
            &status,
            dec!(9999.99),
            &TierThresholds::default(),
            Utc::now(),
        );
        assert!(change.is_none());
    }

    #[test]
    fn test_skips_straight_to_enterprise() {
        let status = TierStatus::new(Tier::Creator);
        let change = TierGovernance::evaluate_auto_upgrade(
            &status,
            dec!(75000),
            &TierThresholds::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(change.new_tier, Tier::Enterprise);
    }

    #[test]
    fn test_locked_or_overridden_never_auto_upgrades() {
        let mut status = TierStatus::new(Tier::Referral);
        status.tier_locked = true;
        assert!(
            TierGovernance::evaluate_auto_upgrade(
                &status,
                dec!(60000),
                &TierThresholds::default(),
                Utc::now(),
            )
            .is_none()
        );

        let mut status = TierStatus::new(Tier::Referral);
        status.tier_override = true;
        assert!(
            TierGovernance::evaluate_auto_upgrade(
                &status,
                dec!(60000),
                &TierThresholds::default(),
                Utc::now(),
            )
            .is_none()
        );
    }

    #[test]
    fn test_never_auto_downgrades() {
        let status = TierStatus::new(Tier::Enterprise);
        assert!(
            TierGovernance::evaluate_auto_upgrade(
                &status,
                dec!(12000),
                &TierThresholds::default(),
                Utc::now(),
            )
            .is_none()
        );
    }

    #[test]
    fn test_manual_change_on_locked_partner_fails() {
        let partner = PartnerId::new();
        let mut status = TierStatus::new(Tier::Agency);
        status.tier_locked = true;
        let result = TierGovernance::change_manually(
            partner,
            &status,
            Tier::Enterprise,
            "strategic account",
            AdminId::new(),
            Utc::now(),
        );
        assert!(matches!(result, Err(EngineError::TierLocked(id)) if id == partner));
    }

    #[test]
    fn test_manual_downgrade_is_flagged() {
        let status = TierStatus::new(Tier::Enterprise);
        let admin = AdminId::new();
        let change = TierGovernance::change_manually(
            PartnerId::new(),
            &status,
            Tier::Referral,
            "contract renegotiated",
            admin,
            Utc::now(),
        )
        .unwrap();
        assert!(change.is_downgrade);
        assert_eq!(change.changed_by, Actor::Admin(admin));

        let applied = TierGovernance::apply(&status, &change);
        assert_eq!(applied.tier, Tier::Referral);
        assert!(applied.tier_override);
        assert_eq!(applied.tier_override_reason.as_deref(), Some("contract renegotiated"));
        assert_eq!(applied.tier_last_changed_by, Some(admin.to_string()));
    }

    #[test]
    fn test_manual_change_requires_reason() {
        let result = TierGovernance::change_manually(
            PartnerId::new(),
            &TierStatus::new(Tier::Referral),
            Tier::Agency,
            "   ",
            AdminId::new(),
            Utc::now(),
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_lock_unlock_cycle() {
        let admin = AdminId::new();
        let status = TierStatus::new(Tier::Agency);
        assert!(TierGovernance::unlock(&status, "nothing to unlock", admin).is_err());

        let lock = TierGovernance::lock(&status, "under investigation", admin).unwrap();
        assert!(lock.tier_locked);

        let locked = TierStatus {
            tier_locked: true,
            ..status
        };
        assert!(matches!(
            TierGovernance::lock(&locked, "again", admin),
            Err(EngineError::StateConflict(_))
        ));
        let unlock = TierGovernance::unlock(&locked, "cleared", admin).unwrap();
        assert!(!unlock.tier_locked);
    }

    #[test]
    fn test_override_blocked_while_locked() {
        let partner = PartnerId::new();
        let mut status = TierStatus::new(Tier::Referral);
        assert!(
            TierGovernance::set_override(partner, &status, true, "pin", AdminId::new()).is_ok()
        );

        status.tier_locked = true;
        assert!(matches!(
            TierGovernance::set_override(partner, &status, true, "pin", AdminId::new()),
            Err(EngineError::TierLocked(_))
        ));
    }
}
