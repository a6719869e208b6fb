//! Property-based tests for tier governance.
//!
//! - Monotonicity: automatic evaluation never lowers the rank
//! - Lock: a locked tier never changes, automatically or manually

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use referra_shared::types::{AdminId, PartnerId};

use crate::error::EngineError;
use crate::tier::service::TierGovernance;
use crate::tier::types::{Tier, TierStatus, TierThresholds};

fn arb_tier() -> impl Strategy<Value = Tier> {
    prop_oneof![
        Just(Tier::Referral),
        Just(Tier::Creator),
        Just(Tier::Agency),
        Just(Tier::Enterprise),
    ]
}

/// Revenue from 0 to 100,000.00.
fn arb_revenue() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_auto_upgrade_is_monotonic(
        tier in arb_tier(),
        revenues in prop::collection::vec(arb_revenue(), 1..10),
    ) {
        let thresholds = TierThresholds::default();
        let mut status = TierStatus::new(tier);
        let mut cumulative = Decimal::ZERO;

        for revenue in revenues {
            cumulative += revenue;
            let before = status.tier.rank();
            if let Some(change) =
                TierGovernance::evaluate_auto_upgrade(&status, cumulative, &thresholds, Utc::now())
            {
                prop_assert!(change.new_tier.rank() > before);
                prop_assert!(!change.is_downgrade);
                status = TierGovernance::apply(&status, &change);
            }
            prop_assert!(status.tier.rank() >= before);
        }
    }

    #[test]
    fn prop_locked_tier_never_changes(
        tier in arb_tier(),
        target in arb_tier(),
        revenue in arb_revenue(),
    ) {
        let mut status = TierStatus::new(tier);
        status.tier_locked = true;

        prop_assert!(
            TierGovernance::evaluate_auto_upgrade(
                &status,
                revenue,
                &TierThresholds::default(),
                Utc::now(),
            )
            .is_none()
        );
        let manual = TierGovernance::change_manually(
            PartnerId::new(),
            &status,
            target,
            "attempted change",
            AdminId::new(),
            Utc::now(),
        );
        prop_assert!(matches!(manual, Err(EngineError::TierLocked(_))));
    }

    #[test]
    fn prop_downgrade_flag_matches_rank(from in arb_tier(), to in arb_tier()) {
        prop_assume!(from != to);
        let change = TierGovernance::change_manually(
            PartnerId::new(),
            &TierStatus::new(from),
            to,
            "review",
            AdminId::new(),
            Utc::now(),
        )
        .unwrap();
        prop_assert_eq!(change.is_downgrade, to.rank() < from.rank());
    }
}
