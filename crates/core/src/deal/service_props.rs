//! Property-based tests for the deal lifecycle.
//!
//! - Only table transitions succeed
//! - Every state a transition produces passes composite validation
//! - A deal earns its commission at most once

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::deal::service::tests::{approved, deal};
use crate::deal::service::{CloseOutcome, DealLifecycle};
use crate::deal::types::DealStatus;
use crate::error::EngineError;

fn arb_status() -> impl Strategy<Value = DealStatus> {
    prop_oneof![
        Just(DealStatus::Registered),
        Just(DealStatus::UnderReview),
        Just(DealStatus::Approved),
        Just(DealStatus::Closed),
        Just(DealStatus::Rejected),
    ]
}

/// Strategy to generate positive decimal amounts (0.01 to 100,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Rates from 0.00 to 1.00.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=100i64).prop_map(|v| Decimal::new(v, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_review_only_from_registered(status in arb_status()) {
        let mut record = deal(Decimal::ONE_HUNDRED, Decimal::new(10, 2));
        record.deal_status = status;
        let result = DealLifecycle::start_review(&record);

        if status == DealStatus::Registered {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(EngineError::StateConflict(_))));
        }
    }

    #[test]
    fn prop_reject_only_before_close(status in arb_status()) {
        let mut record = deal(Decimal::ONE_HUNDRED, Decimal::new(10, 2));
        record.deal_status = status;
        let result = DealLifecycle::reject(&record, "not a fit");

        prop_assert_eq!(result.is_ok(), status.is_open());
        if let Ok(transition) = result {
            prop_assert!(transition.state.is_valid());
            prop_assert!(DealLifecycle::is_valid_transition(status, DealStatus::Rejected));
        }
    }

    #[test]
    fn prop_commission_earned_once(value in positive_amount(), rate in arb_rate()) {
        let mut record = approved(deal(value, rate));
        let first = DealLifecycle::close(&record, Utc::now()).unwrap();
        let CloseOutcome::Closed(plan) = first else {
            return Err(TestCaseError::fail("first close must close"));
        };
        prop_assert!(plan.state.is_valid());
        if let Some(entry) = &plan.earned {
            prop_assert_eq!(entry.amount, record.commission());
            prop_assert!(entry.validate().is_ok());
        } else {
            prop_assert!(record.commission().is_zero());
        }

        record.deal_status = plan.state.deal;
        for _ in 0..3 {
            prop_assert_eq!(
                DealLifecycle::close(&record, Utc::now()).unwrap(),
                CloseOutcome::AlreadyClosed
            );
        }
    }

    #[test]
    fn prop_commission_never_exceeds_value(value in positive_amount(), rate in arb_rate()) {
        let approval = DealLifecycle::approve(&deal(value, rate), None, None).unwrap();
        prop_assert!(approval.commission_amount >= Decimal::ZERO);
        prop_assert!(approval.commission_amount <= value);
        prop_assert!(approval.commission_amount.scale() <= 2);
    }
}
