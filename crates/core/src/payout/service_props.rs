//! Property-based tests for payout planning.
//!
//! - A partner is never paid more than their payable balance
//! - No deal is paid more than its commission
//! - Whatever is withheld is exactly the commission left unpaid

use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use referra_shared::types::{DealId, PartnerId};

use crate::payout::service::PayoutService;
use crate::payout::types::{PayableDeal, PayoutMonth};

fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..5_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn plan_inputs() -> impl Strategy<Value = (Vec<Decimal>, Decimal)> {
    (prop::collection::vec(amount(), 1..8), amount())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_payout_is_capped_and_conserves_commission((commissions, cap) in plan_inputs()) {
        let partner_id = PartnerId::new();
        let deals: Vec<PayableDeal> = commissions
            .iter()
            .map(|amount| PayableDeal { deal_id: DealId::new(), partner_id, amount: *amount })
            .collect();
        let payable = BTreeMap::from([(partner_id, cap)]);
        let month = PayoutMonth::new(2026, 10).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 31).unwrap();

        let plan = PayoutService::plan_batch(month, date, &deals, &payable).unwrap();
        let share = &plan.partners[0];
        let gross: Decimal = commissions.iter().copied().sum();

        prop_assert_eq!(share.amount, cap.min(gross));
        prop_assert_eq!(share.amount + share.offset, gross);
        prop_assert_eq!(share.deals.len(), deals.len());
        for deal in &share.deals {
            prop_assert!(deal.amount >= Decimal::ZERO);
            prop_assert!(deal.amount <= deal.commission);
        }
        prop_assert_eq!(plan.total_amount, share.amount);
    }
}
