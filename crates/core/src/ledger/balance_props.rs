//! Property-based tests for the balance calculator.
//!
//! - Conservation: approved - debt always equals the raw approved remainder
//! - Surfaced balances are never negative
//! - Debt is a lien that later approvals absorb first

use proptest::prelude::*;
use rust_decimal::Decimal;

use referra_shared::types::PartnerId;

use super::balance::{LedgerTotals, PartnerBalance};
use super::entry::LedgerEntryType;

/// Strategy to generate positive decimal amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate signed decimal amounts (-10,000.00 to 10,000.00).
fn signed_amount() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate an arbitrary ledger row, respecting the sign rules.
fn ledger_row() -> impl Strategy<Value = (LedgerEntryType, Decimal)> {
    prop_oneof![
        signed_amount().prop_map(|a| (LedgerEntryType::CommissionEarned, a)),
        positive_amount().prop_map(|a| (LedgerEntryType::CommissionApproved, a)),
        positive_amount().prop_map(|a| (LedgerEntryType::CommissionPaid, a)),
        positive_amount().prop_map(|a| (LedgerEntryType::Refund, a)),
        signed_amount().prop_map(|a| (LedgerEntryType::Adjustment, a)),
        positive_amount().prop_map(|a| (LedgerEntryType::AcademyBonus, a)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// approved_balance - debt_balance == approved_like - paid - refunded
    #[test]
    fn prop_balance_conservation(rows in prop::collection::vec(ledger_row(), 0..40)) {
        let totals = LedgerTotals::from_sums(rows);
        let balance = PartnerBalance::from_totals(PartnerId::new(), &totals);

        prop_assert_eq!(
            balance.approved_balance - balance.debt_balance,
            totals.approved_like() - totals.paid - totals.refunded
        );
        prop_assert_eq!(balance.paid_commission, totals.paid);
    }

    #[test]
    fn prop_surfaced_balances_never_negative(rows in prop::collection::vec(ledger_row(), 0..40)) {
        let totals = LedgerTotals::from_sums(rows);
        let balance = PartnerBalance::from_totals(PartnerId::new(), &totals);

        prop_assert!(balance.pending_commission >= Decimal::ZERO);
        prop_assert!(balance.approved_balance >= Decimal::ZERO);
        prop_assert!(balance.debt_balance >= Decimal::ZERO);
        // Approved and debt are mutually exclusive.
        prop_assert!(balance.approved_balance.is_zero() || balance.debt_balance.is_zero());
    }

    /// A refund larger than what was paid produces exactly the excess as debt,
    /// and a later approval reduces that debt before any approved balance shows.
    #[test]
    fn prop_debt_is_absorbed_first(
        paid in positive_amount(),
        excess in positive_amount(),
        later in positive_amount(),
    ) {
        let mut totals = LedgerTotals::from_sums([
            (LedgerEntryType::CommissionEarned, paid),
            (LedgerEntryType::CommissionApproved, paid),
            (LedgerEntryType::CommissionPaid, paid),
            (LedgerEntryType::Refund, paid + excess),
        ]);
        let partner = PartnerId::new();
        let before = PartnerBalance::from_totals(partner, &totals);
        prop_assert_eq!(before.debt_balance, paid + excess);

        totals.add(LedgerEntryType::CommissionApproved, later);
        let after = PartnerBalance::from_totals(partner, &totals);

        if later <= paid + excess {
            prop_assert_eq!(after.approved_balance, Decimal::ZERO);
            prop_assert_eq!(after.debt_balance, paid + excess - later);
        } else {
            prop_assert_eq!(after.approved_balance, later - paid - excess);
            prop_assert_eq!(after.debt_balance, Decimal::ZERO);
        }
    }

    /// Summing rows one at a time matches summing them pre-grouped.
    #[test]
    fn prop_totals_order_independent(rows in prop::collection::vec(ledger_row(), 0..30)) {
        let forward = LedgerTotals::from_sums(rows.clone());
        let backward = LedgerTotals::from_sums(rows.into_iter().rev());
        prop_assert_eq!(forward, backward);
    }
}
