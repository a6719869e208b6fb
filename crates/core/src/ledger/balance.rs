//! Partner balance calculation.
//!
//! Balances are never stored. They are derived from per-type ledger totals on
//! every read:
//!
//! - `pending  = max(0, earned - approved_like)`
//! - `approved = max(0, approved_like - paid - refunded)`
//! - `debt     = max(0, -(approved_like - paid - refunded))`
//! - `paid     = Σ commission_paid`
//!
//! where `approved_like = Σ commission_approved + Σ academy_bonus + Σ adjustment`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use referra_shared::types::PartnerId;

use super::entry::{LedgerEntry, LedgerEntryType};

/// Sum of ledger amounts per entry type for one partner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Σ `commission_earned`.
    pub earned: Decimal,
    /// Σ `commission_approved`.
    pub approved: Decimal,
    /// Σ `commission_paid`.
    pub paid: Decimal,
    /// Σ `refund`.
    pub refunded: Decimal,
    /// Σ `adjustment`.
    pub adjustments: Decimal,
    /// Σ `academy_bonus`.
    pub academy_bonus: Decimal,
}

impl LedgerTotals {
    /// Adds one amount to the bucket of its entry type.
    pub fn add(&mut self, entry_type: LedgerEntryType, amount: Decimal) {
        let bucket = match entry_type {
            LedgerEntryType::CommissionEarned => &mut self.earned,
            LedgerEntryType::CommissionApproved => &mut self.approved,
            LedgerEntryType::CommissionPaid => &mut self.paid,
            LedgerEntryType::Refund => &mut self.refunded,
            LedgerEntryType::Adjustment => &mut self.adjustments,
            LedgerEntryType::AcademyBonus => &mut self.academy_bonus,
        };
        *bucket += amount;
    }

    /// Builds totals from `(entry_type, sum)` rows as returned by a grouped query.
    #[must_use]
    pub fn from_sums(rows: impl IntoIterator<Item = (LedgerEntryType, Decimal)>) -> Self {
        let mut totals = Self::default();
        for (entry_type, amount) in rows {
            totals.add(entry_type, amount);
        }
        totals
    }

    /// Money that has left the hold period (approvals, bonuses, adjustments).
    #[must_use]
    pub fn approved_like(&self) -> Decimal {
        self.approved + self.academy_bonus + self.adjustments
    }

    /// Approved money net of payments and refunds. Negative means debt.
    #[must_use]
    pub fn approved_raw(&self) -> Decimal {
        self.approved_like() - self.paid - self.refunded
    }
}

/// Derived balances of a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerBalance {
    /// The partner.
    pub partner_id: PartnerId,
    /// Commission earned but still inside the hold period.
    pub pending_commission: Decimal,
    /// Commission ready to be paid out.
    pub approved_balance: Decimal,
    /// Commission paid out so far.
    pub paid_commission: Decimal,
    /// Amount the partner owes the program; absorbed by future approvals.
    pub debt_balance: Decimal,
}

impl PartnerBalance {
    /// Computes balances from per-type totals.
    #[must_use]
    pub fn from_totals(partner_id: PartnerId, totals: &LedgerTotals) -> Self {
        let approved_raw = totals.approved_raw();
        Self {
            partner_id,
            pending_commission: (totals.earned - totals.approved_like()).max(Decimal::ZERO),
            approved_balance: approved_raw.max(Decimal::ZERO),
            paid_commission: totals.paid,
            debt_balance: (-approved_raw).max(Decimal::ZERO),
        }
    }

    /// Computes balances by folding a partner's ledger entries.
    ///
    /// Entries belonging to other partners are ignored.
    #[must_use]
    pub fn from_entries<'a>(
        partner_id: PartnerId,
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
    ) -> Self {
        let mut totals = LedgerTotals::default();
        for entry in entries
            .into_iter()
            .filter(|entry| entry.partner_id == partner_id)
        {
            totals.add(entry.entry_type, entry.amount);
        }
        Self::from_totals(partner_id, &totals)
    }

    /// Balance of a partner with no ledger history.
    #[must_use]
    pub fn empty(partner_id: PartnerId) -> Self {
        Self::from_totals(partner_id, &LedgerTotals::default())
    }

    /// Returns true if the partner owes money to the program.
    #[must_use]
    pub fn in_debt(&self) -> bool {
        self.debt_balance > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use referra_shared::types::LedgerEntryId;
    use rust_decimal_macros::dec;

    fn entry(partner_id: PartnerId, entry_type: LedgerEntryType, amount: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            partner_id,
            entry_type,
            amount,
            related_deal_id: None,
            batch_id: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_ledger_is_all_zero() {
        let partner = PartnerId::new();
        let balance = PartnerBalance::empty(partner);
        assert_eq!(balance.pending_commission, Decimal::ZERO);
        assert_eq!(balance.approved_balance, Decimal::ZERO);
        assert_eq!(balance.paid_commission, Decimal::ZERO);
        assert_eq!(balance.debt_balance, Decimal::ZERO);
        assert!(!balance.in_debt());
    }

    #[test]
    fn test_full_lifecycle() {
        let partner = PartnerId::new();
        let mut entries = vec![entry(partner, LedgerEntryType::CommissionEarned, dec!(100))];

        let balance = PartnerBalance::from_entries(partner, &entries);
        assert_eq!(balance.pending_commission, dec!(100));
        assert_eq!(balance.approved_balance, dec!(0));

        entries.push(entry(partner, LedgerEntryType::CommissionApproved, dec!(100)));
        let balance = PartnerBalance::from_entries(partner, &entries);
        assert_eq!(balance.pending_commission, dec!(0));
        assert_eq!(balance.approved_balance, dec!(100));

        entries.push(entry(partner, LedgerEntryType::CommissionPaid, dec!(100)));
        let balance = PartnerBalance::from_entries(partner, &entries);
        assert_eq!(balance.approved_balance, dec!(0));
        assert_eq!(balance.paid_commission, dec!(100));
        assert_eq!(balance.debt_balance, dec!(0));
    }

    #[test]
    fn test_refund_after_payment_creates_debt() {
        let partner = PartnerId::new();
        let totals = LedgerTotals {
            earned: dec!(100),
            approved: dec!(100),
            paid: dec!(100),
            refunded: dec!(100),
            ..LedgerTotals::default()
        };
        let balance = PartnerBalance::from_totals(partner, &totals);
        assert_eq!(balance.approved_balance, dec!(0));
        assert_eq!(balance.debt_balance, dec!(100));
        assert!(balance.in_debt());
    }

    #[test]
    fn test_debt_absorbed_by_later_approval() {
        let partner = PartnerId::new();
        let totals = LedgerTotals {
            earned: dec!(160),
            approved: dec!(160),
            paid: dec!(100),
            refunded: dec!(100),
            ..LedgerTotals::default()
        };
        // 60 approved after a 100 debt leaves 40 still owed.
        let balance = PartnerBalance::from_totals(partner, &totals);
        assert_eq!(balance.approved_balance, dec!(0));
        assert_eq!(balance.debt_balance, dec!(40));
    }

    #[test]
    fn test_academy_bonus_is_approved_without_earning() {
        let partner = PartnerId::new();
        let totals = LedgerTotals::from_sums([(LedgerEntryType::AcademyBonus, dec!(100))]);
        let balance = PartnerBalance::from_totals(partner, &totals);
        assert_eq!(balance.approved_balance, dec!(100));
        assert_eq!(balance.pending_commission, dec!(0));
    }

    #[test]
    fn test_reversed_pending_commission() {
        let partner = PartnerId::new();
        let totals = LedgerTotals::from_sums([
            (LedgerEntryType::CommissionEarned, dec!(250)),
            (LedgerEntryType::CommissionEarned, dec!(-250)),
        ]);
        let balance = PartnerBalance::from_totals(partner, &totals);
        assert_eq!(balance.pending_commission, dec!(0));
        assert_eq!(balance.approved_balance, dec!(0));
    }

    #[test]
    fn test_other_partner_entries_ignored() {
        let partner = PartnerId::new();
        let other = PartnerId::new();
        let entries = vec![
            entry(partner, LedgerEntryType::CommissionEarned, dec!(10)),
            entry(other, LedgerEntryType::CommissionEarned, dec!(999)),
        ];
        let balance = PartnerBalance::from_entries(partner, &entries);
        assert_eq!(balance.pending_commission, dec!(10));
    }
}
