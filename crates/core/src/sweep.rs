//! Commission approval sweep.
//!
//! Commissions leave the hold period once `sale_date <= now - hold_period`.
//! The repository selects candidates with [`ApprovalSweep::cutoff`], then for
//! each one runs a guarded update and appends the entry from
//! [`ApprovalSweep::promote`].

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::deal::{CommissionStatus, DealRecord, DealStatus};
use crate::error::EngineError;
use crate::ledger::NewLedgerEntry;

/// What approving one commission writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPromotion {
    /// Approval date recorded on the deal.
    pub approval_date: DateTime<Utc>,
    /// `commission_approved` entry; absent for a zero commission.
    pub entry: Option<NewLedgerEntry>,
}

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Commissions approved by this run.
    pub approved_count: u64,
    /// Σ approved amounts.
    pub approved_total: Decimal,
    /// Candidates another run (or a reversal) got to first.
    pub skipped_count: u64,
}

impl SweepReport {
    /// Counts one approval.
    pub fn record_approved(&mut self, amount: Decimal) {
        self.approved_count += 1;
        self.approved_total += amount;
    }

    /// Counts one guard miss.
    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
    }
}

/// Stateless service for hold-period decisions.
pub struct ApprovalSweep;

impl ApprovalSweep {
    /// Latest sale date that is past the hold period at `now`.
    #[must_use]
    pub fn cutoff(now: DateTime<Utc>, hold_period: Duration) -> DateTime<Utc> {
        now - hold_period
    }

    /// Returns true if the deal's commission should be approved.
    #[must_use]
    pub fn is_due(deal: &DealRecord, cutoff: DateTime<Utc>) -> bool {
        deal.deal_status == DealStatus::Closed
            && deal.commission_status == CommissionStatus::Pending
            && deal.sale_date.is_some_and(|sale| sale <= cutoff)
    }

    /// Decides the approval of a due commission.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if the commission is no longer pending on a
    /// closed deal.
    pub fn promote(deal: &DealRecord, now: DateTime<Utc>) -> Result<SweepPromotion, EngineError> {
        if deal.deal_status != DealStatus::Closed
            || deal.commission_status != CommissionStatus::Pending
        {
            return Err(EngineError::invalid_transition(
                "commission",
                deal.state(),
                CommissionStatus::Approved,
            ));
        }
        let amount = deal.commission();
        let entry = (!amount.is_zero()).then(|| {
            NewLedgerEntry::commission_approved(deal.partner_id, deal.id, amount)
                .with_description("Hold period elapsed")
        });
        Ok(SweepPromotion {
            approval_date: now,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::service::tests::{closed, deal};
    use crate::ledger::LedgerEntryType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_due_after_hold_period() {
        let now = Utc::now();
        let mut record = closed(deal(dec!(1000), dec!(0.10)));
        let cutoff = ApprovalSweep::cutoff(now, Duration::days(14));

        record.sale_date = Some(now - Duration::days(13));
        assert!(!ApprovalSweep::is_due(&record, cutoff));

        record.sale_date = Some(now - Duration::days(14));
        assert!(ApprovalSweep::is_due(&record, cutoff));

        record.sale_date = Some(now - Duration::days(15));
        assert!(ApprovalSweep::is_due(&record, cutoff));
    }

    #[test]
    fn test_not_due_unless_pending_and_closed() {
        let now = Utc::now();
        let cutoff = ApprovalSweep::cutoff(now, Duration::days(14));
        let mut record = closed(deal(dec!(1000), dec!(0.10)));
        record.sale_date = Some(now - Duration::days(30));

        record.commission_status = CommissionStatus::Reversed;
        assert!(!ApprovalSweep::is_due(&record, cutoff));

        let open = deal(dec!(1000), dec!(0.10));
        assert!(!ApprovalSweep::is_due(&open, cutoff));
    }

    #[test]
    fn test_scenario_promote_after_fifteen_days() {
        let now = Utc::now();
        let mut record = closed(deal(dec!(1000), dec!(0.10)));
        record.sale_date = Some(now - Duration::days(15));

        let promotion = ApprovalSweep::promote(&record, now).unwrap();
        let entry = promotion.entry.unwrap();
        assert_eq!(entry.entry_type, LedgerEntryType::CommissionApproved);
        assert_eq!(entry.amount, dec!(100.00));
        assert_eq!(promotion.approval_date, now);
    }

    #[test]
    fn test_promote_twice_conflicts() {
        let mut record = closed(deal(dec!(1000), dec!(0.10)));
        record.commission_status = CommissionStatus::Approved;
        assert!(matches!(
            ApprovalSweep::promote(&record, Utc::now()),
            Err(EngineError::StateConflict(_))
        ));
    }

    #[test]
    fn test_report_counts() {
        let mut report = SweepReport::default();
        report.record_approved(dec!(100));
        report.record_approved(dec!(25.50));
        report.record_skipped();
        assert_eq!(report.approved_count, 2);
        assert_eq!(report.approved_total, dec!(125.50));
        assert_eq!(report.skipped_count, 1);
    }
}
