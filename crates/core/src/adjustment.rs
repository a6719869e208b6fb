//! Manual ledger adjustments.
//!
//! A credit is recorded against a synthetic deal that is already closed with
//! an approved commission, the same way the academy bonus is, so the next
//! payout batch can pay it. A debit stays a bare `adjustment` entry; it lowers
//! the approved balance and is netted out of the next payout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use referra_shared::types::{DealId, PartnerId};

use crate::deal::{CommissionStatus, DealState, DealStatus, PaymentStatus};
use crate::error::EngineError;
use crate::ledger::NewLedgerEntry;
use crate::money::{require_reason, round_money};

/// Client name shown on the synthetic deal backing a credit.
pub const ADJUSTMENT_CREDIT_CLIENT: &str = "Manual adjustment credit";

/// Synthetic deal carrying a payable credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditDeal {
    /// ID of the synthetic deal.
    pub deal_id: DealId,
    /// Credited amount, also the deal's commission.
    pub amount: Decimal,
    /// State of the synthetic deal.
    pub deal_state: DealState,
    /// Sale and approval date of the synthetic deal.
    pub credited_at: DateTime<Utc>,
}

/// Everything a manual adjustment writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentPlan {
    /// Trimmed reason.
    pub reason: String,
    /// `adjustment` entry.
    pub entry: NewLedgerEntry,
    /// Present for a credit.
    pub credit: Option<CreditDeal>,
}

/// Stateless service for manual adjustments.
pub struct ManualAdjustment;

impl ManualAdjustment {
    /// State of a synthetic credit deal.
    pub const CREDIT_STATE: DealState = DealState {
        deal: DealStatus::Closed,
        commission: CommissionStatus::Approved,
        payment: PaymentStatus::Pending,
    };

    /// Decides what an adjustment of `amount` writes.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty reason or an amount that rounds to
    /// zero.
    pub fn plan(
        partner_id: PartnerId,
        amount: Decimal,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentPlan, EngineError> {
        let reason = require_reason(reason)?;
        let amount = round_money(amount);

        let credit = (amount > Decimal::ZERO).then(|| CreditDeal {
            deal_id: DealId::new(),
            amount,
            deal_state: Self::CREDIT_STATE,
            credited_at: now,
        });
        let deal_id = credit.as_ref().map(|c| c.deal_id);
        let entry = NewLedgerEntry::adjustment(partner_id, deal_id, amount)
            .with_description(reason.clone());
        entry.validate()?;

        Ok(AdjustmentPlan {
            reason,
            entry,
            credit,
        })
    }
}
