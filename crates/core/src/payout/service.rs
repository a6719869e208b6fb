//! Payout batch planning and completion rules.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use referra_shared::types::{PartnerId, PayoutBatchId};

use crate::deal::{CommissionStatus, DealRecord, DealState, DealStatus, PaymentStatus};
use crate::error::EngineError;
use crate::ledger::{NewLedgerEntry, PartnerBalance};
use crate::partner::PartnerStatus;

use super::types::{
    BatchPlan, DealPayout, PartnerPayout, PayableDeal, PayoutBatchRecord, PayoutBatchStatus,
    PayoutMonth,
};

/// A partner considered for a payout batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutCandidate {
    /// Partner account status.
    pub status: PartnerStatus,
    /// Derived balance.
    pub balance: PartnerBalance,
    /// Already allocated to batches that are still processing.
    pub in_flight: Decimal,
}

impl PayoutCandidate {
    /// Approved balance not yet promised to a processing batch.
    #[must_use]
    pub fn payable(&self) -> Decimal {
        (self.balance.approved_balance - self.in_flight).max(Decimal::ZERO)
    }
}

/// What completing a batch writes for one deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealSettlement {
    /// State after payment.
    pub state: DealState,
    /// `commission_paid` entry; absent when nothing is transferred.
    pub entry: Option<NewLedgerEntry>,
}

/// Stateless service for payout batch decisions.
pub struct PayoutService;

impl PayoutService {
    /// Partners whose payable balance reaches the threshold, with that balance.
    ///
    /// Inactive and risk-blocked partners are left out. Keys are ordered by
    /// partner id so that row locks are always taken in the same order.
    #[must_use]
    pub fn eligible_partners(
        candidates: &[PayoutCandidate],
        threshold: Decimal,
        blocked: &HashSet<PartnerId>,
    ) -> BTreeMap<PartnerId, Decimal> {
        candidates
            .iter()
            .filter(|c| c.status == PartnerStatus::Active)
            .filter(|c| !blocked.contains(&c.balance.partner_id))
            .map(|c| (c.balance.partner_id, c.payable()))
            .filter(|(_, payable)| *payable >= threshold)
            .collect()
    }

    /// Groups payable deals into a batch plan.
    ///
    /// Each partner is paid at most their payable balance. The balance is
    /// spread over the partner's deals in the given order; a deal that gets
    /// less than its commission absorbed debt or a negative adjustment, and is
    /// still settled with the batch.
    ///
    /// # Errors
    ///
    /// Returns `NoEligiblePartners` when there is nothing to pay.
    pub fn plan_batch(
        payout_month: PayoutMonth,
        payout_date: NaiveDate,
        deals: &[PayableDeal],
        payable: &BTreeMap<PartnerId, Decimal>,
    ) -> Result<BatchPlan, EngineError> {
        let mut remaining = payable.clone();
        let mut by_partner: BTreeMap<PartnerId, PartnerPayout> = BTreeMap::new();
        for deal in deals.iter().filter(|d| d.amount > Decimal::ZERO) {
            let Some(left) = remaining.get_mut(&deal.partner_id) else {
                continue;
            };
            let amount = deal.amount.min(*left);
            *left -= amount;

            let payout = by_partner.entry(deal.partner_id).or_insert_with(|| PartnerPayout {
                partner_id: deal.partner_id,
                amount: Decimal::ZERO,
                offset: Decimal::ZERO,
                deals: Vec::new(),
            });
            payout.amount += amount;
            payout.offset += deal.amount - amount;
            payout.deals.push(DealPayout {
                deal_id: deal.deal_id,
                commission: deal.amount,
                amount,
            });
        }

        let partners: Vec<PartnerPayout> = by_partner
            .into_values()
            .filter(|p| p.amount > Decimal::ZERO)
            .collect();
        if partners.is_empty() {
            return Err(EngineError::NoEligiblePartners);
        }

        let total_amount = partners.iter().map(|p| p.amount).sum();
        Ok(BatchPlan {
            payout_month,
            payout_date,
            total_amount,
            partners,
        })
    }

    /// Checks a completion request against the batch.
    ///
    /// Returns the trimmed transaction reference.
    ///
    /// # Errors
    ///
    /// * `Validation` if the reference is empty
    /// * `AlreadyCompleted` if the batch was completed before
    pub fn validate_completion(
        batch: &PayoutBatchRecord,
        transaction_reference: &str,
    ) -> Result<String, EngineError> {
        let reference = Self::require_reference(transaction_reference)?;
        if batch.status == PayoutBatchStatus::Completed {
            return Err(EngineError::AlreadyCompleted(batch.id));
        }
        Ok(reference)
    }

    /// Trims the transfer reference and fails with `Validation` if it is empty.
    pub fn require_reference(transaction_reference: &str) -> Result<String, EngineError> {
        let reference = transaction_reference.trim();
        if reference.is_empty() {
            return Err(EngineError::Validation(
                "transaction reference is required".to_string(),
            ));
        }
        Ok(reference.to_string())
    }

    /// Decides what paying one batched deal writes.
    ///
    /// Returns `Ok(None)` for a deal reversed after the batch was generated.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if the deal is not an approved commission of
    /// this batch.
    pub fn settle_deal(
        deal: &DealRecord,
        batch_id: PayoutBatchId,
    ) -> Result<Option<DealSettlement>, EngineError> {
        if deal.payout_batch_id != Some(batch_id) {
            return Err(EngineError::StateConflict(format!(
                "deal {} is not part of payout batch {batch_id}",
                deal.id
            )));
        }
        let state = deal.state();
        match (state.deal, state.commission) {
            (_, CommissionStatus::Reversed) => Ok(None),
            (DealStatus::Closed, CommissionStatus::Approved) => {
                let commission = deal.commission();
                let amount = deal.payout_amount.unwrap_or(commission);
                let entry = (!amount.is_zero()).then(|| {
                    let description = if amount < commission {
                        let offset = commission - amount;
                        format!("Paid in batch {batch_id}, {offset} offset against debt")
                    } else {
                        format!("Paid in batch {batch_id}")
                    };
                    NewLedgerEntry::commission_paid(deal.partner_id, deal.id, batch_id, amount)
                        .with_description(description)
                });
                let next = DealState {
                    commission: CommissionStatus::Paid,
                    payment: PaymentStatus::CommissionPaid,
                    ..state
                };
                next.validate()?;
                Ok(Some(DealSettlement { state: next, entry }))
            }
            _ => Err(EngineError::invalid_transition(
                "commission",
                state,
                CommissionStatus::Paid,
            )),
        }
    }
}
