//! Deal lifecycle state machine.
//!
//! Every operation validates the composite state of the deal, decides the new
//! state and returns what must be written: status fields, at most one ledger
//! entry and the values the audit record needs. Nothing here touches storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::ledger::NewLedgerEntry;
use crate::money::{commission_for, require_reason, validate_positive, validate_rate};
use crate::partner::PartnerRecord;

use super::types::{CommissionStatus, DealRecord, DealState, DealStatus, NewDeal, PaymentStatus};

/// A validated deal registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealRegistration {
    /// Client the deal is with.
    pub client_name: String,
    /// Estimated deal value.
    pub estimated_value: Decimal,
    /// Commission rate, explicit or from the partner's tier.
    pub commission_rate: Decimal,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Initial state.
    pub state: DealState,
}

/// A plain lifecycle transition without financial effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealTransition {
    /// Status before.
    pub from: DealStatus,
    /// Status after.
    pub to: DealStatus,
    /// Full state after.
    pub state: DealState,
    /// Reason, for rejections.
    pub reason: Option<String>,
}

/// A decided approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealApproval {
    /// Status before.
    pub from: DealStatus,
    /// Confirmed deal value.
    pub final_value: Decimal,
    /// Rate applied.
    pub commission_rate: Decimal,
    /// Frozen commission.
    pub commission_amount: Decimal,
    /// Full state after.
    pub state: DealState,
}

/// Everything a first close writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePlan {
    /// Sale date recorded on the deal.
    pub sale_date: DateTime<Utc>,
    /// Full state after.
    pub state: DealState,
    /// `commission_earned` entry; absent for a zero commission.
    pub earned: Option<NewLedgerEntry>,
    /// Amount added to the partner's lifetime referred revenue.
    pub revenue_increment: Decimal,
}

/// Result of a close request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// First close; persist the plan.
    Closed(ClosePlan),
    /// The deal was already closed. Nothing to write.
    AlreadyClosed,
}

/// A decided commission correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionCorrection {
    /// Amount before.
    pub old_amount: Decimal,
    /// Amount after.
    pub new_amount: Decimal,
    /// `new_amount - old_amount`.
    pub delta: Decimal,
    /// Offsetting entry; absent while nothing has been earned yet.
    pub entry: Option<NewLedgerEntry>,
    /// Admin's reason.
    pub reason: String,
}

/// A decided commission reversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionReversal {
    /// Commission status before.
    pub previous: CommissionStatus,
    /// Reversed amount.
    pub amount: Decimal,
    /// Offsetting entry; absent for a zero commission.
    pub entry: Option<NewLedgerEntry>,
    /// Full state after.
    pub state: DealState,
    /// Admin's reason.
    pub reason: String,
}

/// Stateless service for deal lifecycle decisions.
pub struct DealLifecycle;

impl DealLifecycle {
    /// Validates a registration for `partner`.
    ///
    /// # Errors
    ///
    /// * `StateConflict` if the partner is not active
    /// * `Validation` for an empty client name, a non-positive value or a rate
    ///   outside `[0, 1]`
    pub fn register(
        partner: &PartnerRecord,
        input: NewDeal,
    ) -> Result<DealRegistration, EngineError> {
        partner.ensure_active()?;
        let client_name = input.client_name.trim().to_string();
        if client_name.is_empty() {
            return Err(EngineError::Validation("client name is required".to_string()));
        }
        let estimated_value = validate_positive("estimated value", input.estimated_value)?;
        let commission_rate = validate_rate(
            input
                .commission_rate
                .unwrap_or_else(|| partner.tier.tier.default_commission_rate()),
        )?;

        Ok(DealRegistration {
            client_name,
            estimated_value,
            commission_rate,
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            state: DealState::REGISTERED,
        })
    }

    /// Starts review of a registered deal.
    pub fn start_review(deal: &DealRecord) -> Result<DealTransition, EngineError> {
        Self::transition(deal, DealStatus::UnderReview, None)
    }

    /// Approves a deal and freezes its commission.
    ///
    /// `final_value` defaults to the estimated value and `commission_rate` to
    /// the rate registered on the deal.
    ///
    /// # Errors
    ///
    /// * `StateConflict` unless the deal is registered or under review
    /// * `Validation` for a negative value or a rate outside `[0, 1]`
    pub fn approve(
        deal: &DealRecord,
        final_value: Option<Decimal>,
        commission_rate: Option<Decimal>,
    ) -> Result<DealApproval, EngineError> {
        let transition = Self::transition(deal, DealStatus::Approved, None)?;

        let final_value = final_value.unwrap_or(deal.estimated_value);
        if final_value < Decimal::ZERO {
            return Err(EngineError::Validation("final value cannot be negative".to_string()));
        }
        let commission_rate = validate_rate(commission_rate.unwrap_or(deal.commission_rate))?;

        Ok(DealApproval {
            from: transition.from,
            final_value,
            commission_rate,
            commission_amount: commission_for(final_value, commission_rate),
            state: transition.state,
        })
    }

    /// Closes an approved deal.
    ///
    /// Closing an already closed deal is a no-op reported as
    /// [`CloseOutcome::AlreadyClosed`].
    ///
    /// # Errors
    ///
    /// * `StateConflict` unless the deal is approved or closed
    pub fn close(deal: &DealRecord, now: DateTime<Utc>) -> Result<CloseOutcome, EngineError> {
        deal.state().validate()?;
        if deal.deal_status == DealStatus::Closed {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        let transition = Self::transition(deal, DealStatus::Closed, None)?;

        let commission = deal.commission();
        let earned = (!commission.is_zero()).then(|| {
            NewLedgerEntry::commission_earned(deal.partner_id, deal.id, commission)
                .with_description(format!("Commission earned on {}", deal.client_name))
        });

        Ok(CloseOutcome::Closed(ClosePlan {
            sale_date: now,
            state: transition.state,
            earned,
            revenue_increment: deal.final_value.unwrap_or(deal.estimated_value),
        }))
    }

    /// Rejects a deal that has not closed yet.
    ///
    /// # Errors
    ///
    /// * `Validation` if the reason is empty
    /// * `StateConflict` if the deal is closed or already rejected
    pub fn reject(deal: &DealRecord, reason: &str) -> Result<DealTransition, EngineError> {
        let reason = require_reason(reason)?;
        Self::transition(deal, DealStatus::Rejected, Some(reason))
    }

    /// Records that the client paid the program.
    ///
    /// # Errors
    ///
    /// * `StateConflict` unless the deal is closed with payment pending
    pub fn payment_received(deal: &DealRecord) -> Result<DealState, EngineError> {
        let state = deal.state();
        state.validate()?;
        if state.deal != DealStatus::Closed || state.payment != PaymentStatus::Pending {
            return Err(EngineError::invalid_transition(
                "payment",
                state,
                PaymentStatus::Received,
            ));
        }
        let next = DealState {
            payment: PaymentStatus::Received,
            ..state
        };
        next.validate()?;
        Ok(next)
    }

    /// Corrects a frozen commission amount.
    ///
    /// An approved deal only changes its amount. A closed deal whose commission
    /// is approved and not yet batched also gets an offsetting entry: an
    /// `adjustment` for an increase, a `refund` for a decrease.
    ///
    /// # Errors
    ///
    /// * `Validation` for an empty reason, a negative amount or no change
    /// * `StateConflict` in any other state
    pub fn correct_commission(
        deal: &DealRecord,
        new_amount: Decimal,
        reason: &str,
    ) -> Result<CommissionCorrection, EngineError> {
        let reason = require_reason(reason)?;
        deal.state().validate()?;
        if new_amount < Decimal::ZERO {
            return Err(EngineError::Validation(
                "commission amount cannot be negative".to_string(),
            ));
        }
        let old_amount = deal.commission();
        let delta = new_amount - old_amount;
        if delta.is_zero() {
            return Err(EngineError::Validation(
                "corrected amount equals the current amount".to_string(),
            ));
        }

        let entry = match (deal.deal_status, deal.commission_status, deal.payout_batch_id) {
            (DealStatus::Approved, _, _) => None,
            (DealStatus::Closed, CommissionStatus::Approved, None) => {
                let entry = if delta > Decimal::ZERO {
                    NewLedgerEntry::adjustment(deal.partner_id, Some(deal.id), delta)
                } else {
                    NewLedgerEntry::refund(deal.partner_id, deal.id, -delta)
                };
                Some(entry.with_description(format!("Commission correction: {reason}")))
            }
            _ => {
                return Err(EngineError::StateConflict(format!(
                    "commission of a deal in state {} cannot be corrected",
                    deal.state()
                )));
            }
        };

        Ok(CommissionCorrection {
            old_amount,
            new_amount,
            delta,
            entry,
            reason,
        })
    }

    /// Reverses the commission of a closed deal (chargeback).
    ///
    /// * pending: offset with a negative `commission_earned`
    /// * approved outside a batch: `refund`
    /// * paid: `refund`, which can leave the partner in debt
    ///
    /// # Errors
    ///
    /// * `Validation` if the reason is empty
    /// * `StateConflict` for open deals, already reversed commissions and
    ///   approved commissions already placed in a batch
    pub fn reverse_commission(
        deal: &DealRecord,
        reason: &str,
    ) -> Result<CommissionReversal, EngineError> {
        let reason = require_reason(reason)?;
        let state = deal.state();
        state.validate()?;
        if state.deal != DealStatus::Closed {
            return Err(EngineError::invalid_transition(
                "commission",
                state,
                CommissionStatus::Reversed,
            ));
        }

        let amount = deal.commission();
        let entry = match (state.commission, deal.payout_batch_id) {
            (CommissionStatus::Pending, _) => {
                Some(NewLedgerEntry::commission_earned(deal.partner_id, deal.id, -amount))
            }
            (CommissionStatus::Approved, None) | (CommissionStatus::Paid, _) => {
                Some(NewLedgerEntry::refund(deal.partner_id, deal.id, amount))
            }
            (CommissionStatus::Approved, Some(batch)) => {
                return Err(EngineError::StateConflict(format!(
                    "commission is part of payout batch {batch} still processing"
                )));
            }
            (CommissionStatus::Reversed, _) => {
                return Err(EngineError::StateConflict(
                    "commission is already reversed".to_string(),
                ));
            }
        };
        let entry = entry
            .filter(|_| !amount.is_zero())
            .map(|e| e.with_description(format!("Commission reversal: {reason}")));

        Ok(CommissionReversal {
            previous: state.commission,
            amount,
            entry,
            state: DealState {
                commission: CommissionStatus::Reversed,
                ..state
            },
            reason,
        })
    }

    /// Check if a lifecycle status transition is valid.
    ///
    /// Valid transitions:
    /// - Registered → UnderReview
    /// - Registered | UnderReview → Approved
    /// - Approved → Closed
    /// - Registered | UnderReview | Approved → Rejected
    #[must_use]
    pub fn is_valid_transition(from: DealStatus, to: DealStatus) -> bool {
        matches!(
            (from, to),
            (DealStatus::Registered, DealStatus::UnderReview)
                | (
                    DealStatus::Registered | DealStatus::UnderReview,
                    DealStatus::Approved
                )
                | (DealStatus::Approved, DealStatus::Closed)
                | (
                    DealStatus::Registered | DealStatus::UnderReview | DealStatus::Approved,
                    DealStatus::Rejected
                )
        )
    }

    fn transition(
        deal: &DealRecord,
        to: DealStatus,
        reason: Option<String>,
    ) -> Result<DealTransition, EngineError> {
        let state = deal.state();
        state.validate()?;
        if !Self::is_valid_transition(state.deal, to) {
            return Err(EngineError::invalid_transition("deal", state.deal, to));
        }
        let next = DealState { deal: to, ..state };
        next.validate()?;
        Ok(DealTransition {
            from: state.deal,
            to,
            state: next,
            reason,
        })
    }
}
