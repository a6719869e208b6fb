//! Deal domain types.
//!
//! A deal carries three status axes. They are validated together as one
//! composite [`DealState`] so that combinations such as "rejected but paid"
//! can never be persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use referra_shared::types::{DealId, PartnerId, PayoutBatchId};

use crate::error::EngineError;

/// Lifecycle status of a referred deal.
///
/// Valid transitions:
/// - Registered → UnderReview (start review)
/// - Registered | UnderReview → Approved (approve)
/// - Approved → Closed (close)
/// - Registered | UnderReview | Approved → Rejected (reject)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    /// Submitted by the partner.
    Registered,
    /// Being reviewed by the program.
    UnderReview,
    /// Approved; commission amount frozen.
    Approved,
    /// Sale completed; commission earned.
    Closed,
    /// Rejected; terminal.
    Rejected,
}

impl DealStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(Self::Registered),
            "under_review" => Some(Self::UnderReview),
            "approved" => Some(Self::Approved),
            "closed" => Some(Self::Closed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true for statuses that happen before the sale closes.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Registered | Self::UnderReview | Self::Approved)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Commission axis of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    /// Not yet earned, or earned and inside the hold period.
    Pending,
    /// Hold period elapsed; payable.
    Approved,
    /// Charged back.
    Reversed,
    /// Paid out in a completed batch.
    Paid,
}

impl CommissionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Reversed => "reversed",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client payment axis of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Client has not paid yet.
    Pending,
    /// Client paid the program.
    Received,
    /// The partner's commission was paid out.
    CommissionPaid,
}

impl PaymentStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Received => "received",
            Self::CommissionPaid => "commission_paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three status axes of a deal taken together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealState {
    /// Lifecycle axis.
    pub deal: DealStatus,
    /// Commission axis.
    pub commission: CommissionStatus,
    /// Payment axis.
    pub payment: PaymentStatus,
}

impl DealState {
    /// State of a freshly registered deal.
    pub const REGISTERED: Self = Self {
        deal: DealStatus::Registered,
        commission: CommissionStatus::Pending,
        payment: PaymentStatus::Pending,
    };

    /// Returns true if the combination of axes is allowed.
    ///
    /// | deal | commission | payment |
    /// |---|---|---|
    /// | registered, under_review, approved, rejected | pending | pending |
    /// | closed | pending, approved | pending, received |
    /// | closed | reversed | any |
    /// | closed | paid | commission_paid |
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        use CommissionStatus as C;
        use PaymentStatus as P;

        match self.deal {
            DealStatus::Registered
            | DealStatus::UnderReview
            | DealStatus::Approved
            | DealStatus::Rejected => {
                matches!(self.commission, C::Pending) && matches!(self.payment, P::Pending)
            }
            DealStatus::Closed => matches!(
                (self.commission, self.payment),
                (C::Pending | C::Approved, P::Pending | P::Received)
                    | (C::Reversed, _)
                    | (C::Paid, P::CommissionPaid)
            ),
        }
    }

    /// Fails with `StateConflict` if the combination of axes is not allowed.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(EngineError::StateConflict(format!("invalid deal state {self}")))
        }
    }
}

impl fmt::Display for DealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.deal, self.commission, self.payment
        )
    }
}

/// A deal as the business rules see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRecord {
    /// Deal ID.
    pub id: DealId,
    /// Referring partner.
    pub partner_id: PartnerId,
    /// Client the deal is with.
    pub client_name: String,
    /// Value estimated at registration.
    pub estimated_value: Decimal,
    /// Value confirmed at approval.
    pub final_value: Option<Decimal>,
    /// Commission rate between 0 and 1.
    pub commission_rate: Decimal,
    /// Commission frozen at approval.
    pub commission_amount: Option<Decimal>,
    /// Lifecycle axis.
    pub deal_status: DealStatus,
    /// Commission axis.
    pub commission_status: CommissionStatus,
    /// Payment axis.
    pub payment_status: PaymentStatus,
    /// When the deal closed.
    pub sale_date: Option<DateTime<Utc>>,
    /// When the commission left the hold period.
    pub approval_date: Option<DateTime<Utc>>,
    /// Batch the commission was included in.
    pub payout_batch_id: Option<PayoutBatchId>,
    /// Amount the batch transfers for this deal, net of any debt it absorbed.
    pub payout_amount: Option<Decimal>,
    /// Set on the record backing an academy bonus or an adjustment credit.
    pub is_synthetic: bool,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Reason given on rejection.
    pub rejection_reason: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter.
    pub version: i32,
}

impl DealRecord {
    /// Returns the composite state.
    #[must_use]
    pub const fn state(&self) -> DealState {
        DealState {
            deal: self.deal_status,
            commission: self.commission_status,
            payment: self.payment_status,
        }
    }

    /// Commission amount, zero if not yet fixed.
    #[must_use]
    pub fn commission(&self) -> Decimal {
        self.commission_amount.unwrap_or(Decimal::ZERO)
    }
}

/// Input for registering a deal.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDeal {
    /// Client the deal is with.
    pub client_name: String,
    /// Estimated deal value.
    pub estimated_value: Decimal,
    /// Commission rate; defaults to the partner tier's rate.
    #[serde(default)]
    pub commission_rate: Option<Decimal>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_state_is_valid() {
        assert!(DealState::REGISTERED.is_valid());
    }

    #[test]
    fn test_open_deal_cannot_be_paid() {
        let state = DealState {
            deal: DealStatus::Approved,
            commission: CommissionStatus::Paid,
            payment: PaymentStatus::CommissionPaid,
        };
        assert!(!state.is_valid());
        assert!(matches!(state.validate(), Err(EngineError::StateConflict(_))));
    }

    #[test]
    fn test_rejected_cannot_receive_payment() {
        let state = DealState {
            deal: DealStatus::Rejected,
            commission: CommissionStatus::Pending,
            payment: PaymentStatus::Received,
        };
        assert!(!state.is_valid());
    }

    #[test]
    fn test_closed_combinations() {
        let closed = |commission, payment| DealState {
            deal: DealStatus::Closed,
            commission,
            payment,
        };
        assert!(closed(CommissionStatus::Pending, PaymentStatus::Received).is_valid());
        assert!(closed(CommissionStatus::Paid, PaymentStatus::CommissionPaid).is_valid());
        assert!(closed(CommissionStatus::Reversed, PaymentStatus::CommissionPaid).is_valid());
        assert!(!closed(CommissionStatus::Paid, PaymentStatus::Received).is_valid());
        assert!(!closed(CommissionStatus::Approved, PaymentStatus::CommissionPaid).is_valid());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(DealState::REGISTERED.to_string(), "registered/pending/pending");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(DealStatus::parse("under_review"), Some(DealStatus::UnderReview));
        assert_eq!(DealStatus::parse("won"), None);
        assert!(DealStatus::Approved.is_open());
        assert!(!DealStatus::Closed.is_open());
    }
}
