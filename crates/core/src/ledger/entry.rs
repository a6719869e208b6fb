//! Ledger entries.
//!
//! Entries are immutable once appended. Amounts are signed decimals: the entry
//! type says which balance bucket an amount belongs to, the sign says whether it
//! adds to or offsets that bucket.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use referra_shared::types::{DealId, LedgerEntryId, PartnerId, PayoutBatchId};

use crate::error::EngineError;

/// Kind of financial event recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    /// A deal closed and its commission was earned (still in the hold period).
    CommissionEarned,
    /// The hold period elapsed and the commission became payable.
    CommissionApproved,
    /// The commission was paid out in a completed batch.
    CommissionPaid,
    /// Money taken back from the partner (chargeback, downward correction).
    Refund,
    /// Signed manual correction of the approved balance.
    Adjustment,
    /// One-time academy completion bonus.
    AcademyBonus,
}

impl LedgerEntryType {
    /// All entry types, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::CommissionEarned,
        Self::CommissionApproved,
        Self::CommissionPaid,
        Self::Refund,
        Self::Adjustment,
        Self::AcademyBonus,
    ];

    /// Returns the string representation of the entry type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CommissionEarned => "commission_earned",
            Self::CommissionApproved => "commission_approved",
            Self::CommissionPaid => "commission_paid",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
            Self::AcademyBonus => "academy_bonus",
        }
    }

    /// Parses an entry type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Returns true if entries of this type may carry a negative amount.
    ///
    /// `adjustment` is signed by definition; a negative `commission_earned`
    /// reverses a commission still inside its hold period.
    #[must_use]
    pub const fn allows_negative(&self) -> bool {
        matches!(self, Self::CommissionEarned | Self::Adjustment)
    }
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID (UUID v7, time ordered).
    pub id: LedgerEntryId,
    /// Partner whose balance the entry affects.
    pub partner_id: PartnerId,
    /// Entry type.
    pub entry_type: LedgerEntryType,
    /// Signed amount.
    pub amount: Decimal,
    /// Deal that caused the entry, if any.
    pub related_deal_id: Option<DealId>,
    /// Payout batch that caused the entry, if any.
    pub batch_id: Option<PayoutBatchId>,
    /// Human-readable description.
    pub description: Option<String>,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

/// An entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    /// Partner whose balance the entry affects.
    pub partner_id: PartnerId,
    /// Entry type.
    pub entry_type: LedgerEntryType,
    /// Signed amount.
    pub amount: Decimal,
    /// Deal that caused the entry, if any.
    pub related_deal_id: Option<DealId>,
    /// Payout batch that caused the entry, if any.
    pub batch_id: Option<PayoutBatchId>,
    /// Human-readable description.
    pub description: Option<String>,
}

impl NewLedgerEntry {
    fn for_deal(
        partner_id: PartnerId,
        deal_id: DealId,
        entry_type: LedgerEntryType,
        amount: Decimal,
    ) -> Self {
        Self {
            partner_id,
            entry_type,
            amount,
            related_deal_id: Some(deal_id),
            batch_id: None,
            description: None,
        }
    }

    /// Commission earned when a deal closes.
    #[must_use]
    pub fn commission_earned(partner_id: PartnerId, deal_id: DealId, amount: Decimal) -> Self {
        Self::for_deal(partner_id, deal_id, LedgerEntryType::CommissionEarned, amount)
    }

    /// Commission promoted out of the hold period.
    #[must_use]
    pub fn commission_approved(partner_id: PartnerId, deal_id: DealId, amount: Decimal) -> Self {
        Self::for_deal(partner_id, deal_id, LedgerEntryType::CommissionApproved, amount)
    }

    /// Commission settled by a completed payout batch.
    #[must_use]
    pub fn commission_paid(
        partner_id: PartnerId,
        deal_id: DealId,
        batch_id: PayoutBatchId,
        amount: Decimal,
    ) -> Self {
        Self {
            batch_id: Some(batch_id),
            ..Self::for_deal(partner_id, deal_id, LedgerEntryType::CommissionPaid, amount)
        }
    }

    /// Refund tied to a deal.
    #[must_use]
    pub fn refund(partner_id: PartnerId, deal_id: DealId, amount: Decimal) -> Self {
        Self::for_deal(partner_id, deal_id, LedgerEntryType::Refund, amount)
    }

    /// Signed adjustment, optionally tied to a deal.
    #[must_use]
    pub fn adjustment(partner_id: PartnerId, deal_id: Option<DealId>, amount: Decimal) -> Self {
        Self {
            partner_id,
            entry_type: LedgerEntryType::Adjustment,
            amount,
            related_deal_id: deal_id,
            batch_id: None,
            description: None,
        }
    }

    /// Academy completion bonus, recorded against its synthetic deal.
    #[must_use]
    pub fn academy_bonus(partner_id: PartnerId, deal_id: DealId, amount: Decimal) -> Self {
        Self::for_deal(partner_id, deal_id, LedgerEntryType::AcademyBonus, amount)
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the amount against the rules of the entry type.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for zero amounts and for negative
    /// amounts on types that only move forward.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.amount.is_zero() {
            return Err(EngineError::Validation(format!(
                "{} entry amount cannot be zero",
                self.entry_type
            )));
        }
        if self.amount.is_sign_negative() && !self.entry_type.allows_negative() {
            return Err(EngineError::Validation(format!(
                "{} entry amount cannot be negative",
                self.entry_type
            )));
        }
        if self.entry_type == LedgerEntryType::CommissionPaid && self.batch_id.is_none() {
            return Err(EngineError::Validation(
                "commission_paid entry must reference a payout batch".to_string(),
            ));
        }
        Ok(())
    }
}
