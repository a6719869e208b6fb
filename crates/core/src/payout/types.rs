//! Payout batch domain types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use referra_shared::types::{DealId, PartnerId, PayoutBatchId};

use crate::audit::Actor;
use crate::error::EngineError;

/// Calendar month a payout batch belongs to, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayoutMonth {
    year: i32,
    month: u32,
}

impl PayoutMonth {
    /// Creates a payout month.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a month outside 1..=12 or a year outside
    /// 2000..=9999.
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) || !(2000..=9999).contains(&year) {
            return Err(EngineError::Validation(format!(
                "invalid payout month {year}-{month:02}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month (1-12).
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for PayoutMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PayoutMonth {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::Validation(format!("payout month must be YYYY-MM, got {s}"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl Serialize for PayoutMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PayoutMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Payout batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutBatchStatus {
    /// Generated, waiting for the transfer to be confirmed.
    Processing,
    /// Paid out; terminal.
    Completed,
}

impl PayoutBatchStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for PayoutBatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payout batch as the business rules see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutBatchRecord {
    /// Batch ID.
    pub id: PayoutBatchId,
    /// Month the batch pays out.
    pub payout_month: PayoutMonth,
    /// Scheduled transfer date.
    pub payout_date: NaiveDate,
    /// Σ transferred to the included partners.
    pub total_amount: Decimal,
    /// Status.
    pub status: PayoutBatchStatus,
    /// Bank or transfer reference, set on completion.
    pub reference_number: Option<String>,
    /// Partners in the batch.
    pub partner_count: i32,
    /// Deals in the batch.
    pub deal_count: i32,
    /// Who generated the batch.
    pub created_by: Actor,
    /// Who completed the batch.
    pub completed_by: Option<Actor>,
    /// When the batch was completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// An approved, unbatched commission offered to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayableDeal {
    /// Deal.
    pub deal_id: DealId,
    /// Partner owed the commission.
    pub partner_id: PartnerId,
    /// Commission amount.
    pub amount: Decimal,
}

/// What a batch transfers for one deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DealPayout {
    /// Deal.
    pub deal_id: DealId,
    /// Commission of the deal.
    pub commission: Decimal,
    /// Amount transferred; below `commission` when the deal absorbed debt.
    pub amount: Decimal,
}

/// One partner's share of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerPayout {
    /// Partner.
    pub partner_id: PartnerId,
    /// Amount transferred to the partner.
    pub amount: Decimal,
    /// Commission withheld to settle debt and negative adjustments.
    pub offset: Decimal,
    /// Included deals, in allocation order.
    pub deals: Vec<DealPayout>,
}

/// A decided payout batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    /// Month the batch pays out.
    pub payout_month: PayoutMonth,
    /// Scheduled transfer date.
    pub payout_date: NaiveDate,
    /// Σ of every partner payout.
    pub total_amount: Decimal,
    /// Per-partner breakdown, ordered by partner id.
    pub partners: Vec<PartnerPayout>,
}

impl BatchPlan {
    /// Every included deal with its allocation.
    pub fn deal_payouts(&self) -> impl Iterator<Item = &DealPayout> + '_ {
        self.partners.iter().flat_map(|p| p.deals.iter())
    }

    /// Number of included deals.
    #[must_use]
    pub fn deal_count(&self) -> usize {
        self.partners.iter().map(|p| p.deals.len()).sum()
    }
}
