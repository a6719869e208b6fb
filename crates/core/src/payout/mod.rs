//! Monthly payout batches.
//!
//! - `types` - Payout month, batch status and batch plans
//! - `service` - Eligibility, batch planning and completion rules

pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use service::{DealSettlement, PayoutCandidate, PayoutService};
pub use types::{
    BatchPlan, DealPayout, PartnerPayout, PayableDeal, PayoutBatchRecord, PayoutBatchStatus,
    PayoutMonth,
};
