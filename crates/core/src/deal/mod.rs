//! Referred deals.
//!
//! - `types` - Status axes, composite state and deal records
//! - `service` - Lifecycle transitions, corrections and reversals

pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use service::{
    ClosePlan, CloseOutcome, CommissionCorrection, CommissionReversal, DealApproval,
    DealLifecycle, DealRegistration, DealTransition,
};
pub use types::{CommissionStatus, DealRecord, DealState, DealStatus, NewDeal, PaymentStatus};
