//! Core business logic for the Referra commission engine.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Every handler in `referra-db` asks this crate what a transition means (new
//! state, ledger entry to append, audit record to write) and then persists the
//! answer inside one database transaction.
//!
//! # Modules
//!
//! - `ledger` - Ledger entry types and the balance calculator
//! - `deal` - Deal lifecycle state machine, corrections and reversals
//! - `tier` - Tier governance (auto-upgrade, manual change, lock, override)
//! - `sweep` - Hold-period eligibility for the commission approval sweep
//! - `payout` - Payout batch planning and completion rules
//! - `academy` - One-time academy completion bonus
//! - `adjustment` - Manual credits and debits
//! - `audit` - Audit trail records
//! - `collaborators` - Contracts for notification, re-authentication and risk hooks

pub mod academy;
pub mod adjustment;
pub mod audit;
pub mod auth;
pub mod collaborators;
pub mod deal;
pub mod error;
pub mod ledger;
pub mod money;
pub mod partner;
pub mod payout;
pub mod policy;
pub mod sweep;
pub mod tier;

pub use error::{EngineError, EngineResult};
pub use policy::CommissionPolicy;
