//! Repository abstractions for data access.
//!
//! Every mutating method runs one database transaction: it locks or guards the
//! rows it decides on, writes state, ledger entries and audit records, and
//! commits. Errors roll the whole transaction back.

pub mod academy;
pub mod admin;
pub mod audit;
pub mod deal;
pub mod ledger;
pub mod partner;
pub mod payout;
pub mod sweep;
pub mod tier;

pub use academy::AcademyRepository;
pub use admin::{AdminRepository, DbPasswordGate};
pub use audit::AuditRepository;
pub use deal::{ClosedDeal, DealRepository, DealWithEntry};
pub use ledger::LedgerRepository;
pub use partner::{PartnerRepository, PartnerSummary};
pub use payout::{CompletedBatch, GeneratedBatch, PayoutRepository};
pub use sweep::SweepRepository;
pub use tier::TierRepository;
