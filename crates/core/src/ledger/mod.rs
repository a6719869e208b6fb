//! Commission ledger.
//!
//! This module implements the append-only ledger model:
//! - Ledger entry types and the rules each entry type must satisfy
//! - Per-type totals aggregated from the journal
//! - The balance calculator that derives pending, approved, paid and debt balances

pub mod balance;
pub mod entry;

#[cfg(test)]
mod balance_props;

pub use balance::{LedgerTotals, PartnerBalance};
pub use entry::{LedgerEntry, LedgerEntryType, NewLedgerEntry};
