//! `SeaORM` entity definitions.

pub mod admin_users;
pub mod audit_logs;
pub mod deals;
pub mod ledger_entries;
pub mod partners;
pub mod payout_batches;
pub mod sea_orm_active_enums;
