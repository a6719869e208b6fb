//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration.

pub use sea_orm_migration::prelude::*;

mod m20261019_000001_commission_ledger;
mod m20261026_000002_deal_payout_amount;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261019_000001_commission_ledger::Migration),
            Box::new(m20261026_000002_deal_payout_amount::Migration),
        ]
    }
}
