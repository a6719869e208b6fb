//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Transactional repositories for every engine operation
//! - Database migrations
//! - The default notifier and password gate

pub mod entities;
pub mod migration;
pub mod notify;
pub mod repositories;

mod convert;

pub use notify::TracingNotifier;
pub use repositories::{
    AcademyRepository, AdminRepository, AuditRepository, DbPasswordGate, DealRepository,
    LedgerRepository, PartnerRepository, PayoutRepository, SweepRepository, TierRepository,
};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with_pool(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(max_connections)
        .min_connections(min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
