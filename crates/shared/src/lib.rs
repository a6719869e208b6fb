//! Shared types, errors, and configuration for Referra.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT claims and token validation for the admin API

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::{ADMIN_ROLE, Claims, PARTNER_ROLE, SCHEDULER_ROLE};
pub use config::{AppConfig, CommissionConfig};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
