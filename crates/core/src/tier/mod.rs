//! Partner tier governance.
//!
//! - `types` - Tier, thresholds and governance state
//! - `service` - Automatic upgrades, manual changes, lock and override

pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use service::TierGovernance;
pub use types::{Tier, TierChange, TierFlagChange, TierStatus, TierThresholds};
