//! Error taxonomy of the commission engine.
//!
//! Every financial mutation that fails with one of these errors is rolled back
//! as a whole; no partial ledger writes survive an `Err`.

use std::fmt::Display;

use thiserror::Error;
use uuid::Uuid;

use referra_shared::types::{PartnerId, PayoutBatchId};

/// Result type alias using `EngineError`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during commission engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input, e.g. a missing transaction reference or an empty reason.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested transition is not allowed from the current state.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// The partner's tier is locked; unlock it before changing tiers.
    #[error("Tier is locked for partner {0}")]
    TierLocked(PartnerId),

    /// The payout batch has already been completed.
    #[error("Payout batch {0} is already completed")]
    AlreadyCompleted(PayoutBatchId),

    /// No partner qualified for a payout batch.
    #[error("No partners are eligible for payout")]
    NoEligiblePartners,

    /// Entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (partner, deal, payout batch).
        entity: &'static str,
        /// The identifier that was looked up.
        id: Uuid,
    },

    /// Secondary authorization (password re-verification) failed.
    #[error("Re-authentication failed: {0}")]
    Unauthorized(String),

    /// Storage or transaction failure.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Builds a `StateConflict` for a disallowed transition.
    pub fn invalid_transition(entity: &str, from: impl Display, to: impl Display) -> Self {
        Self::StateConflict(format!("{entity} cannot move from {from} to {to}"))
    }

    /// Builds a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wraps a storage error.
    pub fn persistence(err: impl Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StateConflict(_) => "STATE_CONFLICT",
            Self::TierLocked(_) => "TIER_LOCKED",
            Self::AlreadyCompleted(_) => "ALREADY_COMPLETED",
            Self::NoEligiblePartners => "NO_ELIGIBLE_PARTNERS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized(_) => "REAUTHENTICATION_FAILED",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound { .. } => 404,
            Self::StateConflict(_) | Self::AlreadyCompleted(_) => 409,
            Self::NoEligiblePartners => 422,
            Self::TierLocked(_) => 423,
            Self::Persistence(_) => 500,
        }
    }

    /// Returns true if the caller may retry the operation unchanged.
    ///
    /// Batch completion must still be checked for `AlreadyCompleted` before a
    /// retry; the guard in the completer makes that retry safe.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
