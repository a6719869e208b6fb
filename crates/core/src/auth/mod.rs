//! Admin credential checks.
//!
//! Money-moving operations (payout completion) ask the admin for their password
//! again. Hashes are Argon2id PHC strings.

mod password;

pub use password::{PasswordError, hash_password, verify_password};

use crate::error::EngineError;

/// Minimum accepted length for a new admin password.
pub const MIN_PASSWORD_LEN: usize = 12;

/// Re-verifies a password against the stored hash of an admin.
///
/// `stored_hash` is `None` when the admin is unknown; that case reports the
/// same error as a wrong password.
///
/// # Errors
///
/// Returns `EngineError::Unauthorized` on an empty password, an unknown admin,
/// a mismatch or a corrupt stored hash.
pub fn reauthenticate(password: &str, stored_hash: Option<&str>) -> Result<(), EngineError> {
    let failed = || EngineError::Unauthorized("password re-verification failed".to_string());
    if password.is_empty() {
        return Err(failed());
    }
    let hash = stored_hash.ok_or_else(failed)?;
    match verify_password(password, hash) {
        Ok(true) => Ok(()),
        Ok(false) | Err(PasswordError::InvalidHash) => Err(failed()),
        Err(e) => Err(EngineError::Unauthorized(e.to_string())),
    }
}

/// Hashes a new admin password after checking its length.
///
/// # Errors
///
/// `Validation` for a short password, `Persistence` if hashing fails.
pub fn hash_admin_password(password: &str) -> Result<String, EngineError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(EngineError::Validation(format!(
            "admin password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    hash_password(password).map_err(EngineError::persistence)
}
