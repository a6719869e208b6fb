//! Authentication claims carried by admin and partner-portal tokens.
//!
//! Tokens are issued by the external auth service; this crate only models and
//! validates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role granted to program administrators.
pub const ADMIN_ROLE: &str = "admin";

/// Role of partner-portal callers; the subject is the partner's ID.
pub const PARTNER_ROLE: &str = "partner";

/// Role of the job scheduler that triggers approval sweeps.
pub const SCHEDULER_ROLE: &str = "scheduler";

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Caller role (`admin`, `partner`, `scheduler`).
    pub role: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(user_id: Uuid, role: &str, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns true if the caller is a program administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    /// Returns true if the caller may read or act on `partner_id`'s data.
    ///
    /// Admins see every partner; a partner-portal token only its own subject.
    #[must_use]
    pub fn can_access_partner(&self, partner_id: Uuid) -> bool {
        self.is_admin() || (self.role == PARTNER_ROLE && self.sub == partner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_new_sets_fields() {
        let user_id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::hours(1);
        let claims = Claims::new(user_id, "admin", expires_at);

        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.exp, expires_at.timestamp());
        assert!(claims.iat <= Utc::now().timestamp());
        assert!(claims.is_admin());
    }

    #[test]
    fn test_partner_sees_only_itself() {
        let partner_id = Uuid::new_v4();
        let claims = Claims::new(partner_id, PARTNER_ROLE, Utc::now());
        assert!(claims.can_access_partner(partner_id));
        assert!(!claims.can_access_partner(Uuid::new_v4()));

        let admin = Claims::new(Uuid::new_v4(), ADMIN_ROLE, Utc::now());
        assert!(admin.can_access_partner(partner_id));

        let scheduler = Claims::new(partner_id, SCHEDULER_ROLE, Utc::now());
        assert!(!scheduler.can_access_partner(partner_id));
    }

    #[test]
    fn test_partner_is_not_admin() {
        let claims = Claims::new(Uuid::new_v4(), "partner", Utc::now());
        assert!(!claims.is_admin());
    }
}
