//! Partner records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use referra_shared::types::PartnerId;

use crate::error::EngineError;
use crate::tier::{Tier, TierStatus};

/// Partner account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    /// May register deals and receive payouts.
    Active,
    /// Temporarily excluded from new deals and payouts.
    Suspended,
    /// Permanently excluded.
    Terminated,
}

impl PartnerStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for PartnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Partner as the business rules see it. Balances are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRecord {
    /// Partner ID.
    pub id: PartnerId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Account status.
    pub status: PartnerStatus,
    /// Tier and its governance flags.
    pub tier: TierStatus,
    /// Σ final value of every closed deal.
    pub lifetime_referred_revenue: Decimal,
    /// Whether the one-time academy bonus was awarded.
    pub has_received_academy_bonus: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl PartnerRecord {
    /// Fails unless the partner may take part in new business.
    pub fn ensure_active(&self) -> Result<(), EngineError> {
        if self.status == PartnerStatus::Active {
            Ok(())
        } else {
            Err(EngineError::StateConflict(format!(
                "partner {} is {}",
                self.id, self.status
            )))
        }
    }
}

/// Input for creating a partner.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPartner {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Starting tier; defaults to referral.
    #[serde(default)]
    pub tier: Option<Tier>,
}

impl NewPartner {
    /// Trims and validates the input.
    pub fn validate(self) -> Result<Self, EngineError> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_lowercase();
        if name.is_empty() {
            return Err(EngineError::Validation("partner name is required".to_string()));
        }
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(EngineError::Validation(format!("invalid email: {email}")));
        }
        Ok(Self {
            name,
            email,
            tier: self.tier,
        })
    }

    /// Starting tier.
    #[must_use]
    pub fn starting_tier(&self) -> Tier {
        self.tier.unwrap_or(Tier::Referral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, email: &str) -> NewPartner {
        NewPartner {
            name: name.to_string(),
            email: email.to_string(),
            tier: None,
        }
    }

    #[test]
    fn test_validate_normalizes() {
        let partner = input("  Acme Referrals ", " Ops@Acme.io ").validate().unwrap();
        assert_eq!(partner.name, "Acme Referrals");
        assert_eq!(partner.email, "ops@acme.io");
        assert_eq!(partner.starting_tier(), Tier::Referral);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(input("", "a@b.io").validate().is_err());
        assert!(input("Acme", "not-an-email").validate().is_err());
        assert!(input("Acme", "@acme.io").validate().is_err());
    }

    #[test]
    fn test_ensure_active() {
        let mut partner = PartnerRecord {
            id: PartnerId::new(),
            name: "Acme".to_string(),
            email: "ops@acme.io".to_string(),
            status: PartnerStatus::Active,
            tier: TierStatus::new(Tier::Referral),
            lifetime_referred_revenue: Decimal::ZERO,
            has_received_academy_bonus: false,
            created_at: Utc::now(),
        };
        assert!(partner.ensure_active().is_ok());

        partner.status = PartnerStatus::Suspended;
        assert!(matches!(
            partner.ensure_active(),
            Err(EngineError::StateConflict(_))
        ));
    }
}
