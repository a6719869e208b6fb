//! Contracts for collaborators outside the engine.
//!
//! - [`Notifier`] tells partners about changes, after commit
//! - [`PasswordGate`] re-verifies an admin's password before money moves
//! - [`RiskFlagHook`] keeps flagged partners out of payout batches

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use referra_shared::types::{AdminId, PartnerId};

use crate::error::EngineError;

/// Event a partner is notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Tier changed.
    TierChanged,
    /// A deal moved through its lifecycle.
    DealStatusChanged,
    /// A commission was paid out.
    CommissionPaid,
    /// The academy bonus was awarded.
    AcademyBonusAwarded,
}

impl NotificationEvent {
    /// Returns the string representation of the event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TierChanged => "tier_changed",
            Self::DealStatusChanged => "deal_status_changed",
            Self::CommissionPaid => "commission_paid",
            Self::AcademyBonusAwarded => "academy_bonus_awarded",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification waiting to be sent once its transaction committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Recipient.
    pub partner_id: PartnerId,
    /// Event.
    pub event: NotificationEvent,
    /// Event details.
    pub payload: JsonValue,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(partner_id: PartnerId, event: NotificationEvent, payload: JsonValue) -> Self {
        Self {
            partner_id,
            event,
            payload,
        }
    }
}

/// Delivery failure. Never rolls back the change that caused it.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers partner notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one notification.
    async fn notify(
        &self,
        partner_id: PartnerId,
        event: NotificationEvent,
        payload: &JsonValue,
    ) -> Result<(), NotifyError>;
}

/// Re-verifies an admin's password.
#[async_trait]
pub trait PasswordGate: Send + Sync {
    /// Returns `Ok(())` if `password` belongs to `admin`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` on a mismatch or unknown admin; `Persistence` if the
    /// credential store is unavailable.
    async fn verify(&self, admin: AdminId, password: &str) -> Result<(), EngineError>;
}

/// Tells which partners must be held out of payouts.
#[async_trait]
pub trait RiskFlagHook: Send + Sync {
    /// Returns the subset of `candidates` blocked from payout.
    async fn blocked_partners(
        &self,
        candidates: &[PartnerId],
    ) -> Result<HashSet<PartnerId>, EngineError>;
}

/// Risk hook that blocks nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRiskFlags;

#[async_trait]
impl RiskFlagHook for NoRiskFlags {
    async fn blocked_partners(
        &self,
        _candidates: &[PartnerId],
    ) -> Result<HashSet<PartnerId>, EngineError> {
        Ok(HashSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedFlags(HashSet<PartnerId>);

    #[async_trait]
    impl RiskFlagHook for FixedFlags {
        async fn blocked_partners(
            &self,
            candidates: &[PartnerId],
        ) -> Result<HashSet<PartnerId>, EngineError> {
            Ok(candidates
                .iter()
                .filter(|id| self.0.contains(id))
                .copied()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_no_risk_flags_blocks_nobody() {
        let blocked = NoRiskFlags
            .blocked_partners(&[PartnerId::new(), PartnerId::new()])
            .await
            .unwrap();
        assert!(blocked.is_empty());
    }

    #[tokio::test]
    async fn test_hook_returns_subset_of_candidates() {
        let flagged = PartnerId::new();
        let hook: Box<dyn RiskFlagHook> =
            Box::new(FixedFlags(HashSet::from([flagged, PartnerId::new()])));
        let clean = PartnerId::new();

        let blocked = hook.blocked_partners(&[flagged, clean]).await.unwrap();
        assert_eq!(blocked, HashSet::from([flagged]));
    }

    #[test]
    fn test_notification_serializes_event_name() {
        let notification = Notification::new(
            PartnerId::new(),
            NotificationEvent::AcademyBonusAwarded,
            json!({"amount": "100.00"}),
        );
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["event"], "academy_bonus_awarded");
    }
}
