//! Audit trail records.
//!
//! Every privileged mutation writes one record in the same transaction as the
//! mutation itself. Records are append-only.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use referra_shared::types::AdminId;

/// Kind of entity an audit record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    /// A partner (tier changes, bonus, adjustments).
    Partner,
    /// A deal (lifecycle transitions, corrections, reversals).
    Deal,
    /// A payout batch.
    PayoutBatch,
}

impl AuditEntityType {
    /// Returns the string representation of the entity type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Partner => "partner",
            Self::Deal => "deal",
            Self::PayoutBatch => "payout_batch",
        }
    }

    /// Parses an entity type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "partner" => Some(Self::Partner),
            "deal" => Some(Self::Deal),
            "payout_batch" => Some(Self::PayoutBatch),
            _ => None,
        }
    }
}

impl fmt::Display for AuditEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Partner created.
    PartnerCreated,
    /// Tier changed automatically or manually.
    TierChanged,
    /// Tier locked.
    TierLocked,
    /// Tier unlocked.
    TierUnlocked,
    /// Tier override flag set or cleared.
    TierOverrideChanged,
    /// Manual ledger adjustment.
    ManualAdjustment,
    /// Academy bonus awarded.
    AcademyBonusAwarded,
    /// Deal registered.
    DealRegistered,
    /// Deal moved to another lifecycle status.
    DealStatusChanged,
    /// Client payment recorded.
    PaymentReceived,
    /// Commission amount corrected.
    CommissionCorrected,
    /// Commission reversed (chargeback).
    CommissionReversed,
    /// Payout batch generated.
    PayoutBatchCreated,
    /// Payout batch completed.
    PayoutBatchCompleted,
}

impl AuditAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PartnerCreated => "partner_created",
            Self::TierChanged => "tier_changed",
            Self::TierLocked => "tier_locked",
            Self::TierUnlocked => "tier_unlocked",
            Self::TierOverrideChanged => "tier_override_changed",
            Self::ManualAdjustment => "manual_adjustment",
            Self::AcademyBonusAwarded => "academy_bonus_awarded",
            Self::DealRegistered => "deal_registered",
            Self::DealStatusChanged => "deal_status_changed",
            Self::PaymentReceived => "payment_received",
            Self::CommissionCorrected => "commission_corrected",
            Self::CommissionReversed => "commission_reversed",
            Self::PayoutBatchCreated => "payout_batch_created",
            Self::PayoutBatchCompleted => "payout_batch_completed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who performed an action. Serialized as `"system"` or the admin's UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The engine itself (sweep, automatic tier upgrade).
    System,
    /// An authenticated administrator.
    Admin(AdminId),
}

impl Actor {
    /// Stored form of the system actor.
    pub const SYSTEM: &'static str = "system";

    /// Parses the stored form back into an actor.
    pub fn parse(s: &str) -> Option<Self> {
        if s == Self::SYSTEM {
            return Some(Self::System);
        }
        Uuid::parse_str(s).ok().map(|id| Self::Admin(AdminId::from_uuid(id)))
    }

    /// Admin id, if an admin acted.
    #[must_use]
    pub const fn admin_id(&self) -> Option<AdminId> {
        match self {
            Self::System => None,
            Self::Admin(id) => Some(*id),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "{}", Self::SYSTEM),
            Self::Admin(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for Actor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid actor: {s}")))
    }
}

/// An audit record waiting to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    /// Kind of entity.
    pub entity_type: AuditEntityType,
    /// Entity id.
    pub entity_id: Uuid,
    /// Action performed.
    pub action: AuditAction,
    /// Who performed it.
    pub performed_by: Actor,
    /// Structured details (old/new values, reason).
    pub metadata: JsonValue,
}

impl NewAuditRecord {
    /// Creates a record with empty metadata.
    pub fn new(
        entity_type: AuditEntityType,
        entity_id: impl Into<Uuid>,
        action: AuditAction,
        performed_by: Actor,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            action,
            performed_by,
            metadata: JsonValue::Object(serde_json::Map::new()),
        }
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}
