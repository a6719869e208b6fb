//! Tier governance persistence.
//!
//! Every change locks the partner row, asks [`TierGovernance`] for a decision,
//! writes it with its audit record in one transaction and notifies the partner
//! after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde_json::json;
use tracing::{info, warn};

use referra_core::audit::{AuditAction, AuditEntityType, NewAuditRecord};
use referra_core::collaborators::{Notification, NotificationEvent, Notifier};
use referra_core::error::EngineError;
use referra_core::partner::PartnerRecord;
use referra_core::tier::{
    Tier, TierChange, TierFlagChange, TierGovernance, TierStatus, TierThresholds,
};
use referra_shared::types::{AdminId, PartnerId};

use crate::convert::stamp;
use crate::entities::partners;
use crate::notify::dispatch;

use super::audit;
use super::partner::lock_partner;

fn write_status(active: &mut partners::ActiveModel, status: &TierStatus) {
    active.tier = Set(status.tier.into());
    active.tier_override = Set(status.tier_override);
    active.tier_locked = Set(status.tier_locked);
    active.tier_override_reason = Set(status.tier_override_reason.clone());
    active.tier_last_changed_at = Set(status.tier_last_changed_at.map(stamp));
    active.tier_last_changed_by = Set(status.tier_last_changed_by.clone());
}

pub(crate) fn tier_notification(partner_id: PartnerId, change: &TierChange) -> Notification {
    Notification::new(
        partner_id,
        NotificationEvent::TierChanged,
        json!({
            "old_tier": change.old_tier,
            "new_tier": change.new_tier,
            "reason": change.reason,
        }),
    )
}

/// Persists a decided tier change and its audit record.
async fn write_change<C: ConnectionTrait>(
    conn: &C,
    model: partners::Model,
    change: &TierChange,
) -> Result<(), EngineError> {
    let partner_id = model.id;
    let current: PartnerRecord = model.clone().into();
    let next = TierGovernance::apply(&current.tier, change);

    let mut active: partners::ActiveModel = model.into();
    write_status(&mut active, &next);
    active.update(conn).await.map_err(EngineError::persistence)?;

    audit::record(
        conn,
        NewAuditRecord::new(
            AuditEntityType::Partner,
            partner_id,
            AuditAction::TierChanged,
            change.changed_by,
        )
        .with_metadata(json!({
            "old_tier": change.old_tier,
            "new_tier": change.new_tier,
            "reason": change.reason,
            "is_downgrade": change.is_downgrade,
        })),
    )
    .await?;
    Ok(())
}

/// Re-evaluates the tier after the partner's revenue changed.
///
/// Runs on the caller's transaction; `model` must be locked and already
/// carry the new lifetime revenue.
pub(crate) async fn apply_auto_upgrade<C: ConnectionTrait>(
    conn: &C,
    model: partners::Model,
    thresholds: &TierThresholds,
    now: DateTime<Utc>,
) -> Result<Option<(PartnerId, TierChange)>, EngineError> {
    let partner: PartnerRecord = model.clone().into();
    let Some(change) = TierGovernance::evaluate_auto_upgrade(
        &partner.tier,
        partner.lifetime_referred_revenue,
        thresholds,
        now,
    ) else {
        return Ok(None);
    };
    write_change(conn, model, &change).await?;
    info!(
        partner_id = %partner.id,
        old_tier = %change.old_tier,
        new_tier = %change.new_tier,
        "tier upgraded automatically"
    );
    Ok(Some((partner.id, change)))
}

/// Tier governance repository.
#[derive(Clone)]
pub struct TierRepository {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
}

impl TierRepository {
    /// Creates a new tier repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Changes a partner's tier by hand.
    ///
    /// Downgrades succeed but are logged at WARN and reported through
    /// `is_downgrade`.
    ///
    /// # Errors
    ///
    /// * `TierLocked` if the tier is locked
    /// * `Validation` for an empty reason or an unchanged tier
    /// * `NotFound` for an unknown partner
    pub async fn change_tier(
        &self,
        partner_id: PartnerId,
        new_tier: Tier,
        reason: &str,
        admin: AdminId,
    ) -> Result<TierChange, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_partner(&txn, partner_id).await?;
        let partner: PartnerRecord = model.clone().into();
        let change = TierGovernance::change_manually(
            partner_id,
            &partner.tier,
            new_tier,
            reason,
            admin,
            Utc::now(),
        )?;
        write_change(&txn, model, &change).await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        if change.is_downgrade {
            warn!(
                %partner_id,
                old_tier = %change.old_tier,
                new_tier = %change.new_tier,
                %admin,
                "manual tier downgrade"
            );
        } else {
            info!(
                %partner_id,
                old_tier = %change.old_tier,
                new_tier = %change.new_tier,
                "tier changed manually"
            );
        }
        dispatch(self.notifier.as_ref(), vec![tier_notification(partner_id, &change)]).await;
        Ok(change)
    }

    /// Locks a partner's tier.
    ///
    /// # Errors
    ///
    /// * `Validation` for an empty reason
    /// * `StateConflict` if already locked
    pub async fn lock(
        &self,
        partner_id: PartnerId,
        reason: &str,
        admin: AdminId,
    ) -> Result<TierFlagChange, EngineError> {
        self.change_flags(partner_id, AuditAction::TierLocked, |status| {
            TierGovernance::lock(status, reason, admin)
        })
        .await
    }

    /// Unlocks a partner's tier.
    ///
    /// # Errors
    ///
    /// * `Validation` for an empty reason
    /// * `StateConflict` if not locked
    pub async fn unlock(
        &self,
        partner_id: PartnerId,
        reason: &str,
        admin: AdminId,
    ) -> Result<TierFlagChange, EngineError> {
        self.change_flags(partner_id, AuditAction::TierUnlocked, |status| {
            TierGovernance::unlock(status, reason, admin)
        })
        .await
    }

    /// Sets or clears the override flag.
    ///
    /// # Errors
    ///
    /// * `TierLocked` if the tier is locked
    /// * `Validation` for an empty reason
    pub async fn set_override(
        &self,
        partner_id: PartnerId,
        enabled: bool,
        reason: &str,
        admin: AdminId,
    ) -> Result<TierFlagChange, EngineError> {
        self.change_flags(partner_id, AuditAction::TierOverrideChanged, |status| {
            TierGovernance::set_override(partner_id, status, enabled, reason, admin)
        })
        .await
    }

    async fn change_flags<F>(
        &self,
        partner_id: PartnerId,
        action: AuditAction,
        decide: F,
    ) -> Result<TierFlagChange, EngineError>
    where
        F: FnOnce(&TierStatus) -> Result<TierFlagChange, EngineError>,
    {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_partner(&txn, partner_id).await?;
        let partner: PartnerRecord = model.clone().into();
        let change = decide(&partner.tier)?;

        let mut active: partners::ActiveModel = model.into();
        active.tier_locked = Set(change.tier_locked);
        active.tier_override = Set(change.tier_override);
        active.tier_override_reason = Set(Some(change.reason.clone()));
        active.update(&txn).await.map_err(EngineError::persistence)?;

        audit::record(
            &txn,
            NewAuditRecord::new(AuditEntityType::Partner, partner_id, action, change.changed_by)
                .with_metadata(json!({
                    "tier": partner.tier.tier,
                    "tier_locked": change.tier_locked,
                    "tier_override": change.tier_override,
                    "previous_locked": partner.tier.tier_locked,
                    "previous_override": partner.tier.tier_override,
                    "reason": change.reason,
                })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        info!(
            %partner_id,
            %action,
            locked = change.tier_locked,
            overridden = change.tier_override,
            "tier flags changed"
        );
        Ok(change)
    }
}
