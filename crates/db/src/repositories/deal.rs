//! Deal repository.
//!
//! Each lifecycle operation locks the deal row (`SELECT ... FOR UPDATE`), asks
//! [`DealLifecycle`] what the transition means, and writes the new state, the
//! ledger entry and the audit record in the same transaction. Notifications go
//! out after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use referra_core::audit::{Actor, AuditAction, AuditEntityType, NewAuditRecord};
use referra_core::collaborators::{Notification, NotificationEvent, Notifier};
use referra_core::deal::{CloseOutcome, DealLifecycle, DealRecord, DealState, NewDeal};
use referra_core::error::EngineError;
use referra_core::ledger::LedgerEntry;
use referra_core::partner::PartnerRecord;
use referra_core::tier::{TierChange, TierThresholds};
use referra_shared::types::{DealId, PartnerId};

use crate::convert::stamp;
use crate::entities::deals;
use crate::notify::dispatch;

use super::partner::{find_partner, lock_partner};
use super::{audit, ledger, tier};

/// Result of a close request.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedDeal {
    /// Deal after the request.
    pub deal: DealRecord,
    /// True if the deal was closed before this request; nothing was written.
    pub already_closed: bool,
    /// `commission_earned` entry appended by this close.
    pub earned: Option<LedgerEntry>,
    /// Automatic tier upgrade triggered by this close.
    pub tier_change: Option<TierChange>,
}

/// A deal together with the ledger entry its change appended.
#[derive(Debug, Clone, Serialize)]
pub struct DealWithEntry {
    /// Deal after the change.
    pub deal: DealRecord,
    /// Appended entry; absent when the change has no ledger effect.
    pub entry: Option<LedgerEntry>,
}

/// Locks a deal row for the rest of the transaction.
pub(crate) async fn lock_deal<C: ConnectionTrait>(
    conn: &C,
    deal_id: DealId,
) -> Result<deals::Model, EngineError> {
    deals::Entity::find_by_id(deal_id.into_inner())
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(EngineError::persistence)?
        .ok_or_else(|| EngineError::not_found("deal", deal_id))
}

/// Inserts a closed deal with a zero value whose commission is `amount`.
///
/// Backs ledger credits that are not tied to a referral so payout batches can
/// pay them like any approved commission.
pub(crate) async fn insert_synthetic_deal<C: ConnectionTrait>(
    conn: &C,
    partner_id: PartnerId,
    deal_id: DealId,
    client_name: &str,
    amount: Decimal,
    state: DealState,
    at: DateTime<Utc>,
) -> Result<(), EngineError> {
    state.validate()?;
    let at = stamp(at);
    deals::ActiveModel {
        id: Set(deal_id.into_inner()),
        partner_id: Set(partner_id.into_inner()),
        client_name: Set(client_name.to_string()),
        estimated_value: Set(Decimal::ZERO),
        final_value: Set(Some(Decimal::ZERO)),
        commission_rate: Set(Decimal::ZERO),
        commission_amount: Set(Some(amount)),
        deal_status: Set(state.deal.into()),
        commission_status: Set(state.commission.into()),
        payment_status: Set(state.payment.into()),
        sale_date: Set(Some(at)),
        approval_date: Set(Some(at)),
        payout_batch_id: Set(None),
        payout_amount: Set(None),
        is_synthetic: Set(true),
        notes: Set(None),
        rejection_reason: Set(None),
        created_at: Set(at),
        updated_at: Set(at),
        version: Set(1),
    }
    .insert(conn)
    .await
    .map_err(EngineError::persistence)?;
    Ok(())
}

/// Writes the three status axes and bumps the version.
pub(crate) fn write_state(active: &mut deals::ActiveModel, state: DealState, version: i32) {
    active.deal_status = Set(state.deal.into());
    active.commission_status = Set(state.commission.into());
    active.payment_status = Set(state.payment.into());
    active.version = Set(version + 1);
}

async fn audit_status<C: ConnectionTrait>(
    conn: &C,
    deal_id: DealId,
    actor: Actor,
    from: &str,
    state: DealState,
    reason: Option<&str>,
) -> Result<(), EngineError> {
    audit::record(
        conn,
        NewAuditRecord::new(AuditEntityType::Deal, deal_id, AuditAction::DealStatusChanged, actor)
            .with_metadata(json!({
                "from": from,
                "to": state.deal,
                "reason": reason,
            })),
    )
    .await?;
    Ok(())
}

fn status_notification(deal: &DealRecord) -> Notification {
    Notification::new(
        deal.partner_id,
        NotificationEvent::DealStatusChanged,
        json!({
            "deal_id": deal.id,
            "client_name": deal.client_name,
            "deal_status": deal.deal_status,
            "commission_status": deal.commission_status,
            "payment_status": deal.payment_status,
        }),
    )
}

/// Deal repository.
#[derive(Clone)]
pub struct DealRepository {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    tier_thresholds: TierThresholds,
}

impl DealRepository {
    /// Creates a new deal repository.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        notifier: Arc<dyn Notifier>,
        tier_thresholds: TierThresholds,
    ) -> Self {
        Self {
            db,
            notifier,
            tier_thresholds,
        }
    }

    /// Registers a deal for an active partner.
    ///
    /// # Errors
    ///
    /// * `NotFound` for an unknown partner
    /// * `StateConflict` if the partner is not active
    /// * `Validation` for invalid input
    pub async fn register(
        &self,
        partner_id: PartnerId,
        input: NewDeal,
        actor: Actor,
    ) -> Result<DealRecord, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let partner: PartnerRecord = find_partner(&txn, partner_id).await?.into();
        let registration = DealLifecycle::register(&partner, input)?;

        let now = stamp(Utc::now());
        let model = deals::ActiveModel {
            id: Set(DealId::new().into_inner()),
            partner_id: Set(partner_id.into_inner()),
            client_name: Set(registration.client_name),
            estimated_value: Set(registration.estimated_value),
            final_value: Set(None),
            commission_rate: Set(registration.commission_rate),
            commission_amount: Set(None),
            deal_status: Set(registration.state.deal.into()),
            commission_status: Set(registration.state.commission.into()),
            payment_status: Set(registration.state.payment.into()),
            sale_date: Set(None),
            approval_date: Set(None),
            payout_batch_id: Set(None),
            payout_amount: Set(None),
            is_synthetic: Set(false),
            notes: Set(registration.notes),
            rejection_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        }
        .insert(&txn)
        .await
        .map_err(EngineError::persistence)?;

        audit::record(
            &txn,
            NewAuditRecord::new(AuditEntityType::Deal, model.id, AuditAction::DealRegistered, actor)
                .with_metadata(json!({
                    "partner_id": partner_id,
                    "estimated_value": model.estimated_value,
                    "commission_rate": model.commission_rate,
                })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        info!(deal_id = %model.id, %partner_id, "deal registered");
        Ok(model.into())
    }

    /// Finds a deal.
    pub async fn find(&self, deal_id: DealId) -> Result<DealRecord, EngineError> {
        deals::Entity::find_by_id(deal_id.into_inner())
            .one(&self.db)
            .await
            .map_err(EngineError::persistence)?
            .map(Into::into)
            .ok_or_else(|| EngineError::not_found("deal", deal_id))
    }

    /// Every deal of a partner, newest first.
    pub async fn list_for_partner(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<DealRecord>, EngineError> {
        find_partner(&self.db, partner_id).await?;
        let deals = deals::Entity::find()
            .filter(deals::Column::PartnerId.eq(partner_id.into_inner()))
            .order_by_desc(deals::Column::CreatedAt)
            .order_by_desc(deals::Column::Id)
            .all(&self.db)
            .await
            .map_err(EngineError::persistence)?;
        Ok(deals.into_iter().map(Into::into).collect())
    }

    /// Moves a registered deal under review.
    pub async fn start_review(
        &self,
        deal_id: DealId,
        actor: Actor,
    ) -> Result<DealRecord, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_deal(&txn, deal_id).await?;
        let record: DealRecord = model.clone().into();
        let transition = DealLifecycle::start_review(&record)?;

        let mut active: deals::ActiveModel = model.into();
        write_state(&mut active, transition.state, record.version);
        let updated = active.update(&txn).await.map_err(EngineError::persistence)?;

        audit_status(&txn, deal_id, actor, &transition.from.to_string(), transition.state, None)
            .await?;
        txn.commit().await.map_err(EngineError::persistence)?;

        let deal: DealRecord = updated.into();
        info!(%deal_id, "deal under review");
        dispatch(self.notifier.as_ref(), vec![status_notification(&deal)]).await;
        Ok(deal)
    }

    /// Approves a deal and freezes its commission.
    ///
    /// # Errors
    ///
    /// * `StateConflict` unless the deal is registered or under review
    /// * `Validation` for a negative value or a rate outside `[0, 1]`
    pub async fn approve(
        &self,
        deal_id: DealId,
        final_value: Option<Decimal>,
        commission_rate: Option<Decimal>,
        actor: Actor,
    ) -> Result<DealRecord, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_deal(&txn, deal_id).await?;
        let record: DealRecord = model.clone().into();
        let approval = DealLifecycle::approve(&record, final_value, commission_rate)?;

        let mut active: deals::ActiveModel = model.into();
        write_state(&mut active, approval.state, record.version);
        active.final_value = Set(Some(approval.final_value));
        active.commission_rate = Set(approval.commission_rate);
        active.commission_amount = Set(Some(approval.commission_amount));
        let updated = active.update(&txn).await.map_err(EngineError::persistence)?;

        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Deal,
                deal_id,
                AuditAction::DealStatusChanged,
                actor,
            )
            .with_metadata(json!({
                "from": approval.from,
                "to": approval.state.deal,
                "final_value": approval.final_value,
                "commission_rate": approval.commission_rate,
                "commission_amount": approval.commission_amount,
            })),
        )
        .await?;
        txn.commit().await.map_err(EngineError::persistence)?;

        let deal: DealRecord = updated.into();
        info!(%deal_id, commission = %approval.commission_amount, "deal approved");
        dispatch(self.notifier.as_ref(), vec![status_notification(&deal)]).await;
        Ok(deal)
    }

    /// Closes an approved deal.
    ///
    /// The first close appends `commission_earned`, adds the deal value to the
    /// partner's lifetime revenue and re-evaluates the tier, all in one
    /// transaction. Closing again is a reported no-op.
    pub async fn close(&self, deal_id: DealId, actor: Actor) -> Result<ClosedDeal, EngineError> {
        let now = Utc::now();
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_deal(&txn, deal_id).await?;
        let record: DealRecord = model.clone().into();
        let plan = match DealLifecycle::close(&record, now)? {
            CloseOutcome::AlreadyClosed => {
                txn.commit().await.map_err(EngineError::persistence)?;
                debug!(%deal_id, "deal already closed");
                return Ok(ClosedDeal {
                    deal: record,
                    already_closed: true,
                    earned: None,
                    tier_change: None,
                });
            }
            CloseOutcome::Closed(plan) => plan,
        };

        let mut active: deals::ActiveModel = model.into();
        write_state(&mut active, plan.state, record.version);
        active.sale_date = Set(Some(stamp(plan.sale_date)));
        let updated = active.update(&txn).await.map_err(EngineError::persistence)?;

        let earned = match &plan.earned {
            Some(entry) => Some(ledger::append_entry(&txn, entry, actor).await?),
            None => None,
        };

        let partner = lock_partner(&txn, record.partner_id).await?;
        let revenue = partner.lifetime_referred_revenue + plan.revenue_increment;
        let mut partner_active: crate::entities::partners::ActiveModel = partner.into();
        partner_active.lifetime_referred_revenue = Set(revenue);
        let partner = partner_active.update(&txn).await.map_err(EngineError::persistence)?;

        let upgrade = tier::apply_auto_upgrade(&txn, partner, &self.tier_thresholds, now).await?;

        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Deal,
                deal_id,
                AuditAction::DealStatusChanged,
                actor,
            )
            .with_metadata(json!({
                "from": record.deal_status,
                "to": plan.state.deal,
                "sale_date": plan.sale_date,
                "commission_earned": earned.as_ref().map(|e| e.amount),
                "revenue_increment": plan.revenue_increment,
            })),
        )
        .await?;
        txn.commit().await.map_err(EngineError::persistence)?;

        let deal: DealRecord = updated.into();
        info!(%deal_id, partner_id = %deal.partner_id, lifetime_revenue = %revenue, "deal closed");

        let mut notifications = vec![status_notification(&deal)];
        if let Some((partner_id, change)) = &upgrade {
            notifications.push(tier::tier_notification(*partner_id, change));
        }
        dispatch(self.notifier.as_ref(), notifications).await;

        Ok(ClosedDeal {
            deal,
            already_closed: false,
            earned,
            tier_change: upgrade.map(|(_, change)| change),
        })
    }

    /// Rejects a deal that has not closed.
    pub async fn reject(
        &self,
        deal_id: DealId,
        reason: &str,
        actor: Actor,
    ) -> Result<DealRecord, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_deal(&txn, deal_id).await?;
        let record: DealRecord = model.clone().into();
        let transition = DealLifecycle::reject(&record, reason)?;

        let mut active: deals::ActiveModel = model.into();
        write_state(&mut active, transition.state, record.version);
        active.rejection_reason = Set(transition.reason.clone());
        let updated = active.update(&txn).await.map_err(EngineError::persistence)?;

        audit_status(
            &txn,
            deal_id,
            actor,
            &transition.from.to_string(),
            transition.state,
            transition.reason.as_deref(),
        )
        .await?;
        txn.commit().await.map_err(EngineError::persistence)?;

        let deal: DealRecord = updated.into();
        info!(%deal_id, "deal rejected");
        dispatch(self.notifier.as_ref(), vec![status_notification(&deal)]).await;
        Ok(deal)
    }

    /// Records that the client paid the program.
    pub async fn payment_received(
        &self,
        deal_id: DealId,
        actor: Actor,
    ) -> Result<DealRecord, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_deal(&txn, deal_id).await?;
        let record: DealRecord = model.clone().into();
        let state = DealLifecycle::payment_received(&record)?;

        let mut active: deals::ActiveModel = model.into();
        write_state(&mut active, state, record.version);
        let updated = active.update(&txn).await.map_err(EngineError::persistence)?;

        audit::record(
            &txn,
            NewAuditRecord::new(AuditEntityType::Deal, deal_id, AuditAction::PaymentReceived, actor)
                .with_metadata(json!({ "payment_status": state.payment })),
        )
        .await?;
        txn.commit().await.map_err(EngineError::persistence)?;

        info!(%deal_id, "client payment received");
        Ok(updated.into())
    }

    /// Corrects the frozen commission of a deal.
    pub async fn correct_commission(
        &self,
        deal_id: DealId,
        new_amount: Decimal,
        reason: &str,
        actor: Actor,
    ) -> Result<DealWithEntry, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_deal(&txn, deal_id).await?;
        let record: DealRecord = model.clone().into();
        let correction = DealLifecycle::correct_commission(&record, new_amount, reason)?;

        let mut active: deals::ActiveModel = model.into();
        active.commission_amount = Set(Some(correction.new_amount));
        write_state(&mut active, record.state(), record.version);
        let updated = active.update(&txn).await.map_err(EngineError::persistence)?;

        let entry = match &correction.entry {
            Some(entry) => Some(ledger::append_entry(&txn, entry, actor).await?),
            None => None,
        };

        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Deal,
                deal_id,
                AuditAction::CommissionCorrected,
                actor,
            )
            .with_metadata(json!({
                "old_amount": correction.old_amount,
                "new_amount": correction.new_amount,
                "delta": correction.delta,
                "reason": correction.reason,
                "ledger_entry_id": entry.as_ref().map(|e| e.id),
            })),
        )
        .await?;
        txn.commit().await.map_err(EngineError::persistence)?;

        info!(%deal_id, delta = %correction.delta, "commission corrected");
        Ok(DealWithEntry {
            deal: updated.into(),
            entry,
        })
    }

    /// Reverses the commission of a closed deal.
    pub async fn reverse_commission(
        &self,
        deal_id: DealId,
        reason: &str,
        actor: Actor,
    ) -> Result<DealWithEntry, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = lock_deal(&txn, deal_id).await?;
        let record: DealRecord = model.clone().into();
        let reversal = DealLifecycle::reverse_commission(&record, reason)?;

        let mut active: deals::ActiveModel = model.into();
        write_state(&mut active, reversal.state, record.version);
        let updated = active.update(&txn).await.map_err(EngineError::persistence)?;

        let entry = match &reversal.entry {
            Some(entry) => Some(ledger::append_entry(&txn, entry, actor).await?),
            None => None,
        };

        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Deal,
                deal_id,
                AuditAction::CommissionReversed,
                actor,
            )
            .with_metadata(json!({
                "previous_status": reversal.previous,
                "amount": reversal.amount,
                "reason": reversal.reason,
                "ledger_entry_id": entry.as_ref().map(|e| e.id),
            })),
        )
        .await?;
        txn.commit().await.map_err(EngineError::persistence)?;

        let deal: DealRecord = updated.into();
        info!(
            %deal_id,
            previous = %reversal.previous,
            amount = %reversal.amount,
            "commission reversed"
        );
        dispatch(self.notifier.as_ref(), vec![status_notification(&deal)]).await;
        Ok(DealWithEntry { deal, entry })
    }
}
