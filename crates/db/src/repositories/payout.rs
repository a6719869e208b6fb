//! Payout batch generation and completion.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use referra_core::audit::{Actor, AuditAction, AuditEntityType, NewAuditRecord};
use referra_core::collaborators::{
    Notification, NotificationEvent, Notifier, PasswordGate, RiskFlagHook,
};
use referra_core::deal::DealRecord;
use referra_core::error::EngineError;
use referra_core::ledger::PartnerBalance;
use referra_core::payout::{
    BatchPlan, PayableDeal, PayoutBatchRecord, PayoutCandidate, PayoutMonth, PayoutService,
};
use referra_shared::types::{AdminId, PartnerId, PayoutBatchId};

use crate::convert::stamp;
use crate::entities::{
    deals, partners, payout_batches,
    sea_orm_active_enums::{CommissionStatus, DealStatus, PartnerStatus, PayoutBatchStatus},
};
use crate::notify::dispatch;

use super::deal::write_state;
use super::{audit, ledger};

/// A generated batch with its per-partner breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedBatch {
    /// Persisted batch.
    pub batch: PayoutBatchRecord,
    /// Breakdown the batch was created from.
    pub plan: BatchPlan,
}

/// Result of completing a batch.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedBatch {
    /// Batch after completion.
    pub batch: PayoutBatchRecord,
    /// Deals marked paid.
    pub paid_deals: usize,
    /// Deals reversed after generation and left unpaid.
    pub skipped_deals: usize,
    /// Σ paid commission.
    pub paid_total: Decimal,
}

/// Payout batch repository.
#[derive(Clone)]
pub struct PayoutRepository {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
}

impl PayoutRepository {
    /// Creates a new payout repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Finds a batch.
    pub async fn find(&self, batch_id: PayoutBatchId) -> Result<PayoutBatchRecord, EngineError> {
        payout_batches::Entity::find_by_id(batch_id.into_inner())
            .one(&self.db)
            .await
            .map_err(EngineError::persistence)?
            .ok_or_else(|| EngineError::not_found("payout batch", batch_id))?
            .try_into()
    }

    /// Deals included in a batch.
    pub async fn deals_in(&self, batch_id: PayoutBatchId) -> Result<Vec<DealRecord>, EngineError> {
        let deals = deals::Entity::find()
            .filter(deals::Column::PayoutBatchId.eq(batch_id.into_inner()))
            .order_by_asc(deals::Column::PartnerId)
            .order_by_asc(deals::Column::Id)
            .all(&self.db)
            .await
            .map_err(EngineError::persistence)?;
        Ok(deals.into_iter().map(Into::into).collect())
    }

    /// Generates the payout batch for a month.
    ///
    /// Each eligible partner is paid their approved balance net of debt and of
    /// amounts already promised to processing batches. Callers must not
    /// generate two batches for the same month concurrently.
    ///
    /// # Errors
    ///
    /// * `NoEligiblePartners` when no partner reaches the threshold or no
    ///   eligible partner has an unbatched approved commission
    pub async fn generate(
        &self,
        payout_month: PayoutMonth,
        payout_date: NaiveDate,
        threshold: Decimal,
        risk: &dyn RiskFlagHook,
        actor: Actor,
    ) -> Result<GeneratedBatch, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let active: Vec<PartnerId> = partners::Entity::find()
            .select_only()
            .column(partners::Column::Id)
            .filter(partners::Column::Status.eq(PartnerStatus::Active))
            .into_tuple::<Uuid>()
            .all(&txn)
            .await
            .map_err(EngineError::persistence)?
            .into_iter()
            .map(Into::into)
            .collect();

        let totals = ledger::totals_for(&txn, &active).await?;
        let in_flight = in_flight_for(&txn, &active).await?;
        let candidates: Vec<PayoutCandidate> = active
            .iter()
            .map(|id| PayoutCandidate {
                status: referra_core::partner::PartnerStatus::Active,
                balance: totals.get(id).map_or_else(
                    || PartnerBalance::empty(*id),
                    |t| PartnerBalance::from_totals(*id, t),
                ),
                in_flight: in_flight.get(id).copied().unwrap_or_default(),
            })
            .collect();

        let above_threshold: Vec<PartnerId> =
            PayoutService::eligible_partners(&candidates, threshold, &HashSet::new())
                .into_keys()
                .collect();
        if above_threshold.is_empty() {
            return Err(EngineError::NoEligiblePartners);
        }
        let blocked = risk.blocked_partners(&above_threshold).await?;
        if !blocked.is_empty() {
            info!(count = blocked.len(), "partners held back by risk flags");
        }
        let eligible = PayoutService::eligible_partners(&candidates, threshold, &blocked);
        if eligible.is_empty() {
            return Err(EngineError::NoEligiblePartners);
        }

        let payable: Vec<PayableDeal> = deals::Entity::find()
            .filter(deals::Column::PartnerId.is_in(eligible.keys().map(|id| id.into_inner())))
            .filter(deals::Column::DealStatus.eq(DealStatus::Closed))
            .filter(deals::Column::CommissionStatus.eq(CommissionStatus::Approved))
            .filter(deals::Column::PayoutBatchId.is_null())
            .order_by_asc(deals::Column::PartnerId)
            .order_by_asc(deals::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(EngineError::persistence)?
            .into_iter()
            .map(|d| PayableDeal {
                deal_id: d.id.into(),
                partner_id: d.partner_id.into(),
                amount: d.commission_amount.unwrap_or_default(),
            })
            .collect();

        let plan = PayoutService::plan_batch(payout_month, payout_date, &payable, &eligible)?;
        let deal_count = plan.deal_count();
        let offset_total: Decimal = plan.partners.iter().map(|p| p.offset).sum();
        let now = stamp(Utc::now());

        let batch = payout_batches::ActiveModel {
            id: Set(PayoutBatchId::new().into_inner()),
            payout_month: Set(plan.payout_month.to_string()),
            payout_date: Set(plan.payout_date),
            total_amount: Set(plan.total_amount),
            status: Set(PayoutBatchStatus::Processing),
            reference_number: Set(None),
            partner_count: Set(count_i32(plan.partners.len())?),
            deal_count: Set(count_i32(deal_count)?),
            created_by: Set(actor.to_string()),
            completed_by: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(EngineError::persistence)?;

        for payout in plan.deal_payouts() {
            let assigned = deals::Entity::update_many()
                .set(deals::ActiveModel {
                    payout_batch_id: Set(Some(batch.id)),
                    payout_amount: Set(Some(payout.amount)),
                    ..Default::default()
                })
                .filter(deals::Column::Id.eq(payout.deal_id.into_inner()))
                .filter(deals::Column::PayoutBatchId.is_null())
                .filter(deals::Column::CommissionStatus.eq(CommissionStatus::Approved))
                .exec(&txn)
                .await
                .map_err(EngineError::persistence)?;
            if assigned.rows_affected != 1 {
                return Err(EngineError::StateConflict(format!(
                    "deal {} was batched or changed while the batch was generated",
                    payout.deal_id
                )));
            }
        }

        for payout in plan.partners.iter().filter(|p| !p.offset.is_zero()) {
            debug!(
                partner_id = %payout.partner_id,
                paid = %payout.amount,
                offset = %payout.offset,
                "commission withheld against debt"
            );
        }

        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::PayoutBatch,
                batch.id,
                AuditAction::PayoutBatchCreated,
                actor,
            )
            .with_metadata(json!({
                "payout_month": plan.payout_month,
                "total_amount": plan.total_amount,
                "offset_total": offset_total,
                "partner_count": plan.partners.len(),
                "deal_count": deal_count,
            })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        info!(
            batch_id = %batch.id,
            month = %plan.payout_month,
            total = %plan.total_amount,
            offset = %offset_total,
            partners = plan.partners.len(),
            deals = deal_count,
            "payout batch generated"
        );
        Ok(GeneratedBatch {
            batch: batch.try_into()?,
            plan,
        })
    }

    /// Completes a processing batch after the transfer went out.
    ///
    /// # Errors
    ///
    /// * `Validation` for an empty transaction reference
    /// * `Unauthorized` if the admin's password does not verify
    /// * `AlreadyCompleted` if the batch was completed before
    pub async fn complete(
        &self,
        batch_id: PayoutBatchId,
        transaction_reference: &str,
        admin: AdminId,
        password: &str,
        gate: &dyn PasswordGate,
    ) -> Result<CompletedBatch, EngineError> {
        let reference = PayoutService::require_reference(transaction_reference)?;
        gate.verify(admin, password).await?;
        let actor = Actor::Admin(admin);
        let now = stamp(Utc::now());

        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let model = payout_batches::Entity::find_by_id(batch_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(EngineError::persistence)?
            .ok_or_else(|| EngineError::not_found("payout batch", batch_id))?;
        let record = PayoutBatchRecord::try_from(model)?;
        PayoutService::validate_completion(&record, &reference)?;

        let result = payout_batches::Entity::update_many()
            .set(payout_batches::ActiveModel {
                status: Set(PayoutBatchStatus::Completed),
                reference_number: Set(Some(reference.clone())),
                completed_by: Set(Some(actor.to_string())),
                completed_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(payout_batches::Column::Id.eq(batch_id.into_inner()))
            .filter(payout_batches::Column::Status.eq(PayoutBatchStatus::Processing))
            .exec(&txn)
            .await
            .map_err(EngineError::persistence)?;
        if result.rows_affected == 0 {
            return Err(EngineError::AlreadyCompleted(batch_id));
        }

        let batch_deals = deals::Entity::find()
            .filter(deals::Column::PayoutBatchId.eq(batch_id.into_inner()))
            .order_by_asc(deals::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(EngineError::persistence)?;

        let mut paid_deals = 0;
        let mut skipped_deals = 0;
        let mut paid_by_partner: BTreeMap<PartnerId, Decimal> = BTreeMap::new();
        for model in batch_deals {
            let deal: DealRecord = model.clone().into();
            let Some(settlement) = PayoutService::settle_deal(&deal, batch_id)? else {
                warn!(deal_id = %deal.id, %batch_id, "reversed deal skipped at payout");
                skipped_deals += 1;
                continue;
            };

            let mut active: deals::ActiveModel = model.into();
            write_state(&mut active, settlement.state, deal.version);
            active.update(&txn).await.map_err(EngineError::persistence)?;

            if let Some(entry) = &settlement.entry {
                ledger::append_entry(&txn, entry, actor).await?;
                *paid_by_partner.entry(deal.partner_id).or_default() += entry.amount;
            }
            paid_deals += 1;
        }
        let paid_total: Decimal = paid_by_partner.values().copied().sum();

        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::PayoutBatch,
                batch_id,
                AuditAction::PayoutBatchCompleted,
                actor,
            )
            .with_metadata(json!({
                "reference_number": reference,
                "paid_deals": paid_deals,
                "skipped_deals": skipped_deals,
                "paid_total": paid_total,
            })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        info!(
            %batch_id,
            %admin,
            paid_deals,
            skipped_deals,
            total = %paid_total,
            "payout batch completed"
        );

        let notifications = paid_by_partner
            .iter()
            .map(|(partner_id, amount)| {
                Notification::new(
                    *partner_id,
                    NotificationEvent::CommissionPaid,
                    json!({
                        "batch_id": batch_id,
                        "amount": amount,
                        "reference_number": reference,
                    }),
                )
            })
            .collect();
        dispatch(self.notifier.as_ref(), notifications).await;

        Ok(CompletedBatch {
            batch: self.find(batch_id).await?,
            paid_deals,
            skipped_deals,
            paid_total,
        })
    }
}

/// Amount already allocated to processing batches, per partner.
async fn in_flight_for<C: ConnectionTrait>(
    conn: &C,
    partner_ids: &[PartnerId],
) -> Result<HashMap<PartnerId, Decimal>, EngineError> {
    if partner_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let batched = deals::Entity::find()
        .filter(deals::Column::PartnerId.is_in(partner_ids.iter().map(|id| id.into_inner())))
        .filter(deals::Column::CommissionStatus.eq(CommissionStatus::Approved))
        .filter(deals::Column::PayoutBatchId.is_not_null())
        .all(conn)
        .await
        .map_err(EngineError::persistence)?;

    let mut in_flight: HashMap<PartnerId, Decimal> = HashMap::new();
    for deal in batched {
        let amount = deal.payout_amount.or(deal.commission_amount).unwrap_or_default();
        *in_flight.entry(deal.partner_id.into()).or_default() += amount;
    }
    Ok(in_flight)
}

fn count_i32(count: usize) -> Result<i32, EngineError> {
    i32::try_from(count).map_err(|_| EngineError::Validation(format!("batch too large: {count}")))
}
