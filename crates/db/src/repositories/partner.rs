//! Partner repository.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use referra_core::adjustment::{ADJUSTMENT_CREDIT_CLIENT, ManualAdjustment};
use referra_core::audit::{Actor, AuditAction, AuditEntityType, NewAuditRecord};
use referra_core::error::EngineError;
use referra_core::ledger::{LedgerEntry, PartnerBalance};
use referra_core::partner::{NewPartner, PartnerRecord};
use referra_shared::types::{AdminId, PartnerId};

use crate::convert::stamp;
use crate::entities::{partners, sea_orm_active_enums::PartnerStatus};

use super::deal::insert_synthetic_deal;
use super::{audit, ledger};

/// A partner together with its derived balances.
#[derive(Debug, Clone, Serialize)]
pub struct PartnerSummary {
    /// Partner record.
    #[serde(flatten)]
    pub partner: PartnerRecord,
    /// Balances derived from the ledger at read time.
    pub balance: PartnerBalance,
}

/// Locks a partner row for the rest of the transaction.
pub(crate) async fn lock_partner<C: ConnectionTrait>(
    conn: &C,
    partner_id: PartnerId,
) -> Result<partners::Model, EngineError> {
    partners::Entity::find_by_id(partner_id.into_inner())
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(EngineError::persistence)?
        .ok_or_else(|| EngineError::not_found("partner", partner_id))
}

/// Reads a partner without locking.
pub(crate) async fn find_partner<C: ConnectionTrait>(
    conn: &C,
    partner_id: PartnerId,
) -> Result<partners::Model, EngineError> {
    partners::Entity::find_by_id(partner_id.into_inner())
        .one(conn)
        .await
        .map_err(EngineError::persistence)?
        .ok_or_else(|| EngineError::not_found("partner", partner_id))
}

/// Partner repository.
#[derive(Debug, Clone)]
pub struct PartnerRepository {
    db: DatabaseConnection,
}

impl PartnerRepository {
    /// Creates a new partner repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a partner.
    ///
    /// # Errors
    ///
    /// * `Validation` for a blank name or malformed email
    /// * `StateConflict` if the email is already registered
    pub async fn create(
        &self,
        input: NewPartner,
        actor: Actor,
    ) -> Result<PartnerRecord, EngineError> {
        let input = input.validate()?;
        let tier = input.starting_tier();

        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let taken = partners::Entity::find()
            .filter(partners::Column::Email.eq(input.email.as_str()))
            .one(&txn)
            .await
            .map_err(EngineError::persistence)?;
        if taken.is_some() {
            return Err(EngineError::StateConflict(format!(
                "a partner with email {} already exists",
                input.email
            )));
        }

        let now = stamp(Utc::now());
        let model = partners::ActiveModel {
            id: Set(PartnerId::new().into_inner()),
            name: Set(input.name),
            email: Set(input.email),
            status: Set(PartnerStatus::Active),
            tier: Set(tier.into()),
            tier_override: Set(false),
            tier_locked: Set(false),
            tier_override_reason: Set(None),
            tier_last_changed_at: Set(None),
            tier_last_changed_by: Set(None),
            lifetime_referred_revenue: Set(Decimal::ZERO),
            has_received_academy_bonus: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(EngineError::persistence)?;

        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Partner,
                model.id,
                AuditAction::PartnerCreated,
                actor,
            )
            .with_metadata(json!({ "tier": tier, "email": model.email })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        info!(partner_id = %model.id, %tier, "partner created");
        Ok(model.into())
    }

    /// Finds a partner.
    pub async fn find(&self, partner_id: PartnerId) -> Result<PartnerRecord, EngineError> {
        Ok(find_partner(&self.db, partner_id).await?.into())
    }

    /// Partner with balances derived from the ledger.
    pub async fn summary(&self, partner_id: PartnerId) -> Result<PartnerSummary, EngineError> {
        let partner: PartnerRecord = find_partner(&self.db, partner_id).await?.into();
        let balance = ledger::balance_on(&self.db, partner_id).await?;
        Ok(PartnerSummary { partner, balance })
    }

    /// Appends a manual signed adjustment.
    ///
    /// A credit is backed by a synthetic approved deal so the next payout
    /// batch pays it. A debit is netted out of the partner's next payout, or
    /// shows as debt when it exceeds the approved balance.
    ///
    /// # Errors
    ///
    /// * `Validation` for an empty reason or a zero amount
    /// * `NotFound` for an unknown partner
    pub async fn adjust(
        &self,
        partner_id: PartnerId,
        amount: Decimal,
        reason: &str,
        admin: AdminId,
    ) -> Result<LedgerEntry, EngineError> {
        let plan = ManualAdjustment::plan(partner_id, amount, reason, Utc::now())?;
        let actor = Actor::Admin(admin);

        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        lock_partner(&txn, partner_id).await?;
        if let Some(credit) = &plan.credit {
            insert_synthetic_deal(
                &txn,
                partner_id,
                credit.deal_id,
                ADJUSTMENT_CREDIT_CLIENT,
                credit.amount,
                credit.deal_state,
                credit.credited_at,
            )
            .await?;
        }
        let appended = ledger::append_entry(&txn, &plan.entry, actor).await?;
        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Partner,
                partner_id,
                AuditAction::ManualAdjustment,
                actor,
            )
            .with_metadata(json!({
                "amount": plan.entry.amount,
                "reason": plan.reason,
                "ledger_entry_id": appended.id,
                "deal_id": plan.credit.as_ref().map(|c| c.deal_id),
            })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        info!(%partner_id, amount = %plan.entry.amount, %admin, "manual adjustment appended");
        Ok(appended)
    }
}
