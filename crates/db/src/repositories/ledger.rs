//! Ledger store: append-only commission journal.
//!
//! [`append_entry`] is the only write and always runs on the caller's open
//! transaction, so the entry commits or rolls back with the mutation that
//! caused it.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use uuid::Uuid;

use referra_core::audit::Actor;
use referra_core::error::EngineError;
use referra_core::ledger::{LedgerEntry, LedgerTotals, NewLedgerEntry, PartnerBalance};
use referra_shared::types::{LedgerEntryId, PageRequest, PageResponse, PartnerId};

use crate::convert::stamp;
use crate::entities::{ledger_entries, partners, sea_orm_active_enums::LedgerEntryType};

/// Appends one entry on `conn`.
pub(crate) async fn append_entry<C: ConnectionTrait>(
    conn: &C,
    entry: &NewLedgerEntry,
    actor: Actor,
) -> Result<LedgerEntry, EngineError> {
    entry.validate()?;
    let model = ledger_entries::ActiveModel {
        id: Set(LedgerEntryId::new().into_inner()),
        partner_id: Set(entry.partner_id.into_inner()),
        entry_type: Set(entry.entry_type.into()),
        amount: Set(entry.amount),
        related_deal_id: Set(entry.related_deal_id.map(Into::into)),
        batch_id: Set(entry.batch_id.map(Into::into)),
        description: Set(entry.description.clone()),
        created_by: Set(actor.to_string()),
        created_at: Set(stamp(Utc::now())),
    }
    .insert(conn)
    .await
    .map_err(EngineError::persistence)?;

    Ok(model.into())
}

/// Per-type totals for each of `partner_ids`, in one grouped query.
pub(crate) async fn totals_for<C: ConnectionTrait>(
    conn: &C,
    partner_ids: &[PartnerId],
) -> Result<HashMap<PartnerId, LedgerTotals>, EngineError> {
    if partner_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = partner_ids.iter().map(|id| id.into_inner()).collect();
    let rows: Vec<(Uuid, LedgerEntryType, Decimal)> = ledger_entries::Entity::find()
        .select_only()
        .column(ledger_entries::Column::PartnerId)
        .column(ledger_entries::Column::EntryType)
        .column_as(Expr::col(ledger_entries::Column::Amount).sum(), "total")
        .filter(ledger_entries::Column::PartnerId.is_in(ids))
        .group_by(ledger_entries::Column::PartnerId)
        .group_by(ledger_entries::Column::EntryType)
        .into_tuple()
        .all(conn)
        .await
        .map_err(EngineError::persistence)?;

    let mut totals: HashMap<PartnerId, LedgerTotals> = HashMap::new();
    for (partner_id, entry_type, amount) in rows {
        totals
            .entry(partner_id.into())
            .or_default()
            .add(entry_type.into(), amount);
    }
    Ok(totals)
}

/// Derived balance of one partner, read on `conn`.
pub(crate) async fn balance_on<C: ConnectionTrait>(
    conn: &C,
    partner_id: PartnerId,
) -> Result<PartnerBalance, EngineError> {
    let totals = totals_for(conn, &[partner_id]).await?;
    Ok(totals.get(&partner_id).map_or_else(
        || PartnerBalance::empty(partner_id),
        |t| PartnerBalance::from_totals(partner_id, t),
    ))
}

/// Read side of the ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Every entry of a partner, oldest first (ties by id).
    pub async fn entries_for(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        let entries = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::PartnerId.eq(partner_id.into_inner()))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await
            .map_err(EngineError::persistence)?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    /// One page of a partner's entries, in ledger order.
    pub async fn entries_page(
        &self,
        partner_id: PartnerId,
        page: &PageRequest,
    ) -> Result<PageResponse<LedgerEntry>, EngineError> {
        let page = page.normalized();
        let query = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::PartnerId.eq(partner_id.into_inner()));

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(EngineError::persistence)?;
        let entries = query
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(EngineError::persistence)?;

        Ok(PageResponse::new(
            entries.into_iter().map(Into::into).collect(),
            page.page,
            page.per_page,
            total,
        ))
    }

    /// Derived balance of a partner.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown partner.
    pub async fn balance_for(&self, partner_id: PartnerId) -> Result<PartnerBalance, EngineError> {
        partners::Entity::find_by_id(partner_id.into_inner())
            .one(&self.db)
            .await
            .map_err(EngineError::persistence)?
            .ok_or_else(|| EngineError::not_found("partner", partner_id))?;
        balance_on(&self.db, partner_id).await
    }

    /// Derived balances of many partners. Partners without entries get zeros.
    pub async fn balances_for(
        &self,
        partner_ids: &[PartnerId],
    ) -> Result<Vec<PartnerBalance>, EngineError> {
        let totals = totals_for(&self.db, partner_ids).await?;
        Ok(partner_ids
            .iter()
            .map(|id| {
                totals.get(id).map_or_else(
                    || PartnerBalance::empty(*id),
                    |t| PartnerBalance::from_totals(*id, t),
                )
            })
            .collect())
    }
}
