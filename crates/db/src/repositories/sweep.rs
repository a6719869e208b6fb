//! Commission approval sweep.
//!
//! Safe to run repeatedly and concurrently: each candidate is promoted in its
//! own transaction by an update guarded on `commission_status = 'pending'`,
//! and a guard miss is counted as skipped.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
    sea_query::Expr,
};
use serde_json::json;
use tracing::{debug, info};

use referra_core::audit::{Actor, AuditAction, AuditEntityType, NewAuditRecord};
use referra_core::deal::DealRecord;
use referra_core::error::EngineError;
use referra_core::sweep::{ApprovalSweep, SweepReport};

use crate::convert::stamp;
use crate::entities::{
    deals,
    sea_orm_active_enums::{CommissionStatus, DealStatus},
};

use super::{audit, ledger};

/// Runs the approval sweep.
#[derive(Debug, Clone)]
pub struct SweepRepository {
    db: DatabaseConnection,
}

impl SweepRepository {
    /// Creates a new sweep repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Approves every pending commission whose sale closed at least
    /// `hold_period` before `now`.
    pub async fn run(
        &self,
        hold_period: Duration,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, EngineError> {
        let cutoff = ApprovalSweep::cutoff(now, hold_period);
        let candidates: Vec<DealRecord> = deals::Entity::find()
            .filter(deals::Column::CommissionStatus.eq(CommissionStatus::Pending))
            .filter(deals::Column::DealStatus.eq(DealStatus::Closed))
            .filter(deals::Column::SaleDate.lte(stamp(cutoff)))
            .order_by_asc(deals::Column::SaleDate)
            .order_by_asc(deals::Column::Id)
            .all(&self.db)
            .await
            .map_err(EngineError::persistence)?
            .into_iter()
            .map(Into::into)
            .collect();

        let mut report = SweepReport::default();
        for deal in candidates.iter().filter(|d| ApprovalSweep::is_due(d, cutoff)) {
            if self.promote(deal, now).await? {
                report.record_approved(deal.commission());
            } else {
                report.record_skipped();
            }
        }

        info!(
            approved = report.approved_count,
            total = %report.approved_total,
            skipped = report.skipped_count,
            "approval sweep finished"
        );
        Ok(report)
    }

    /// Promotes one commission. Returns false on a guard miss.
    async fn promote(&self, deal: &DealRecord, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let promotion = ApprovalSweep::promote(deal, now)?;

        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let result = deals::Entity::update_many()
            .set(deals::ActiveModel {
                commission_status: Set(CommissionStatus::Approved),
                approval_date: Set(Some(stamp(promotion.approval_date))),
                ..Default::default()
            })
            .col_expr(deals::Column::Version, Expr::col(deals::Column::Version).add(1))
            .filter(deals::Column::Id.eq(deal.id.into_inner()))
            .filter(deals::Column::CommissionStatus.eq(CommissionStatus::Pending))
            .filter(deals::Column::DealStatus.eq(DealStatus::Closed))
            .exec(&txn)
            .await
            .map_err(EngineError::persistence)?;

        if result.rows_affected == 0 {
            debug!(deal_id = %deal.id, "commission no longer pending, skipped");
            return Ok(false);
        }

        if let Some(entry) = &promotion.entry {
            ledger::append_entry(&txn, entry, Actor::System).await?;
        }
        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Deal,
                deal.id,
                AuditAction::DealStatusChanged,
                Actor::System,
            )
            .with_metadata(json!({
                "commission_status": "approved",
                "amount": deal.commission(),
                "approval_date": promotion.approval_date,
            })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;
        Ok(true)
    }
}
