//! Academy completion bonus.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde_json::json;
use tracing::{debug, info};

use referra_core::academy::{ACADEMY_BONUS_CLIENT, AcademyBonus, AcademyOutcome};
use referra_core::audit::{Actor, AuditAction, AuditEntityType, NewAuditRecord};
use referra_core::collaborators::{Notification, NotificationEvent, Notifier};
use referra_core::error::EngineError;
use referra_core::partner::PartnerRecord;
use referra_shared::types::PartnerId;

use crate::entities::partners;
use crate::notify::dispatch;

use super::deal::insert_synthetic_deal;
use super::partner::find_partner;
use super::{audit, ledger};

/// Awards the one-time academy bonus.
#[derive(Clone)]
pub struct AcademyRepository {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
}

impl AcademyRepository {
    /// Creates a new academy repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Awards the bonus unless the partner already received it.
    ///
    /// Concurrent calls for the same partner award exactly once: the flag is
    /// flipped by an update guarded on its old value, and the loser reports
    /// [`AcademyOutcome::AlreadyAwarded`].
    pub async fn award(
        &self,
        partner_id: PartnerId,
        amount: Decimal,
        actor: Actor,
    ) -> Result<AcademyOutcome, EngineError> {
        let txn = self.db.begin().await.map_err(EngineError::persistence)?;

        let partner: PartnerRecord = find_partner(&txn, partner_id).await?.into();
        let award = match AcademyBonus::plan(&partner, amount, Utc::now())? {
            AcademyOutcome::AlreadyAwarded => {
                debug!(%partner_id, "academy bonus already awarded");
                return Ok(AcademyOutcome::AlreadyAwarded);
            }
            AcademyOutcome::Awarded(award) => award,
        };

        let flipped = partners::Entity::update_many()
            .set(partners::ActiveModel {
                has_received_academy_bonus: Set(true),
                ..Default::default()
            })
            .filter(partners::Column::Id.eq(partner_id.into_inner()))
            .filter(partners::Column::HasReceivedAcademyBonus.eq(false))
            .exec(&txn)
            .await
            .map_err(EngineError::persistence)?;
        if flipped.rows_affected == 0 {
            debug!(%partner_id, "academy bonus awarded concurrently");
            return Ok(AcademyOutcome::AlreadyAwarded);
        }

        insert_synthetic_deal(
            &txn,
            partner_id,
            award.deal_id,
            ACADEMY_BONUS_CLIENT,
            award.amount,
            award.deal_state,
            award.awarded_at,
        )
        .await?;
        let entry = ledger::append_entry(&txn, &award.entry, actor).await?;
        audit::record(
            &txn,
            NewAuditRecord::new(
                AuditEntityType::Partner,
                partner_id,
                AuditAction::AcademyBonusAwarded,
                actor,
            )
            .with_metadata(json!({
                "amount": award.amount,
                "deal_id": award.deal_id,
                "ledger_entry_id": entry.id,
            })),
        )
        .await?;

        txn.commit().await.map_err(EngineError::persistence)?;

        info!(%partner_id, amount = %award.amount, "academy bonus awarded");
        dispatch(
            self.notifier.as_ref(),
            vec![Notification::new(
                partner_id,
                NotificationEvent::AcademyBonusAwarded,
                json!({ "amount": award.amount }),
            )],
        )
        .await;
        Ok(AcademyOutcome::Awarded(award))
    }
}
