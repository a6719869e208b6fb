//! Per-deal payout allocation.
//!
//! A batch pays each partner their approved balance net of debt, so a deal can
//! settle for less than its commission. `payout_amount` holds what the batch
//! actually transfers for the deal.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(ADD_PAYOUT_AMOUNT_SQL)
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DROP_PAYOUT_AMOUNT_SQL)
            .await?;
        Ok(())
    }
}

const ADD_PAYOUT_AMOUNT_SQL: &str = r"
ALTER TABLE deals ADD COLUMN payout_amount NUMERIC(19, 2);

ALTER TABLE deals ADD CONSTRAINT chk_deal_payout_amount CHECK (
    payout_amount IS NULL
    OR (payout_batch_id IS NOT NULL
        AND payout_amount >= 0
        AND payout_amount <= commission_amount)
);
";

const DROP_PAYOUT_AMOUNT_SQL: &str = r"
ALTER TABLE deals DROP CONSTRAINT IF EXISTS chk_deal_payout_amount;
ALTER TABLE deals DROP COLUMN IF EXISTS payout_amount;
";
