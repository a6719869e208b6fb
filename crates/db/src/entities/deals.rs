//! `SeaORM` Entity for deals table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{CommissionStatus, DealStatus, PaymentStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub partner_id: Uuid,
    pub client_name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub estimated_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub final_value: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((5, 4)))")]
    pub commission_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub commission_amount: Option<Decimal>,
    pub deal_status: DealStatus,
    pub commission_status: CommissionStatus,
    pub payment_status: PaymentStatus,
    pub sale_date: Option<DateTimeWithTimeZone>,
    pub approval_date: Option<DateTimeWithTimeZone>,
    pub payout_batch_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub payout_amount: Option<Decimal>,
    pub is_synthetic: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::partners::Entity",
        from = "Column::PartnerId",
        to = "super::partners::Column::Id"
    )]
    Partners,
    #[sea_orm(
        belongs_to = "super::payout_batches::Entity",
        from = "Column::PayoutBatchId",
        to = "super::payout_batches::Column::Id"
    )]
    PayoutBatches,
}

impl Related<super::partners::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partners.def()
    }
}

impl Related<super::payout_batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PayoutBatches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
