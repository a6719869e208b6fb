//! Conversions between database models and core records.

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;

use referra_core::audit::Actor;
use referra_core::deal::{self, DealRecord};
use referra_core::error::EngineError;
use referra_core::ledger::{self, LedgerEntry};
use referra_core::partner::{self, PartnerRecord};
use referra_core::payout::{self, PayoutBatchRecord, PayoutMonth};
use referra_core::tier::{Tier, TierStatus};

use crate::entities::{deals, ledger_entries, partners, payout_batches, sea_orm_active_enums as db};

pub(crate) fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub(crate) fn stamp(at: DateTime<Utc>) -> DateTimeWithTimeZone {
    at.fixed_offset()
}

impl From<db::PartnerTier> for Tier {
    fn from(tier: db::PartnerTier) -> Self {
        match tier {
            db::PartnerTier::Referral => Self::Referral,
            db::PartnerTier::Creator => Self::Creator,
            db::PartnerTier::Agency => Self::Agency,
            db::PartnerTier::Enterprise => Self::Enterprise,
        }
    }
}

impl From<Tier> for db::PartnerTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Referral => Self::Referral,
            Tier::Creator => Self::Creator,
            Tier::Agency => Self::Agency,
            Tier::Enterprise => Self::Enterprise,
        }
    }
}

impl From<db::PartnerStatus> for partner::PartnerStatus {
    fn from(status: db::PartnerStatus) -> Self {
        match status {
            db::PartnerStatus::Active => Self::Active,
            db::PartnerStatus::Suspended => Self::Suspended,
            db::PartnerStatus::Terminated => Self::Terminated,
        }
    }
}

impl From<db::DealStatus> for deal::DealStatus {
    fn from(status: db::DealStatus) -> Self {
        match status {
            db::DealStatus::Registered => Self::Registered,
            db::DealStatus::UnderReview => Self::UnderReview,
            db::DealStatus::Approved => Self::Approved,
            db::DealStatus::Closed => Self::Closed,
            db::DealStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<deal::DealStatus> for db::DealStatus {
    fn from(status: deal::DealStatus) -> Self {
        match status {
            deal::DealStatus::Registered => Self::Registered,
            deal::DealStatus::UnderReview => Self::UnderReview,
            deal::DealStatus::Approved => Self::Approved,
            deal::DealStatus::Closed => Self::Closed,
            deal::DealStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<db::CommissionStatus> for deal::CommissionStatus {
    fn from(status: db::CommissionStatus) -> Self {
        match status {
            db::CommissionStatus::Pending => Self::Pending,
            db::CommissionStatus::Approved => Self::Approved,
            db::CommissionStatus::Reversed => Self::Reversed,
            db::CommissionStatus::Paid => Self::Paid,
        }
    }
}

impl From<deal::CommissionStatus> for db::CommissionStatus {
    fn from(status: deal::CommissionStatus) -> Self {
        match status {
            deal::CommissionStatus::Pending => Self::Pending,
            deal::CommissionStatus::Approved => Self::Approved,
            deal::CommissionStatus::Reversed => Self::Reversed,
            deal::CommissionStatus::Paid => Self::Paid,
        }
    }
}

impl From<db::PaymentStatus> for deal::PaymentStatus {
    fn from(status: db::PaymentStatus) -> Self {
        match status {
            db::PaymentStatus::Pending => Self::Pending,
            db::PaymentStatus::Received => Self::Received,
            db::PaymentStatus::CommissionPaid => Self::CommissionPaid,
        }
    }
}

impl From<deal::PaymentStatus> for db::PaymentStatus {
    fn from(status: deal::PaymentStatus) -> Self {
        match status {
            deal::PaymentStatus::Pending => Self::Pending,
            deal::PaymentStatus::Received => Self::Received,
            deal::PaymentStatus::CommissionPaid => Self::CommissionPaid,
        }
    }
}

impl From<db::LedgerEntryType> for ledger::LedgerEntryType {
    fn from(entry_type: db::LedgerEntryType) -> Self {
        match entry_type {
            db::LedgerEntryType::CommissionEarned => Self::CommissionEarned,
            db::LedgerEntryType::CommissionApproved => Self::CommissionApproved,
            db::LedgerEntryType::CommissionPaid => Self::CommissionPaid,
            db::LedgerEntryType::Refund => Self::Refund,
            db::LedgerEntryType::Adjustment => Self::Adjustment,
            db::LedgerEntryType::AcademyBonus => Self::AcademyBonus,
        }
    }
}

impl From<ledger::LedgerEntryType> for db::LedgerEntryType {
    fn from(entry_type: ledger::LedgerEntryType) -> Self {
        match entry_type {
            ledger::LedgerEntryType::CommissionEarned => Self::CommissionEarned,
            ledger::LedgerEntryType::CommissionApproved => Self::CommissionApproved,
            ledger::LedgerEntryType::CommissionPaid => Self::CommissionPaid,
            ledger::LedgerEntryType::Refund => Self::Refund,
            ledger::LedgerEntryType::Adjustment => Self::Adjustment,
            ledger::LedgerEntryType::AcademyBonus => Self::AcademyBonus,
        }
    }
}

impl From<db::PayoutBatchStatus> for payout::PayoutBatchStatus {
    fn from(status: db::PayoutBatchStatus) -> Self {
        match status {
            db::PayoutBatchStatus::Processing => Self::Processing,
            db::PayoutBatchStatus::Completed => Self::Completed,
        }
    }
}

fn stored_actor(value: &str) -> Result<Actor, EngineError> {
    Actor::parse(value)
        .ok_or_else(|| EngineError::Persistence(format!("corrupt actor column: {value}")))
}

impl From<partners::Model> for PartnerRecord {
    fn from(model: partners::Model) -> Self {
        Self {
            id: model.id.into(),
            name: model.name,
            email: model.email,
            status: model.status.into(),
            tier: TierStatus {
                tier: model.tier.into(),
                tier_override: model.tier_override,
                tier_locked: model.tier_locked,
                tier_override_reason: model.tier_override_reason,
                tier_last_changed_at: model.tier_last_changed_at.map(utc),
                tier_last_changed_by: model.tier_last_changed_by,
            },
            lifetime_referred_revenue: model.lifetime_referred_revenue,
            has_received_academy_bonus: model.has_received_academy_bonus,
            created_at: utc(model.created_at),
        }
    }
}

impl From<deals::Model> for DealRecord {
    fn from(model: deals::Model) -> Self {
        Self {
            id: model.id.into(),
            partner_id: model.partner_id.into(),
            client_name: model.client_name,
            estimated_value: model.estimated_value,
            final_value: model.final_value,
            commission_rate: model.commission_rate,
            commission_amount: model.commission_amount,
            deal_status: model.deal_status.into(),
            commission_status: model.commission_status.into(),
            payment_status: model.payment_status.into(),
            sale_date: model.sale_date.map(utc),
            approval_date: model.approval_date.map(utc),
            payout_batch_id: model.payout_batch_id.map(Into::into),
            payout_amount: model.payout_amount,
            is_synthetic: model.is_synthetic,
            notes: model.notes,
            rejection_reason: model.rejection_reason,
            created_at: utc(model.created_at),
            version: model.version,
        }
    }
}

impl From<ledger_entries::Model> for LedgerEntry {
    fn from(model: ledger_entries::Model) -> Self {
        Self {
            id: model.id.into(),
            partner_id: model.partner_id.into(),
            entry_type: model.entry_type.into(),
            amount: model.amount,
            related_deal_id: model.related_deal_id.map(Into::into),
            batch_id: model.batch_id.map(Into::into),
            description: model.description,
            created_at: utc(model.created_at),
        }
    }
}

impl TryFrom<payout_batches::Model> for PayoutBatchRecord {
    type Error = EngineError;

    fn try_from(model: payout_batches::Model) -> Result<Self, Self::Error> {
        let payout_month: PayoutMonth = model.payout_month.parse().map_err(|_| {
            EngineError::Persistence(format!("corrupt payout month: {}", model.payout_month))
        })?;
        Ok(Self {
            id: model.id.into(),
            payout_month,
            payout_date: model.payout_date,
            total_amount: model.total_amount,
            status: model.status.into(),
            reference_number: model.reference_number,
            partner_count: model.partner_count,
            deal_count: model.deal_count,
            created_by: stored_actor(&model.created_by)?,
            completed_by: model.completed_by.as_deref().map(stored_actor).transpose()?,
            completed_at: model.completed_at.map(utc),
        })
    }
}
