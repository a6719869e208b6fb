//! Academy completion bonus.
//!
//! The bonus is recorded against a synthetic deal that is already closed with
//! an approved commission, so the next payout batch picks it up like any other
//! approved commission.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use referra_shared::types::DealId;

use crate::deal::{CommissionStatus, DealState, DealStatus, PaymentStatus};
use crate::error::EngineError;
use crate::ledger::NewLedgerEntry;
use crate::money::validate_positive;
use crate::partner::PartnerRecord;

/// Client name shown on the synthetic bonus deal.
pub const ACADEMY_BONUS_CLIENT: &str = "Academy completion bonus";

/// Everything an award writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcademyAward {
    /// ID of the synthetic deal.
    pub deal_id: DealId,
    /// Bonus amount.
    pub amount: Decimal,
    /// State of the synthetic deal.
    pub deal_state: DealState,
    /// Sale and approval date of the synthetic deal.
    pub awarded_at: DateTime<Utc>,
    /// `academy_bonus` entry.
    pub entry: NewLedgerEntry,
}

/// Result of an award request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcademyOutcome {
    /// First award; persist it.
    Awarded(AcademyAward),
    /// The partner already received the bonus. Nothing to write.
    AlreadyAwarded,
}

/// Stateless service for the academy bonus.
pub struct AcademyBonus;

impl AcademyBonus {
    /// State of the synthetic bonus deal.
    pub const DEAL_STATE: DealState = DealState {
        deal: DealStatus::Closed,
        commission: CommissionStatus::Approved,
        payment: PaymentStatus::Pending,
    };

    /// Decides an award for `partner`.
    ///
    /// # Errors
    ///
    /// * `Validation` if the configured amount is not positive
    /// * `StateConflict` if the partner is not active
    pub fn plan(
        partner: &PartnerRecord,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<AcademyOutcome, EngineError> {
        if partner.has_received_academy_bonus {
            return Ok(AcademyOutcome::AlreadyAwarded);
        }
        partner.ensure_active()?;
        let amount = validate_positive("academy bonus amount", amount)?;
        let deal_id = DealId::new();

        Ok(AcademyOutcome::Awarded(AcademyAward {
            deal_id,
            amount,
            deal_state: Self::DEAL_STATE,
            awarded_at: now,
            entry: NewLedgerEntry::academy_bonus(partner.id, deal_id, amount)
                .with_description(ACADEMY_BONUS_CLIENT),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::service::tests::partner;
    use crate::ledger::LedgerEntryType;
    use crate::tier::Tier;
    use rust_decimal_macros::dec;

    #[test]
    fn test_first_award() {
        let partner = partner(Tier::Referral);
        let AcademyOutcome::Awarded(award) =
            AcademyBonus::plan(&partner, dec!(100), Utc::now()).unwrap()
        else {
            panic!("expected award");
        };
        assert_eq!(award.amount, dec!(100));
        assert_eq!(award.entry.entry_type, LedgerEntryType::AcademyBonus);
        assert_eq!(award.entry.related_deal_id, Some(award.deal_id));
        assert!(award.deal_state.is_valid());
        assert!(award.entry.validate().is_ok());
    }

    #[test]
    fn test_second_award_is_noop() {
        let mut partner = partner(Tier::Referral);
        partner.has_received_academy_bonus = true;
        assert_eq!(
            AcademyBonus::plan(&partner, dec!(100), Utc::now()).unwrap(),
            AcademyOutcome::AlreadyAwarded
        );
    }

    #[test]
    fn test_zero_bonus_rejected() {
        let partner = partner(Tier::Referral);
        assert!(matches!(
            AcademyBonus::plan(&partner, dec!(0), Utc::now()),
            Err(EngineError::Validation(_))
        ));
    }
}
