//! End-to-end commission lifecycle against a live database.
//!
//! Runs the approval sweep with a shifted clock, so it lives in its own test
//! binary and in a single test function.

#![allow(clippy::too_many_lines)]

mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use referra_core::audit::Actor;
use referra_core::deal::{CommissionStatus, DealStatus, PaymentStatus};
use referra_core::error::EngineError;
use referra_core::ledger::LedgerEntryType;
use referra_core::payout::{PayoutBatchStatus, PayoutMonth};
use referra_core::tier::Tier;
use referra_db::{DbPasswordGate, LedgerRepository, PayoutRepository, SweepRepository};

use common::{ADMIN_PASSWORD, OnlyPartners};

#[tokio::test]
async fn test_deal_to_payout_lifecycle() {
    let Some(db) = common::setup().await else {
        return;
    };
    let deals = common::deal_repo(&db);
    let ledger = LedgerRepository::new(db.clone());
    let payouts = PayoutRepository::new(db.clone(), common::notifier());
    let gate = DbPasswordGate::new(db.clone());
    let admin = common::create_admin(&db).await;

    // Closing a $1,000 deal at 10% earns a pending $100.
    let partner = common::create_partner(&db, Some(Tier::Referral)).await;
    let deal = common::closed_deal(&deals, partner.id, dec!(1000), dec!(0.10)).await;
    assert_eq!(deal.deal_status, DealStatus::Closed);
    assert_eq!(deal.commission_status, CommissionStatus::Pending);
    assert_eq!(deal.commission_amount, Some(dec!(100.00)));
    assert!(deal.sale_date.is_some());

    let balance = ledger.balance_for(partner.id).await.unwrap();
    assert_eq!(balance.pending_commission, dec!(100));
    assert_eq!(balance.approved_balance, dec!(0));

    // Closing again changes nothing.
    let again = deals.close(deal.id, Actor::System).await.unwrap();
    assert!(again.already_closed);
    assert!(again.earned.is_none());
    let entries = ledger.entries_for(partner.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::CommissionEarned);

    // Inside the hold period the sweep leaves it alone.
    SweepRepository::new(db.clone())
        .run(Duration::days(14), Utc::now() + Duration::days(13))
        .await
        .unwrap();
    let still_pending = deals.find(deal.id).await.unwrap();
    assert_eq!(still_pending.commission_status, CommissionStatus::Pending);

    // Fifteen days later it is approved.
    let report = SweepRepository::new(db.clone())
        .run(Duration::days(14), Utc::now() + Duration::days(15))
        .await
        .unwrap();
    assert!(report.approved_count >= 1);
    let approved = deals.find(deal.id).await.unwrap();
    assert_eq!(approved.commission_status, CommissionStatus::Approved);
    assert!(approved.approval_date.is_some());

    let balance = ledger.balance_for(partner.id).await.unwrap();
    assert_eq!(balance.pending_commission, dec!(0));
    assert_eq!(balance.approved_balance, dec!(100));

    // Generating a batch claims the approved commission.
    let today = Utc::now().date_naive();
    let generated = payouts
        .generate(
            PayoutMonth::of(today),
            today,
            dec!(50),
            &OnlyPartners::one(partner.id),
            Actor::Admin(admin),
        )
        .await
        .unwrap();
    assert_eq!(generated.batch.status, PayoutBatchStatus::Processing);
    assert_eq!(generated.batch.total_amount, dec!(100));
    assert_eq!(generated.batch.partner_count, 1);
    assert_eq!(generated.batch.deal_count, 1);
    assert_eq!(generated.plan.partners[0].partner_id, partner.id);

    let claimed = deals.find(deal.id).await.unwrap();
    assert_eq!(claimed.payout_batch_id, Some(generated.batch.id));

    // Nothing left to batch for this partner.
    let empty = payouts
        .generate(
            PayoutMonth::of(today),
            today,
            dec!(50),
            &OnlyPartners::one(partner.id),
            Actor::Admin(admin),
        )
        .await;
    assert!(matches!(empty, Err(EngineError::NoEligiblePartners)));

    // Completion needs a reference and the admin's password.
    let blank = payouts
        .complete(generated.batch.id, "   ", admin, ADMIN_PASSWORD, &gate)
        .await;
    assert!(matches!(blank, Err(EngineError::Validation(_))));

    let wrong = payouts
        .complete(generated.batch.id, "WIRE-001", admin, "not-the-password", &gate)
        .await;
    assert!(matches!(wrong, Err(EngineError::Unauthorized(_))));

    let completed = payouts
        .complete(generated.batch.id, "WIRE-001", admin, ADMIN_PASSWORD, &gate)
        .await
        .unwrap();
    assert_eq!(completed.batch.status, PayoutBatchStatus::Completed);
    assert_eq!(completed.batch.reference_number.as_deref(), Some("WIRE-001"));
    assert_eq!(completed.batch.completed_by, Some(Actor::Admin(admin)));
    assert_eq!(completed.paid_deals, 1);
    assert_eq!(completed.paid_total, dec!(100));

    let paid = deals.find(deal.id).await.unwrap();
    assert_eq!(paid.commission_status, CommissionStatus::Paid);
    assert_eq!(paid.payment_status, PaymentStatus::CommissionPaid);

    let balance = ledger.balance_for(partner.id).await.unwrap();
    assert_eq!(balance.approved_balance, dec!(0));
    assert_eq!(balance.paid_commission, dec!(100));

    // A second completion is refused.
    let twice = payouts
        .complete(generated.batch.id, "WIRE-002", admin, ADMIN_PASSWORD, &gate)
        .await;
    assert!(matches!(twice, Err(EngineError::AlreadyCompleted(id)) if id == generated.batch.id));

    let entries = ledger.entries_for(partner.id).await.unwrap();
    let kinds: Vec<_> = entries.iter().map(|e| e.entry_type).collect();
    assert_eq!(
        kinds,
        vec![
            LedgerEntryType::CommissionEarned,
            LedgerEntryType::CommissionApproved,
            LedgerEntryType::CommissionPaid,
        ]
    );
}
