//! Concurrency tests for the operations that must happen exactly once.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use referra_core::academy::AcademyOutcome;
use referra_core::audit::Actor;
use referra_core::deal::CommissionStatus;
use referra_core::error::EngineError;
use referra_core::ledger::LedgerEntryType;
use referra_core::payout::PayoutMonth;
use referra_db::{
    AcademyRepository, DbPasswordGate, LedgerRepository, PartnerRepository, PayoutRepository,
    SweepRepository,
};

use common::{ADMIN_PASSWORD, OnlyPartners};

#[tokio::test]
async fn test_concurrent_academy_awards_pay_once() {
    let Some(db) = common::setup().await else {
        return;
    };
    let partner = common::create_partner(&db, None).await;
    let academy = AcademyRepository::new(db.clone(), common::notifier());

    let num_tasks = 10;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let handles: Vec<_> = (0..num_tasks)
        .map(|_| {
            let academy = academy.clone();
            let barrier = Arc::clone(&barrier);
            let partner_id = partner.id;
            tokio::spawn(async move {
                barrier.wait().await;
                academy.award(partner_id, dec!(100), Actor::System).await
            })
        })
        .collect();

    let results = join_all(handles).await;
    let awarded = results
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("award failed"))
        .filter(|outcome| matches!(outcome, AcademyOutcome::Awarded(_)))
        .count();
    assert_eq!(awarded, 1, "bonus must be awarded exactly once");

    let entries = LedgerRepository::new(db.clone())
        .entries_for(partner.id)
        .await
        .unwrap();
    let bonuses: Vec<_> = entries
        .iter()
        .filter(|e| e.entry_type == LedgerEntryType::AcademyBonus)
        .collect();
    assert_eq!(bonuses.len(), 1);
    assert_eq!(bonuses[0].amount, dec!(100));

    let partner = PartnerRepository::new(db.clone())
        .find(partner.id)
        .await
        .unwrap();
    assert!(partner.has_received_academy_bonus);
}

#[tokio::test]
async fn test_concurrent_batch_completion_pays_once() {
    let Some(db) = common::setup().await else {
        return;
    };
    let admin = common::create_admin(&db).await;
    let partner = common::create_partner(&db, None).await;
    AcademyRepository::new(db.clone(), common::notifier())
        .award(partner.id, dec!(100), Actor::System)
        .await
        .unwrap();

    let payouts = PayoutRepository::new(db.clone(), common::notifier());
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
    let batch_id = generated.batch.id;

    let num_tasks = 5;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let handles: Vec<_> = (0..num_tasks)
        .map(|i| {
            let payouts = payouts.clone();
            let gate = DbPasswordGate::new(db.clone());
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                payouts
                    .complete(batch_id, &format!("WIRE-{i}"), admin, ADMIN_PASSWORD, &gate)
                    .await
            })
        })
        .collect();

    let mut completed = 0;
    let mut refused = 0;
    for joined in join_all(handles).await {
        match joined.expect("task panicked") {
            Ok(_) => completed += 1,
            Err(EngineError::AlreadyCompleted(id)) => {
                assert_eq!(id, batch_id);
                refused += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(completed, 1);
    assert_eq!(refused, num_tasks - 1);

    let entries = LedgerRepository::new(db.clone())
        .entries_for(partner.id)
        .await
        .unwrap();
    let paid = entries
        .iter()
        .filter(|e| e.entry_type == LedgerEntryType::CommissionPaid)
        .count();
    assert_eq!(paid, 1, "commission must be paid exactly once");
}

#[tokio::test]
async fn test_concurrent_sweeps_approve_each_commission_once() {
    let Some(db) = common::setup().await else {
        return;
    };
    let deals = common::deal_repo(&db);
    let partner = common::create_partner(&db, None).await;

    let mut deal_ids = Vec::new();
    for value in [dec!(100), dec!(200), dec!(300), dec!(400)] {
        deal_ids.push(common::closed_deal(&deals, partner.id, value, dec!(0.10)).await.id);
    }

    let num_tasks = 4;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let now = Utc::now() + Duration::days(15);
    let handles: Vec<_> = (0..num_tasks)
        .map(|_| {
            let sweep = SweepRepository::new(db.clone());
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                sweep.run(Duration::days(14), now).await
            })
        })
        .collect();

    for joined in join_all(handles).await {
        joined.expect("task panicked").expect("sweep failed");
    }

    for deal_id in deal_ids {
        let deal = deals.find(deal_id).await.unwrap();
        assert_eq!(deal.commission_status, CommissionStatus::Approved);
    }

    let ledger = LedgerRepository::new(db.clone());
    let approvals = ledger
        .entries_for(partner.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.entry_type == LedgerEntryType::CommissionApproved)
        .count();
    assert_eq!(approvals, 4, "each commission approved exactly once");

    let balance = ledger.balance_for(partner.id).await.unwrap();
    assert_eq!(balance.pending_commission, dec!(0));
    assert_eq!(balance.approved_balance, dec!(100));
}
