use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use unit_ledger::application::wallets::DonationRequest;
use unit_ledger::application::webhook::SignatureVerifier;
use unit_ledger::config::LedgerConfig;
use unit_ledger::domain::actor::Role;
use unit_ledger::domain::approval::{ApprovalStatus, Decision};
use unit_ledger::domain::donation::{CommissionFilter, PaymentMethod};
use unit_ledger::domain::ids::FellowshipId;
use unit_ledger::domain::money::Amount;
use unit_ledger::domain::transaction::{TransactionFilter, TransactionStatus};
use unit_ledger::domain::wallet::Department;
use unit_ledger::error::WalletError;
use unit_ledger::infrastructure::in_memory::InMemoryMemberDirectory;

mod common;
use common::{engine, engine_with, funded_wallet, officer, unit_head};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_donations_do_not_lose_updates() {
    const DONATIONS: usize = 200;
    let engine = Arc::new(engine());
    let wallet_id = funded_wallet(&engine, "media", dec!(1)).await;

    let mut handles = Vec::with_capacity(DONATIONS);
    for i in 0..DONATIONS {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .record_donation(
                    DonationRequest {
                        wallet_id,
                        member_id: None,
                        amount: Amount::new(dec!(2.50)).unwrap(),
                        payment_method: PaymentMethod::Cash,
                        reference: Some(format!("CASH-{i}")),
                        note: None,
                    },
                    &officer(Role::Worker, 3),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let view = engine.get_wallet(wallet_id, &officer(Role::Worker, 3)).await.unwrap();
    assert_eq!(
        view.wallet.balance.value(),
        dec!(1) + Decimal::from(DONATIONS as u64) * dec!(2.50)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_approvers_yield_exactly_one_success() {
    for _ in 0..20 {
        let engine = Arc::new(engine());
        let wallet_id = funded_wallet(&engine, "music", dec!(500)).await;
        let tx_id = engine
            .request_withdrawal(wallet_id, dec!(100), "Cables", &unit_head("music"))
            .await
            .unwrap()
            .transaction
            .id;
        engine
            .act_on_approval(tx_id, &officer(Role::SecretaryGeneral, 1), Decision::Approve, None)
            .await
            .unwrap();

        let attempts: Vec<_> = (0..2)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .act_on_approval(tx_id, &officer(Role::President, 10 + i), Decision::Approve, None)
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(WalletError::NotFound(_)) | Err(WalletError::OutOfOrder(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);

        let timeline = engine
            .approval_timeline(tx_id, &officer(Role::President, 10))
            .await
            .unwrap();
        assert_eq!(timeline[1].status, ApprovalStatus::Approved);
        assert_eq!(timeline[2].status, ApprovalStatus::Pending);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_randomized_approval_order_never_skips_a_step() {
    let chain = [
        Role::SecretaryGeneral,
        Role::President,
        Role::VicePresident,
        Role::SecretaryGeneral,
        Role::FinancialSecretary,
    ];
    let mut rng = rand::thread_rng();

    for round in 0..10 {
        let engine = Arc::new(engine());
        let wallet_id = funded_wallet(&engine, "ushering", dec!(1000)).await;
        let tx_id = engine
            .request_withdrawal(wallet_id, dec!(250), "Uniforms", &unit_head("ushering"))
            .await
            .unwrap()
            .transaction
            .id;

        // Keep firing every role, in random order, until the chain completes.
        let mut approved_orders = Vec::new();
        for _ in 0..chain.len() * 4 {
            let mut roles = chain.to_vec();
            roles.shuffle(&mut rng);
            let attempts: Vec<_> = roles
                .into_iter()
                .enumerate()
                .map(|(i, role)| {
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        engine
                            .act_on_approval(tx_id, &officer(role, i as u64 + 1), Decision::Approve, None)
                            .await
                    })
                })
                .collect();
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(outcome) => approved_orders.push(outcome.step.order),
                    Err(e) => assert!(
                        matches!(
                            e,
                            WalletError::OutOfOrder(_) | WalletError::NotFound(_) | WalletError::Conflict(_)
                        ),
                        "round {round}: unexpected error {e}"
                    ),
                }
            }
            if approved_orders.len() == chain.len() {
                break;
            }
        }

        approved_orders.sort_unstable();
        assert_eq!(approved_orders, vec![1, 2, 3, 4, 5], "round {round}");
        let timeline = engine
            .approval_timeline(tx_id, &officer(Role::President, 1))
            .await
            .unwrap();
        for pair in timeline.windows(2) {
            assert!(pair[0].decided_at <= pair[1].decided_at);
        }
        let view = engine.get_wallet(wallet_id, &officer(Role::President, 1)).await.unwrap();
        let tx = view
            .recent_transactions
            .iter()
            .find(|t| t.id == tx_id)
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Approved);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_webhook_redelivery_credits_once() {
    const DELIVERIES: usize = 16;
    let mut config = LedgerConfig::default();
    config.webhook.secret = Some("whsec_race".to_string());
    let engine = Arc::new(engine_with(config, InMemoryMemberDirectory::new()));
    let president = officer(Role::President, 1);
    let wallet = engine
        .wallets()
        .get_or_create_wallet(FellowshipId(1), &Department::new("choir").unwrap())
        .await
        .unwrap();
    engine
        .wallets()
        .link_virtual_account(wallet.id, "7700112233", &president)
        .await
        .unwrap();

    let body: &'static [u8] =
        br#"{"account_number":"7700112233","amount":1000,"reference":"VP-RACE","payer_name":"Ada"}"#;
    let signature = SignatureVerifier::new(Some("whsec_race")).sign(body).unwrap();

    let deliveries: Vec<_> = (0..DELIVERIES)
        .map(|_| {
            let engine = engine.clone();
            let signature = signature.clone();
            tokio::spawn(async move { engine.ingest_payment_webhook(body, &signature).await })
        })
        .collect();

    let mut acks = Vec::with_capacity(DELIVERIES);
    for delivery in deliveries {
        acks.push(delivery.await.unwrap().unwrap());
    }
    assert_eq!(acks.iter().filter(|ack| !ack.duplicate).count(), 1);
    assert!(acks.iter().all(|ack| ack.transaction_id == acks[0].transaction_id));
    assert!(acks.iter().all(|ack| ack.net_amount == dec!(980)));

    let secretary = officer(Role::FinancialSecretary, 4);
    let view = engine.get_wallet(wallet.id, &secretary).await.unwrap();
    assert_eq!(view.wallet.balance.value(), dec!(980));
    assert_eq!(view.recent_donations.len(), 1);

    let transactions = engine
        .list_transactions(FellowshipId(1), &TransactionFilter::default(), &secretary)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);

    let report = engine
        .get_commission_report(
            &CommissionFilter {
                fellowship_id: Some(FellowshipId(1)),
                ..Default::default()
            },
            &secretary,
        )
        .await
        .unwrap();
    assert_eq!(report.totals.count, 1);
    assert_eq!(report.totals.total_processed, dec!(1000));
}
