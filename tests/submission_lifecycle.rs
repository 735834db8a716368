//! End-to-end lifecycle tests against the in-memory ledger.

use std::time::Duration;

use crowdfund_client::ledger::memory::BLOCKHASH_VALIDITY;
use crowdfund_client::ledger::{AccountSnapshot, LedgerError, Pubkey};
use crowdfund_client::{CampaignError, RejectionKind, SubmissionOutcome, SubmissionState};

mod common;

use common::PROGRAM;

#[tokio::test]
async fn test_create_then_list_round_trip() {
    let (_ledger, client) = common::setup();

    let outcome = client.create_campaign("Water Project", "Clean water access").await.unwrap();
    assert!(outcome.is_confirmed(), "unexpected outcome: {:?}", outcome);

    let campaigns = client.list_campaigns().await.unwrap();
    assert_eq!(campaigns.len(), 1);
    let campaign = &campaigns[0];
    assert_eq!(campaign.address, client.campaign_address().unwrap());
    assert_eq!(campaign.admin, client.requester());
    assert_eq!(campaign.name, "Water Project");
    assert_eq!(campaign.description, "Clean water access");
    assert_eq!(campaign.amount_raised, 0);
}

#[tokio::test]
async fn test_address_derivation_is_deterministic() {
    let (ledger, client) = common::setup();
    let same_wallet = common::client_for(&ledger, 1);
    let other_wallet = common::client_for(&ledger, 2);

    assert_eq!(client.campaign_address().unwrap(), same_wallet.campaign_address().unwrap());
    assert_ne!(client.campaign_address().unwrap(), other_wallet.campaign_address().unwrap());
}

#[tokio::test]
async fn test_create_twice_is_rejected_locally() {
    let (ledger, client) = common::setup();
    assert!(client.create_campaign("a", "b").await.unwrap().is_confirmed());
    let sends = ledger.send_count();

    let address = client.campaign_address().unwrap();
    assert_eq!(
        client.create_campaign("a", "b").await,
        Err(CampaignError::CampaignExists(address))
    );
    assert_eq!(ledger.send_count(), sends);
}

#[tokio::test]
async fn test_confirmed_donation_updates_amount_raised() {
    let (ledger, client) = common::setup();
    let donor = common::client_for(&ledger, 2);
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "Water Project", "Clean water access", 1_000);

    let before = donor.list_campaigns().await.unwrap();
    assert_eq!(before[0].amount_raised, 1_000);

    let outcome = donor.donate(address, 2_500).await.unwrap();
    assert!(outcome.is_confirmed());

    // The facade refreshed after the outcome; the cache already reflects it.
    assert_eq!(donor.campaign(&address).unwrap().amount_raised, 3_500);
    let after = donor.list_campaigns().await.unwrap();
    assert_eq!(after[0].amount_raised, 3_500);
}

#[tokio::test]
async fn test_withdraw_below_reserve_rejected_locally() {
    let (ledger, client) = common::setup();
    let address = client.campaign_address().unwrap();
    ledger.set_reserve_floor(100_000_000);
    ledger.seed_campaign(address, client.requester(), "n", "d", 900_000_000);
    assert_eq!(ledger.balance(&address), 1_000_000_000);

    let err = client.withdraw(address, 950_000_000).await.unwrap_err();
    assert_eq!(
        err,
        CampaignError::InsufficientReserve {
            requested: 950_000_000,
            available: 900_000_000,
            reserve_floor: 100_000_000,
        }
    );
    assert_eq!(ledger.send_count(), 0);
    assert_eq!(ledger.blockhash_requests(), 0);

    let outcome = client.withdraw(address, 850_000_000).await.unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(ledger.balance(&address), 150_000_000);
    assert_eq!(client.campaign(&address).unwrap().amount_raised, 50_000_000);
}

#[tokio::test]
async fn test_second_intent_while_confirming_is_rejected() {
    let (ledger, client) = common::setup();
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 0);
    ledger.set_hold_confirmations(true);

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.donate(address, 100).await })
    };
    while client.in_flight(&address) != Some(SubmissionState::Confirming) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(
        client.donate(address, 200).await,
        Err(CampaignError::AlreadyInFlight(address))
    );
    assert_eq!(ledger.send_count(), 1);

    ledger.release_held();
    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.is_confirmed());
    assert!(client.in_flight(&address).is_none());

    // The address is free again once the first submission is terminal.
    ledger.set_hold_confirmations(false);
    assert!(client.donate(address, 200).await.unwrap().is_confirmed());
}

#[tokio::test]
async fn test_second_intent_while_submitting_is_rejected() {
    let (ledger, client) = common::setup();
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 0);
    ledger.pause_sends();

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.donate(address, 100).await })
    };
    while client.in_flight(&address) != Some(SubmissionState::Submitted) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(
        client.donate(address, 200).await,
        Err(CampaignError::AlreadyInFlight(address))
    );
    assert_eq!(ledger.send_count(), 0);

    ledger.resume_sends();
    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(ledger.send_count(), 1);
    assert_eq!(client.campaign(&address).unwrap().amount_raised, 100);
}

#[tokio::test]
async fn test_retry_budget_exhausted_after_three_submissions() {
    let (ledger, client) = common::setup();
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 0);
    for _ in 0..3 {
        ledger.push_send_failure(LedgerError::RateLimited);
    }

    let outcome = client.donate(address, 100).await.unwrap();
    match outcome {
        SubmissionOutcome::Rejected { ref cause, attempts } => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                cause,
                CampaignError::NodeRejected {
                    kind: RejectionKind::Transient,
                    ..
                }
            ));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(ledger.send_count(), 3);
    assert_eq!(client.campaign(&address).unwrap().amount_raised, 0);
}

#[tokio::test]
async fn test_create_has_larger_retry_budget() {
    let (ledger, client) = common::setup();
    for _ in 0..4 {
        ledger.push_send_failure(LedgerError::Timeout(10));
    }

    let outcome = client.create_campaign("n", "d").await.unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(ledger.send_count(), 5);
}

#[tokio::test]
async fn test_permanent_rejection_not_retried() {
    let (ledger, client) = common::setup();
    let poor = common::client_for(&ledger, 3);
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 0);

    let outcome = poor.donate(address, common::WALLET_FUNDS + 1).await.unwrap();
    let cause = outcome.error().unwrap();
    assert_eq!(cause.classification(), "NodeRejected(permanent)");
    assert!(cause.to_string().contains("insufficient lamports"));
    assert_eq!(ledger.send_count(), 1);
}

#[tokio::test]
async fn test_unknown_blockhash_refreshes_token() {
    let (ledger, client) = common::setup();
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 0);
    ledger.push_send_failure(LedgerError::BlockhashNotFound);

    let outcome = client.donate(address, 100).await.unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(ledger.send_count(), 2);
    assert_eq!(ledger.blockhash_requests(), 2);
}

#[tokio::test]
async fn test_timed_out_donation_that_landed_counts_once() {
    let (ledger, client) = common::setup();
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 1_000);
    ledger.push_lost_response(LedgerError::Timeout(30_000));

    let outcome = client.donate(address, 500).await.unwrap();
    assert!(outcome.is_confirmed(), "unexpected outcome: {:?}", outcome);
    assert_eq!(ledger.send_count(), 2);
    assert_eq!(client.campaign(&address).unwrap().amount_raised, 1_500);
}

#[tokio::test]
async fn test_token_expired_during_timeout_is_replaced() {
    let (ledger, client) = common::setup();
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 0);
    ledger.push_stalled_send_failure(LedgerError::Timeout(30_000), BLOCKHASH_VALIDITY + 1);

    let outcome = client.donate(address, 100).await.unwrap();
    assert!(outcome.is_confirmed(), "unexpected outcome: {:?}", outcome);
    assert_eq!(ledger.blockhash_requests(), 2);
    assert_eq!(ledger.send_count(), 2);
    assert_eq!(client.campaign(&address).unwrap().amount_raised, 100);
}

#[tokio::test]
async fn test_dropped_transaction_expires() {
    let (ledger, client) = common::setup();
    let address = Pubkey([7u8; 32]);
    ledger.seed_campaign(address, client.requester(), "n", "d", 0);
    ledger.set_drop_transactions(true);
    ledger.set_height_step(50);

    let outcome = client.donate(address, 100).await.unwrap();
    match outcome {
        SubmissionOutcome::Expired { expiry_height, .. } => {
            assert!(matches!(outcome.error(), Some(CampaignError::Expired { .. })));
            assert!(expiry_height > 0);
        }
        other => panic!("expected expiry, got {:?}", other),
    }
    // Expiry is terminal; nothing is resubmitted automatically.
    assert_eq!(ledger.send_count(), 1);
}

#[tokio::test]
async fn test_corrupted_account_is_skipped() {
    let (ledger, client) = common::setup();
    for n in 1..=5u8 {
        ledger.seed_campaign(Pubkey([n; 32]), client.requester(), &format!("campaign {}", n), "d", 0);
    }
    let corrupted = Pubkey([6u8; 32]);
    ledger.set_account(
        corrupted,
        AccountSnapshot {
            lamports: 1_000_000,
            owner: PROGRAM,
            data: vec![1, 2, 3, 4, 5, 6, 7, 8, 9],
            executable: false,
        },
    );

    let campaigns = client.list_campaigns().await.unwrap();
    assert_eq!(campaigns.len(), 5);
    let addresses: Vec<Pubkey> = campaigns.iter().map(|c| c.address).collect();
    let mut sorted = addresses.clone();
    sorted.sort();
    assert_eq!(addresses, sorted);

    let errors = client.repository().last_decode_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].address, corrupted);
    assert_eq!(
        CampaignError::from(errors[0].clone()).classification(),
        "DecodeError"
    );
}

#[tokio::test]
async fn test_withdraw_by_non_admin_is_missing_authority() {
    let (ledger, admin) = common::setup();
    let stranger = common::client_for(&ledger, 4);
    let address = admin.campaign_address().unwrap();
    ledger.seed_campaign(address, admin.requester(), "n", "d", 5_000);

    let outcome = stranger.withdraw(address, 1_000).await.unwrap();
    assert_eq!(outcome.error().map(|e| e.classification()), Some("MissingAuthority"));
    assert_eq!(ledger.send_count(), 0);
}

#[tokio::test]
async fn test_unknown_campaign_not_in_cache() {
    let (_ledger, client) = common::setup();
    client.list_campaigns().await.unwrap();
    let missing = Pubkey([9u8; 32]);
    assert_eq!(client.campaign(&missing), Err(CampaignError::NotFound(missing)));
}
