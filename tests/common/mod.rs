//! Shared utilities for integration testing.

use std::sync::Arc;

use crowdfund_client::config::ClientConfig;
use crowdfund_client::ledger::{InMemoryLedger, LocalKeypair, Pubkey, SigningAgent};
use crowdfund_client::{AbandonSignal, CampaignClient};

pub const PROGRAM: Pubkey = Pubkey([42u8; 32]);

/// Lamports given to every test wallet.
pub const WALLET_FUNDS: u64 = 10_000_000_000;

/// Client configuration with delays short enough for tests.
pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.program.program_id = PROGRAM.to_string();
    config.submitter.base_delay_ms = 1;
    config.submitter.max_delay_ms = 5;
    config.submitter.confirm_poll_interval_ms = 5;
    config
}

/// A funded wallet talking to a fresh in-memory ledger.
pub fn setup() -> (Arc<InMemoryLedger>, CampaignClient) {
    let ledger = Arc::new(InMemoryLedger::new(PROGRAM));
    let client = client_for(&ledger, 1);
    (ledger, client)
}

/// Another funded wallet on the same ledger, distinguished by `seed`.
pub fn client_for(ledger: &Arc<InMemoryLedger>, seed: u8) -> CampaignClient {
    let signer = Arc::new(LocalKeypair::from_seed([seed; 32]));
    ledger.airdrop(signer.pubkey(), WALLET_FUNDS);
    CampaignClient::from_config(&fast_config(), ledger.clone(), signer, AbandonSignal::new()).unwrap()
}
