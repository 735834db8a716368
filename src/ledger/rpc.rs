//! Transport abstraction over the ledger node's RPC surface.
//!
//! [`RpcTransport`] decouples the [`Gateway`](crate::ledger::gateway::Gateway)
//! from how requests reach the node:
//!
//! - [`JsonRpcClient`](crate::ledger::client::JsonRpcClient): JSON-RPC over HTTP.
//! - `InMemoryLedger` (feature `test-ledger`): no network, for tests.
//!
//! ## Contract
//!
//! - Implementations MUST NOT retry submissions internally; the submitter
//!   owns the retry budget.
//! - Implementations MUST map timeouts to `LedgerError::Timeout` and node
//!   error objects to `LedgerError::Node` (or a more specific variant).

use async_trait::async_trait;

use crate::ledger::transaction::Transaction;
use crate::ledger::types::{AccountSnapshot, FreshnessToken, LedgerResult, Pubkey, Signature, SignatureStatus};

#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// `getAccountInfo`; `None` when no account exists at `address`.
    async fn get_account_info(&self, address: &Pubkey) -> LedgerResult<Option<AccountSnapshot>>;

    /// `getProgramAccounts`; order is whatever the node returns.
    async fn get_program_accounts(&self, program_id: &Pubkey) -> LedgerResult<Vec<(Pubkey, AccountSnapshot)>>;

    /// `getMinimumBalanceForRentExemption`.
    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LedgerResult<u64>;

    /// `getLatestBlockhash`.
    async fn get_latest_blockhash(&self) -> LedgerResult<FreshnessToken>;

    /// `getBlockHeight`.
    async fn get_block_height(&self) -> LedgerResult<u64>;

    /// `sendTransaction`; returns the transaction signature once accepted.
    async fn send_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature>;

    /// `getSignatureStatuses` for a single signature.
    async fn get_signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>>;
}
