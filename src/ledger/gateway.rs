//! Connection gateway: the single channel between the core and the ledger node.
//!
//! # Responsibilities
//! - Read queries: account fetch, program account listing, reserve minimum
//! - Freshness tokens and block height
//! - Compile, sign (through the signing agent) and send transactions
//! - Poll for confirmation until inclusion or expiry height
//!
//! No state is kept across calls beyond the transport and the signer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::time::{interval, MissedTickBehavior};

use crate::ledger::rpc::RpcTransport;
use crate::ledger::transaction::{Instruction, Message, Transaction};
use crate::ledger::types::{
    AccountSnapshot, Commitment, ConfirmationStatus, FreshnessToken, LedgerResult, Pubkey, Signature,
    SignatureStatus,
};
use crate::ledger::wallet::SigningAgent;
use crate::observability::metrics;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_MAX_POLL_FAILURES: u32 = 10;

/// Gateway over an RPC transport and an external signing agent.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn RpcTransport>,
    signer: Arc<dyn SigningAgent>,
    commitment: Commitment,
    poll_interval: Duration,
    max_poll_failures: u32,
}

impl Gateway {
    /// Create a gateway. The signing agent is the fee payer of everything submitted.
    pub fn new(transport: Arc<dyn RpcTransport>, signer: Arc<dyn SigningAgent>, commitment: Commitment) -> Self {
        Self {
            transport,
            signer,
            commitment,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }

    /// Interval between confirmation polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Consecutive failed polls tolerated before `confirm` gives up.
    pub fn with_max_poll_failures(mut self, max_poll_failures: u32) -> Self {
        self.max_poll_failures = max_poll_failures.max(1);
        self
    }

    /// Public key of the signing agent.
    pub fn signer_pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Fetch a single account; `None` when nothing is allocated at `address`.
    pub async fn fetch_account(&self, address: &Pubkey) -> LedgerResult<Option<AccountSnapshot>> {
        self.transport.get_account_info(address).await
    }

    /// All accounts owned by `program_id`.
    ///
    /// The stream is materialized from a single node response and cannot be
    /// restarted; call again for a fresh view. Order is whatever the node
    /// returned.
    pub async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> LedgerResult<BoxStream<'static, (Pubkey, AccountSnapshot)>> {
        let accounts = self.transport.get_program_accounts(program_id).await?;
        tracing::debug!(program_id = %program_id, count = accounts.len(), "Fetched program accounts");
        Ok(stream::iter(accounts).boxed())
    }

    /// Minimum balance an account of `data_len` bytes must keep to stay allocated.
    pub async fn minimum_reserve(&self, data_len: usize) -> LedgerResult<u64> {
        self.transport.get_minimum_balance_for_rent_exemption(data_len).await
    }

    /// Recent blockhash and the last block height at which it is accepted.
    pub async fn latest_freshness_token(&self) -> LedgerResult<FreshnessToken> {
        self.transport.get_latest_blockhash().await
    }

    pub async fn block_height(&self) -> LedgerResult<u64> {
        self.transport.get_block_height().await
    }

    /// Compile `instruction` against `token` with the agent as fee payer and
    /// have the agent sign it.
    ///
    /// Signing is deterministic: the same instruction and token always yield
    /// the same signature.
    pub async fn sign(&self, instruction: &Instruction, token: &FreshnessToken) -> LedgerResult<Transaction> {
        let payer = self.signer.pubkey();
        let message = Message::compile(std::slice::from_ref(instruction), &payer, token.blockhash)?;
        Transaction::sign(message, self.signer.as_ref()).await
    }

    /// Send a signed transaction. Returns its signature.
    pub async fn send(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let signature = self.transport.send_transaction(transaction).await?;
        if transaction.signature() != Some(&signature) {
            tracing::warn!(
                returned = %signature,
                "Node returned a signature different from the signed transaction"
            );
        }
        Ok(signature)
    }

    /// Sign and send in one step.
    ///
    /// Returns the transaction signature, which identifies the submission.
    pub async fn submit(&self, instruction: &Instruction, token: &FreshnessToken) -> LedgerResult<Signature> {
        let transaction = self.sign(instruction, token).await?;
        self.send(&transaction).await
    }

    /// Status of a previously sent signature; `None` when the node has not seen it.
    pub async fn signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>> {
        self.transport.get_signature_status(signature).await
    }

    /// Wait until `signature` is included at the configured commitment or the
    /// block height passes `expiry_height`.
    ///
    /// Individual poll failures are tolerated; only `max_poll_failures`
    /// consecutive failures end the wait with the last error.
    pub async fn confirm(&self, signature: &Signature, expiry_height: u64) -> LedgerResult<ConfirmationStatus> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u32;

        loop {
            ticker.tick().await;

            match self.poll_once(signature, expiry_height).await {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    consecutive_failures = 0;
                    tracing::trace!(signature = %signature, "Transaction pending");
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        signature = %signature,
                        failures = consecutive_failures,
                        error = %e,
                        "Confirmation poll failed"
                    );
                    if consecutive_failures >= self.max_poll_failures {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// One poll round. Height is read before status so that a transaction
    /// landing between the two reads is never reported as expired.
    async fn poll_once(&self, signature: &Signature, expiry_height: u64) -> LedgerResult<Option<ConfirmationStatus>> {
        let height = self.transport.get_block_height().await?;
        let status = self.transport.get_signature_status(signature).await?;

        match status {
            Some(status) => {
                if let Some(err) = status.err {
                    return Ok(Some(ConfirmationStatus::Failed(err)));
                }
                if status.satisfies(self.commitment) {
                    return Ok(Some(ConfirmationStatus::Confirmed { slot: status.slot }));
                }
                // Seen but below the requested commitment; it can no longer expire.
                Ok(None)
            }
            None if height > expiry_height => Ok(Some(ConfirmationStatus::Expired { expiry_height })),
            None => Ok(None),
        }
    }

    /// Whether the node answers at all.
    pub async fn is_healthy(&self) -> bool {
        let healthy = match self.transport.get_block_height().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Ledger health check failed");
                false
            }
        };
        metrics::record_ledger_health(healthy);
        healthy
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("signer", &self.signer.pubkey())
            .field("commitment", &self.commitment)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
