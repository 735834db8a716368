//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Address derivation (address.rs):
//!     seed tag + owner key → program-derived campaign address
//!
//! Submission (gateway.rs):
//!     Instruction → compile + sign (transaction.rs, wallet.rs) → send → poll status
//!
//! Transport (rpc.rs):
//!     JSON-RPC over HTTP (client.rs), or the in-process ledger (memory.rs)
//!     compiled for tests and under the `test-ledger` feature
//! ```
//!
//! # Design Decisions
//! - The signing agent is passed in explicitly; no ambient wallet
//! - Transports never retry submissions; retry budget lives in the submitter
//! - Lifecycle timeouts are block heights, wall-clock timeouts exist per request only

pub mod address;
pub mod client;
pub mod gateway;
#[cfg(any(test, feature = "test-ledger"))]
pub mod memory;
pub mod rpc;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use address::{AddressDeriver, DeriveError, MAX_SEED_LEN};
pub use client::JsonRpcClient;
pub use gateway::Gateway;
#[cfg(any(test, feature = "test-ledger"))]
pub use memory::InMemoryLedger;
pub use rpc::RpcTransport;
pub use transaction::{AccountMeta, Instruction, Message, Transaction};
pub use types::{
    AccountSnapshot, ConfirmationStatus, FreshnessToken, Hash, LedgerError, LedgerResult, Pubkey, Signature,
    SignatureStatus, SYSTEM_PROGRAM_ID,
};
pub use wallet::{LocalKeypair, SigningAgent};
