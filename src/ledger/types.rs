//! Ledger-specific types and error definitions.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// Re-export LedgerConfig from config module to avoid duplication
pub use crate::config::schema::{Commitment, LedgerConfig};

/// Implements base58 `Display`/`FromStr`/serde for a fixed-size byte newtype.
macro_rules! impl_base58 {
    ($ty:ident, $len:expr) => {
        impl $ty {
            /// Length of the raw representation in bytes.
            pub const LEN: usize = $len;

            /// Raw bytes.
            pub fn to_bytes(&self) -> [u8; $len] {
                self.0
            }

            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self)
            }
        }

        impl FromStr for $ty {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = bs58::decode(s).into_vec().map_err(|e| {
                    LedgerError::InvalidResponse(format!("invalid base58 '{}': {}", s, e))
                })?;
                let array: [u8; $len] = bytes.try_into().map_err(|v: Vec<u8>| {
                    LedgerError::InvalidResponse(format!(
                        "expected {} bytes for {}, got {}",
                        $len,
                        stringify!($ty),
                        v.len()
                    ))
                })?;
                Ok(Self(array))
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// 32-byte account address / public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BorshSerialize, BorshDeserialize)]
pub struct Pubkey(pub [u8; 32]);

impl_base58!(Pubkey, 32);

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The system program, owner of plain wallet accounts and allocator of new ones.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey([0u8; 32]);

/// 64-byte ed25519 transaction signature. Doubles as the submission id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl_base58!(Signature, 64);

/// 32-byte ledger hash (used for recent blockhashes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl_base58!(Hash, 32);

/// Point-in-time view of an on-chain account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Balance in lamports.
    pub lamports: u64,
    /// Program that owns the account.
    pub owner: Pubkey,
    /// Raw account data.
    pub data: Vec<u8>,
    /// Whether the account holds a program.
    pub executable: bool,
}

/// Recent blockhash plus the last block height at which it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessToken {
    pub blockhash: Hash,
    pub expiry_height: u64,
}

/// Node-reported status of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    /// Slot the transaction was processed in.
    pub slot: u64,
    /// Highest commitment level reached, if reported.
    pub confirmation_status: Option<Commitment>,
    /// On-chain execution error, if the transaction failed.
    pub err: Option<String>,
}

impl SignatureStatus {
    /// Whether this status has reached (at least) the requested commitment.
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        match self.confirmation_status {
            Some(reached) => reached >= commitment,
            None => false,
        }
    }
}

/// Terminal result of a confirmation wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Included at the requested commitment.
    Confirmed { slot: u64 },
    /// Block height passed the expiry without inclusion.
    Expired { expiry_height: u64 },
    /// Included, but execution failed on-chain.
    Failed(String),
}

/// Errors that can occur while talking to the ledger node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Connection-level failure (DNS, refused, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Node asked us to slow down (HTTP 429).
    #[error("rate limited by node")]
    RateLimited,

    /// Non-success HTTP status other than 429.
    #[error("HTTP status {0}")]
    Http(u16),

    /// JSON-RPC error object returned by the node.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    /// The freshness token is unknown to the node (expired or too new).
    #[error("blockhash not found")]
    BlockhashNotFound,

    /// Response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Transaction could not be assembled.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Signing agent refused or failed to sign.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Every configured endpoint failed at the transport level.
    #[error("all RPC endpoints failed: {0}")]
    AllEndpointsFailed(String),

    /// The node has already processed this exact transaction.
    #[error("transaction already processed")]
    AlreadyProcessed,
}

/// JSON-RPC codes that signal a node-side condition worth retrying.
const NODE_UNHEALTHY: i64 = -32005;
const BLOCK_NOT_AVAILABLE: i64 = -32004;
const MIN_CONTEXT_SLOT_NOT_REACHED: i64 = -32016;

impl LedgerError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Transport(_)
            | LedgerError::Timeout(_)
            | LedgerError::RateLimited
            | LedgerError::BlockhashNotFound
            | LedgerError::AllEndpointsFailed(_) => true,
            LedgerError::Http(status) => *status >= 500,
            LedgerError::Node { code, .. } => matches!(
                *code,
                NODE_UNHEALTHY | BLOCK_NOT_AVAILABLE | MIN_CONTEXT_SLOT_NOT_REACHED
            ),
            LedgerError::InvalidResponse(_)
            | LedgerError::InvalidTransaction(_)
            | LedgerError::Signing(_)
            | LedgerError::AlreadyProcessed => false,
        }
    }

    /// Whether the error means the freshness token must be replaced.
    pub fn requires_fresh_token(&self) -> bool {
        matches!(self, LedgerError::BlockhashNotFound)
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
