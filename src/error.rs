//! Error taxonomy surfaced at the view boundary.

use serde::Serialize;
use thiserror::Error;

use crate::ledger::address::DeriveError;
use crate::ledger::types::{LedgerError, Pubkey};
use crate::program::instruction::BuildError;

/// Whether a node rejection may succeed on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionKind {
    Transient,
    Permanent,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionKind::Transient => f.write_str("transient"),
            RejectionKind::Permanent => f.write_str("permanent"),
        }
    }
}

/// Every failure an operation can end in.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CampaignError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("missing authority: {0}")]
    MissingAuthority(String),

    #[error("already in flight: campaign {0} has an unfinished submission")]
    AlreadyInFlight(Pubkey),

    #[error("node rejected ({kind}): {reason}")]
    NodeRejected { kind: RejectionKind, reason: String },

    #[error("expired: not included by block height {expiry_height}")]
    Expired { expiry_height: u64 },

    #[error("decode error: account {address}: {reason}")]
    Decode { address: Pubkey, reason: String },

    #[error("insufficient reserve: requested {requested}, withdrawable {available} above reserve floor {reserve_floor}")]
    InsufficientReserve {
        requested: u64,
        available: u64,
        reserve_floor: u64,
    },

    #[error("not found: no campaign at {0}")]
    NotFound(Pubkey),

    #[error("name too long: {len} bytes, maximum is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("description too long: {len} bytes, maximum is {max}")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("campaign exists: {0} is already allocated")]
    CampaignExists(Pubkey),

    #[error("invalid amount: must be greater than zero")]
    InvalidAmount,

    #[error("exceeds raised: requested {requested}, campaign has raised {raised}")]
    ExceedsRaised { requested: u64, raised: u64 },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CampaignError {
    /// Classify a failed send.
    pub fn rejected(error: &LedgerError) -> Self {
        let kind = if error.is_transient() {
            RejectionKind::Transient
        } else {
            RejectionKind::Permanent
        };
        CampaignError::NodeRejected {
            kind,
            reason: error.to_string(),
        }
    }

    /// Short label naming the failure class.
    pub fn classification(&self) -> &'static str {
        match self {
            CampaignError::InvalidSeed(_) => "InvalidSeed",
            CampaignError::MissingAuthority(_) => "MissingAuthority",
            CampaignError::AlreadyInFlight(_) => "AlreadyInFlight",
            CampaignError::NodeRejected {
                kind: RejectionKind::Transient,
                ..
            } => "NodeRejected(transient)",
            CampaignError::NodeRejected {
                kind: RejectionKind::Permanent,
                ..
            } => "NodeRejected(permanent)",
            CampaignError::Expired { .. } => "Expired",
            CampaignError::Decode { .. } => "DecodeError",
            CampaignError::InsufficientReserve { .. } => "InsufficientReserve",
            CampaignError::NotFound(_) => "NotFound",
            CampaignError::NameTooLong { .. } => "NameTooLong",
            CampaignError::DescriptionTooLong { .. } => "DescriptionTooLong",
            CampaignError::CampaignExists(_) => "CampaignExists",
            CampaignError::InvalidAmount => "InvalidAmount",
            CampaignError::ExceedsRaised { .. } => "ExceedsRaised",
            CampaignError::Ledger(_) => "LedgerError",
            CampaignError::InvalidInstruction(_) => "InvalidInstruction",
            CampaignError::Configuration(_) => "ConfigurationError",
        }
    }

    /// Failures detected before anything is sent to the node.
    pub fn is_local_precondition(&self) -> bool {
        matches!(
            self,
            CampaignError::InvalidSeed(_)
                | CampaignError::MissingAuthority(_)
                | CampaignError::AlreadyInFlight(_)
                | CampaignError::InsufficientReserve { .. }
                | CampaignError::NotFound(_)
                | CampaignError::NameTooLong { .. }
                | CampaignError::DescriptionTooLong { .. }
                | CampaignError::CampaignExists(_)
                | CampaignError::InvalidAmount
                | CampaignError::ExceedsRaised { .. }
                | CampaignError::InvalidInstruction(_)
        )
    }
}

impl From<DeriveError> for CampaignError {
    fn from(e: DeriveError) -> Self {
        CampaignError::InvalidSeed(e.to_string())
    }
}

impl From<BuildError> for CampaignError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::MissingAuthority { .. } => CampaignError::MissingAuthority(e.to_string()),
            other => CampaignError::InvalidInstruction(other.to_string()),
        }
    }
}

/// Result type for core operations.
pub type CampaignResult<T> = Result<T, CampaignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        let transient = CampaignError::rejected(&LedgerError::RateLimited);
        assert_eq!(transient.classification(), "NodeRejected(transient)");
        assert_eq!(transient.to_string(), "node rejected (transient): rate limited by node");

        let permanent = CampaignError::rejected(&LedgerError::Node {
            code: -32002,
            message: "insufficient funds".into(),
        });
        assert_eq!(permanent.classification(), "NodeRejected(permanent)");
        assert!(!permanent.is_local_precondition());
    }

    #[test]
    fn test_build_error_mapping() {
        let err: CampaignError = BuildError::MissingAuthority {
            requester: Pubkey([1u8; 32]),
            admin: Some(Pubkey([2u8; 32])),
        }
        .into();
        assert_eq!(err.classification(), "MissingAuthority");
        assert!(err.is_local_precondition());

        let err: CampaignError = BuildError::Encoding("x".into()).into();
        assert_eq!(err.classification(), "InvalidInstruction");
    }

    #[test]
    fn test_derive_error_mapping() {
        let err: CampaignError = DeriveError::InvalidSeed { len: 40, max: 32 }.into();
        assert_eq!(err.classification(), "InvalidSeed");
        assert!(err.to_string().contains("40"));
    }

    #[test]
    fn test_display_carries_cause() {
        let err = CampaignError::InsufficientReserve {
            requested: 950,
            available: 900,
            reserve_floor: 100,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("insufficient reserve"));
        assert!(msg.contains("950"));
    }
}
