//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Default on-chain address of the crowdfunding program.
pub const DEFAULT_PROGRAM_ID: &str = "EjRgeVUydj4PDJtqeELAnmnX5bbyTi7y7StUGfPhUg5P";

/// Default seed tag used to derive a wallet's campaign address.
pub const DEFAULT_SEED_TAG: &str = "CAMPAIGN_DEMO";

/// Root configuration for the crowdfunding client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Ledger node connection settings.
    pub ledger: LedgerConfig,

    /// Program addressing.
    pub program: ProgramConfig,

    /// Submission lifecycle tuning.
    pub submitter: SubmitterConfig,

    /// Signing agent location.
    pub wallet: WalletConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Commitment level the node must reach before a result counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    /// Wire name used in JSON-RPC parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Ledger node connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Commitment used for reads and confirmation.
    pub commitment: Commitment,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
            commitment: Commitment::Confirmed,
        }
    }
}

/// Program addressing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Base58 program id.
    pub program_id: String,

    /// Seed tag combined with the wallet key to derive the campaign address.
    pub seed_tag: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            seed_tag: DEFAULT_SEED_TAG.to_string(),
        }
    }
}

/// Submission lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmitterConfig {
    /// Total submission attempts for Create.
    pub create_max_attempts: u32,

    /// Total submission attempts for Donate and Withdraw.
    pub transfer_max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Interval between confirmation polls in milliseconds.
    pub confirm_poll_interval_ms: u64,

    /// Consecutive failed polls before the confirmation wait is abandoned.
    pub max_poll_failures: u32,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            create_max_attempts: 5,
            transfer_max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 4000,
            confirm_poll_interval_ms: 500,
            max_poll_failures: 10,
        }
    }
}

/// Signing agent configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Path to a keypair file (JSON array of 64 bytes).
    /// Falls back to the `CROWDFUND_WALLET_KEYPAIR` environment variable.
    pub keypair_path: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.ledger.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.program.seed_tag, DEFAULT_SEED_TAG);
        assert_eq!(config.submitter.create_max_attempts, 5);
        assert_eq!(config.submitter.transfer_max_attempts, 3);
    }

    #[test]
    fn test_partial_sections() {
        let raw = r#"
            [ledger]
            rpc_url = "https://api.devnet.solana.com"
            commitment = "finalized"

            [observability]
            log_format = "json"
        "#;
        let config: ClientConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.ledger.commitment, Commitment::Finalized);
        assert_eq!(config.ledger.rpc_timeout_secs, 10);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_commitment_ordering() {
        assert!(Commitment::Processed < Commitment::Confirmed);
        assert!(Commitment::Confirmed < Commitment::Finalized);
    }
}
