//! Signing agent boundary and a local keypair implementation.
//!
//! # Security
//! - The core only ever sees a `SigningAgent`: a public key plus a
//!   "sign this message" call. Key material stays behind the trait.
//! - The local keypair agent loads keys from a file or an environment
//!   variable and never logs or serializes them.

use std::path::Path;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};

use crate::ledger::types::{LedgerError, LedgerResult, Pubkey, Signature};

/// Environment variable holding a keypair (JSON byte array or base58).
pub const KEYPAIR_ENV_VAR: &str = "CROWDFUND_WALLET_KEYPAIR";

/// External agent that authorizes transactions on the user's behalf.
#[async_trait]
pub trait SigningAgent: Send + Sync {
    /// Public key the agent signs for.
    fn pubkey(&self) -> Pubkey;

    /// Sign a serialized transaction message.
    async fn sign_message(&self, message: &[u8]) -> LedgerResult<Signature>;
}

/// ed25519 keypair held in process memory.
pub struct LocalKeypair {
    signer: SigningKey,
}

impl LocalKeypair {
    /// Build from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signer: SigningKey::from_bytes(&seed),
        }
    }

    /// Build from 64 keypair bytes (secret || public), as written by keygen tools.
    pub fn from_keypair_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let array: &[u8; 64] = bytes.try_into().map_err(|_| {
            LedgerError::Signing(format!("keypair must be 64 bytes, got {}", bytes.len()))
        })?;
        let signer = SigningKey::from_keypair_bytes(array)
            .map_err(|e| LedgerError::Signing(format!("Invalid keypair: {}", e)))?;
        Ok(Self { signer })
    }

    /// Parse either a JSON byte array or a base58 string.
    pub fn from_encoded(encoded: &str) -> LedgerResult<Self> {
        let trimmed = encoded.trim();
        let bytes: Vec<u8> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed)
                .map_err(|e| LedgerError::Signing(format!("Invalid keypair JSON: {}", e)))?
        } else {
            bs58::decode(trimmed)
                .into_vec()
                .map_err(|e| LedgerError::Signing(format!("Invalid keypair base58: {}", e)))?
        };
        let keypair = Self::from_keypair_bytes(&bytes)?;

        tracing::info!(pubkey = %keypair.pubkey(), "Wallet initialized");
        Ok(keypair)
    }

    /// Load from a keypair file.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Signing(format!("Cannot read keypair file {}: {}", path.display(), e))
        })?;
        Self::from_encoded(&content)
    }

    /// Load from `CROWDFUND_WALLET_KEYPAIR`.
    pub fn from_env() -> LedgerResult<Self> {
        let encoded = std::env::var(KEYPAIR_ENV_VAR).map_err(|_| {
            LedgerError::Signing(format!("Environment variable {} not set", KEYPAIR_ENV_VAR))
        })?;
        Self::from_encoded(&encoded)
    }
}

#[async_trait]
impl SigningAgent for LocalKeypair {
    fn pubkey(&self) -> Pubkey {
        Pubkey(self.signer.verifying_key().to_bytes())
    }

    async fn sign_message(&self, message: &[u8]) -> LedgerResult<Signature> {
        Ok(Signature(self.signer.sign(message).to_bytes()))
    }
}

impl std::fmt::Debug for LocalKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeypair")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Verifier, VerifyingKey};

    fn keypair_bytes(seed: [u8; 32]) -> Vec<u8> {
        SigningKey::from_bytes(&seed).to_keypair_bytes().to_vec()
    }

    #[test]
    fn test_from_json_array() {
        let json = serde_json::to_string(&keypair_bytes([5u8; 32])).unwrap();
        let wallet = LocalKeypair::from_encoded(&json).unwrap();
        assert_eq!(wallet.pubkey(), LocalKeypair::from_seed([5u8; 32]).pubkey());
    }

    #[test]
    fn test_from_base58() {
        let encoded = bs58::encode(keypair_bytes([6u8; 32])).into_string();
        let wallet = LocalKeypair::from_encoded(&encoded).unwrap();
        assert_eq!(wallet.pubkey(), LocalKeypair::from_seed([6u8; 32]).pubkey());
    }

    #[test]
    fn test_invalid_length() {
        let result = LocalKeypair::from_encoded("[1,2,3]");
        assert!(result.unwrap_err().to_string().contains("64 bytes"));
    }

    #[test]
    fn test_mismatched_public_half_rejected() {
        let mut bytes = keypair_bytes([7u8; 32]);
        bytes[40] ^= 0xff;
        assert!(LocalKeypair::from_keypair_bytes(&bytes).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let wallet = LocalKeypair::from_seed([8u8; 32]);
        let debug = format!("{:?}", wallet);
        assert!(debug.contains("pubkey"));
        assert!(!debug.contains("signer"));
    }

    #[tokio::test]
    async fn test_signature_verifies() {
        let wallet = LocalKeypair::from_seed([9u8; 32]);
        let message = b"transfer 10 lamports";
        let signature = wallet.sign_message(message).await.unwrap();

        let verifying = VerifyingKey::from_bytes(&wallet.pubkey().0).unwrap();
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        assert!(verifying.verify(message, &sig).is_ok());
    }
}
