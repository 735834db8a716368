//! Campaign account layout.
//!
//! ```text
//! [0..8)    discriminator = sha256("account:Campaign")[..8]
//! [8..40)   admin pubkey
//!           name            (u32 LE length + utf-8 bytes)
//!           description     (u32 LE length + utf-8 bytes)
//!           amount_donated  (u64 LE)
//!           zero padding up to CAMPAIGN_ACCOUNT_SPACE
//! ```

use borsh::{BorshDeserialize, BorshSerialize};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ledger::types::{AccountSnapshot, Pubkey};

/// Longest campaign name the program accepts, in bytes.
pub const MAX_NAME_LEN: usize = 50;

/// Longest campaign description the program accepts, in bytes.
pub const MAX_DESCRIPTION_LEN: usize = 100;

/// Bytes allocated for a campaign account.
pub const CAMPAIGN_ACCOUNT_SPACE: usize = 8 + // discriminator
    32 +                                        // admin
    4 + MAX_NAME_LEN * 4 +                      // name
    4 + MAX_DESCRIPTION_LEN * 4 +               // description
    8; // amount_donated

/// Account discriminator: first 8 bytes of `sha256("account:<Name>")`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("account:{}", name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Errors decoding account data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("account data is {0} bytes, shorter than a discriminator")]
    TooShort(usize),

    #[error("discriminator does not match a campaign account")]
    WrongDiscriminator,

    #[error("account is owned by {actual}, expected {expected}")]
    WrongOwner { expected: Pubkey, actual: Pubkey },

    #[error("malformed campaign data: {0}")]
    Malformed(String),
}

/// On-chain campaign record as the program stores it.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CampaignAccount {
    pub admin: Pubkey,
    pub name: String,
    pub description: String,
    pub amount_donated: u64,
}

impl CampaignAccount {
    pub fn discriminator() -> [u8; 8] {
        account_discriminator("Campaign")
    }

    /// Decode account data. Trailing bytes after the record are padding.
    pub fn decode(data: &[u8]) -> Result<Self, StateError> {
        if data.len() < 8 {
            return Err(StateError::TooShort(data.len()));
        }
        if data[..8] != Self::discriminator() {
            return Err(StateError::WrongDiscriminator);
        }
        let mut body = &data[8..];
        CampaignAccount::deserialize(&mut body).map_err(|e| StateError::Malformed(e.to_string()))
    }

    /// Encode into a zero-padded buffer of at least `CAMPAIGN_ACCOUNT_SPACE` bytes.
    pub fn to_account_data(&self) -> Vec<u8> {
        let mut data = Self::discriminator().to_vec();
        // Writing into a Vec cannot fail.
        let _ = self.serialize(&mut data);
        if data.len() < CAMPAIGN_ACCOUNT_SPACE {
            data.resize(CAMPAIGN_ACCOUNT_SPACE, 0);
        }
        data
    }
}

/// Campaign as presented to callers: decoded record plus account facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    pub address: Pubkey,
    pub admin: Pubkey,
    pub name: String,
    pub description: String,
    /// Net lamports raised (donations minus withdrawals).
    pub amount_raised: u64,
    /// Account balance when last observed.
    pub balance: u64,
    /// Allocated account size; determines the reserve floor.
    pub data_len: usize,
}

impl Campaign {
    /// Decode a program-owned account snapshot.
    pub fn from_account(address: Pubkey, program_id: &Pubkey, account: &AccountSnapshot) -> Result<Self, StateError> {
        if account.owner != *program_id {
            return Err(StateError::WrongOwner {
                expected: *program_id,
                actual: account.owner,
            });
        }
        let record = CampaignAccount::decode(&account.data)?;
        Ok(Self {
            address,
            admin: record.admin,
            name: record.name,
            description: record.description,
            amount_raised: record.amount_donated,
            balance: account.lamports,
            data_len: account.data.len(),
        })
    }

    /// Largest amount withdrawable without dropping below `reserve_floor`.
    pub fn withdrawable(&self, reserve_floor: u64) -> u64 {
        self.balance.saturating_sub(reserve_floor)
    }
}
