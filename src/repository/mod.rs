//! Campaign repository: read side of the session.
//!
//! # Data Flow
//! ```text
//! refresh():
//!     Gateway.fetch_program_accounts → decode each (program::state)
//!         → ok: into the new map
//!         → err: recorded DecodeError, skipped
//!     → SessionCache.replace(campaigns + decode errors, one swap) → sorted snapshot
//!
//! get(): cache only, no I/O
//! ```

pub mod cache;

use std::collections::HashMap;

use futures_util::StreamExt;

use crate::error::{CampaignError, CampaignResult};
use crate::ledger::gateway::Gateway;
use crate::ledger::types::Pubkey;
use crate::observability::metrics;
use crate::program::state::Campaign;

pub use cache::{DecodeError, RefreshSnapshot, SessionCache};

impl From<DecodeError> for CampaignError {
    fn from(e: DecodeError) -> Self {
        CampaignError::Decode {
            address: e.address,
            reason: e.reason,
        }
    }
}

/// Read-side cache of campaign accounts for one program.
#[derive(Clone)]
pub struct CampaignRepository {
    gateway: Gateway,
    program_id: Pubkey,
    cache: SessionCache,
}

impl CampaignRepository {
    pub fn new(gateway: Gateway, program_id: Pubkey) -> Self {
        Self {
            gateway,
            program_id,
            cache: SessionCache::new(),
        }
    }

    /// Refetch every program account and rebuild the cache.
    ///
    /// Accounts that fail to decode are skipped and recorded; only a
    /// failure to reach the node aborts the refresh, leaving the previous
    /// cache in place.
    pub async fn refresh(&self) -> CampaignResult<Vec<Campaign>> {
        let mut accounts = self.gateway.fetch_program_accounts(&self.program_id).await?;

        let mut campaigns = HashMap::new();
        let mut errors = Vec::new();
        while let Some((address, account)) = accounts.next().await {
            match Campaign::from_account(address, &self.program_id, &account) {
                Ok(campaign) => {
                    campaigns.insert(address, campaign);
                }
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "Skipping undecodable program account");
                    errors.push(DecodeError {
                        address,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !errors.is_empty() {
            metrics::record_decode_errors(errors.len());
        }
        tracing::info!(campaigns = campaigns.len(), decode_errors = errors.len(), "Campaign cache refreshed");

        let stored = self.cache.replace(RefreshSnapshot {
            campaigns,
            decode_errors: errors,
        });
        Ok(stored.sorted())
    }

    /// Cached campaign at `address`; no I/O.
    pub fn get(&self, address: &Pubkey) -> CampaignResult<Campaign> {
        self.cache.get(address).ok_or(CampaignError::NotFound(*address))
    }

    /// Current cache contents, sorted by address.
    pub fn snapshot(&self) -> Vec<Campaign> {
        self.cache.snapshot()
    }

    /// Decode failures recorded by the last refresh.
    pub fn last_decode_errors(&self) -> Vec<DecodeError> {
        self.cache.decode_errors()
    }

    pub fn len(&self) -> usize {
        self.cache.count()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }
}

impl std::fmt::Debug for CampaignRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignRepository")
            .field("program_id", &self.program_id)
            .field("cache", &self.cache)
            .finish()
    }
}
