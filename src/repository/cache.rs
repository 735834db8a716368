//! Session cache of campaign snapshots.
//!
//! The cache is only ever replaced as a whole: a refresh builds a new
//! [`RefreshSnapshot`] (campaigns and the decode failures seen alongside
//! them) and swaps one pointer, so readers never observe a half-merged view
//! or campaigns from one refresh paired with errors from another.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::ledger::types::Pubkey;
use crate::observability::metrics;
use crate::program::state::Campaign;

/// A program account that could not be decoded as a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeError {
    pub address: Pubkey,
    pub reason: String,
}

/// Everything one refresh produced.
#[derive(Debug, Clone, Default)]
pub struct RefreshSnapshot {
    pub campaigns: HashMap<Pubkey, Campaign>,
    pub decode_errors: Vec<DecodeError>,
}

impl RefreshSnapshot {
    /// Campaigns sorted by address.
    pub fn sorted(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self.campaigns.values().cloned().collect();
        campaigns.sort_by(|a, b| a.address.cmp(&b.address));
        campaigns
    }
}

/// Thread-safe, wholesale-replaced refresh result.
#[derive(Clone, Default)]
pub struct SessionCache {
    inner: Arc<ArcSwap<RefreshSnapshot>>,
}

impl SessionCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole cache and return the stored snapshot.
    pub fn replace(&self, snapshot: RefreshSnapshot) -> Arc<RefreshSnapshot> {
        let size = snapshot.campaigns.len();
        let snapshot = Arc::new(snapshot);
        self.inner.store(snapshot.clone());
        metrics::record_cache_size(size);
        snapshot
    }

    /// The current snapshot; campaigns and decode errors from the same refresh.
    pub fn load(&self) -> Arc<RefreshSnapshot> {
        self.inner.load_full()
    }

    /// Cached campaign at `address`.
    pub fn get(&self, address: &Pubkey) -> Option<Campaign> {
        self.inner.load().campaigns.get(address).cloned()
    }

    /// All cached campaigns, sorted by address.
    pub fn snapshot(&self) -> Vec<Campaign> {
        self.inner.load().sorted()
    }

    pub fn decode_errors(&self) -> Vec<DecodeError> {
        self.inner.load().decode_errors.clone()
    }

    pub fn count(&self) -> usize {
        self.inner.load().campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.inner.load();
        f.debug_struct("SessionCache")
            .field("campaigns", &current.campaigns.len())
            .field("decode_errors", &current.decode_errors.len())
            .finish()
    }
}
