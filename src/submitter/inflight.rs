//! Per-campaign in-flight registry.
//!
//! At most one submission per campaign address may be between Building and a
//! terminal state. Claiming an address hands back an RAII guard; dropping the
//! guard (on any exit path) frees the address.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::CampaignError;
use crate::ledger::types::Pubkey;
use crate::submitter::SubmissionState;

/// Thread-safe map of campaign address to live submission state.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<DashMap<Pubkey, SubmissionState>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `address`, failing with `AlreadyInFlight` if it is taken.
    pub fn claim(&self, address: Pubkey) -> Result<InFlightGuard, CampaignError> {
        match self.inner.entry(address) {
            Entry::Occupied(entry) => {
                tracing::debug!(campaign = %address, state = ?entry.get(), "Submission already in flight");
                Err(CampaignError::AlreadyInFlight(address))
            }
            Entry::Vacant(entry) => {
                entry.insert(SubmissionState::Building);
                Ok(InFlightGuard {
                    address,
                    registry: self.inner.clone(),
                })
            }
        }
    }

    /// Live state of the submission for `address`, if any.
    pub fn state(&self, address: &Pubkey) -> Option<SubmissionState> {
        self.inner.get(address).map(|r| *r.value())
    }

    /// Number of addresses currently claimed.
    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry").field("in_flight", &self.inner.len()).finish()
    }
}

/// Exclusive claim on a campaign address.
#[derive(Debug)]
pub struct InFlightGuard {
    address: Pubkey,
    registry: Arc<DashMap<Pubkey, SubmissionState>>,
}

impl InFlightGuard {
    pub fn address(&self) -> Pubkey {
        self.address
    }

    /// Publish a state transition.
    pub fn set_state(&self, state: SubmissionState) {
        if let Some(mut entry) = self.registry.get_mut(&self.address) {
            *entry = state;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_rejected() {
        let registry = InFlightRegistry::new();
        let address = Pubkey([1u8; 32]);

        let guard = registry.claim(address).unwrap();
        assert_eq!(registry.state(&address), Some(SubmissionState::Building));

        let err = registry.claim(address).unwrap_err();
        assert_eq!(err, CampaignError::AlreadyInFlight(address));

        // Other campaigns are unaffected.
        assert!(registry.claim(Pubkey([2u8; 32])).is_ok());

        drop(guard);
        assert!(registry.state(&address).is_none());
        assert!(registry.claim(address).is_ok());
    }

    #[test]
    fn test_state_transitions_visible() {
        let registry = InFlightRegistry::new();
        let address = Pubkey([1u8; 32]);
        let guard = registry.claim(address).unwrap();

        guard.set_state(SubmissionState::Confirming);
        assert_eq!(registry.state(&address), Some(SubmissionState::Confirming));
        assert_eq!(registry.count(), 1);
    }
}
