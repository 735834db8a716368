//! Retry budget per operation kind.
//!
//! # Design Decisions
//! - The budget counts total submission attempts, not retries after the first
//! - Create gets a larger budget: it is checked for existence beforehand, so
//!   a duplicate submission cannot allocate twice
//! - Only transient node failures consume the budget; permanent ones end the
//!   submission immediately

use std::time::Duration;

use crate::config::SubmitterConfig;
use crate::program::intent::OperationKind;
use crate::submitter::backoff;

/// Retry policy derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub create_max_attempts: u32,
    pub transfer_max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Total attempts allowed for `kind`.
    pub fn max_attempts(&self, kind: OperationKind) -> u32 {
        match kind {
            OperationKind::Create => self.create_max_attempts,
            OperationKind::Donate | OperationKind::Withdraw => self.transfer_max_attempts,
        }
    }

    /// Wait before the next attempt, given `failed_attempts` so far.
    pub fn delay(&self, failed_attempts: u32, last_round_trip: Duration) -> Duration {
        backoff::resubmit_delay(failed_attempts, self.base_delay_ms, self.max_delay_ms, last_round_trip)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&SubmitterConfig::default())
    }
}

impl From<&SubmitterConfig> for RetryPolicy {
    fn from(config: &SubmitterConfig) -> Self {
        Self {
            create_max_attempts: config.create_max_attempts,
            transfer_max_attempts: config.transfer_max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}
