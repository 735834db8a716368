//! Transaction submitter: drives one intent to a terminal outcome.
//!
//! # States
//! ```text
//! Building ──token──▶ Submitted ──accepted──▶ Confirming ──▶ Confirmed
//!    ▲                   │                        ├────────▶ Expired
//!    └──stale token──────┤ transient, budget left └────────▶ Rejected (failed on-chain)
//!                        ├─ transient, same token valid ──▶ Submitted
//!                        └─ permanent / budget spent ───▶ Rejected
//! ```
//!
//! # Design Decisions
//! - Builder failures are local and never retried
//! - A resubmission reuses the freshness token while the block height is
//!   within its expiry; an unknown blockhash always forces a new token
//! - A transiently failed send may have landed; an "already processed" reply
//!   to its identical resend, or a status found for it before the token is
//!   replaced, counts as accepted so the operation is never applied twice
//! - Expired is terminal; resubmitting is the caller's decision
//! - Abandoning the confirmation wait yields `Abandoned`: the transaction
//!   may still land and the repository refresh reconciles it

pub mod backoff;
pub mod inflight;
pub mod retries;

use std::time::{Duration, Instant};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{CampaignError, RejectionKind};
use crate::ledger::gateway::Gateway;
use crate::ledger::transaction::Instruction;
use crate::ledger::types::{ConfirmationStatus, FreshnessToken, LedgerError, Pubkey, Signature};
use crate::lifecycle::AbandonSignal;
use crate::observability::metrics;
use crate::program::instruction::{self, DerivedAccounts};
use crate::program::intent::{OperationIntent, OperationKind};

pub use inflight::{InFlightGuard, InFlightRegistry};
pub use retries::RetryPolicy;

/// Lifecycle state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    Building,
    Submitted,
    Confirming,
    Confirmed,
    Expired,
    Rejected,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Confirmed | SubmissionState::Expired | SubmissionState::Rejected
        )
    }
}

/// One intent in flight. Owned by the submitter for the duration of `execute`.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Correlation id for logs.
    pub id: Uuid,
    pub kind: OperationKind,
    pub campaign: Pubkey,
    pub freshness_token: Option<FreshnessToken>,
    pub expiry_height: u64,
    /// Attempts still allowed, counting the next one.
    pub retries_remaining: u32,
    pub state: SubmissionState,
    pub signature: Option<Signature>,
    /// Sends performed so far.
    pub attempts: u32,
}

impl Submission {
    fn new(kind: OperationKind, campaign: Pubkey, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            campaign,
            freshness_token: None,
            expiry_height: 0,
            retries_remaining: max_attempts,
            state: SubmissionState::Building,
            signature: None,
            attempts: 0,
        }
    }

    fn set_token(&mut self, token: FreshnessToken) {
        self.freshness_token = Some(token);
        self.expiry_height = token.expiry_height;
    }

    fn transition(&mut self, guard: &InFlightGuard, next: SubmissionState) {
        tracing::debug!(from = ?self.state, to = ?next, "Submission state change");
        self.state = next;
        guard.set_state(next);
    }

    /// Spend one attempt; true while attempts remain.
    fn consume_retry(&mut self) -> bool {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
        self.retries_remaining > 0
    }
}

/// Terminal result of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SubmissionOutcome {
    /// Included at the configured commitment.
    Confirmed { signature: Signature, slot: u64 },
    /// Not included before the expiry height.
    Expired { signature: Signature, expiry_height: u64 },
    /// Failed locally, rejected by the node, or failed on-chain.
    Rejected {
        #[serde(serialize_with = "serialize_cause")]
        cause: CampaignError,
        attempts: u32,
    },
    /// The wait ended before a verdict; the transaction may still land.
    /// `reason` is set when contact with the node was lost.
    Abandoned {
        signature: Signature,
        reason: Option<String>,
    },
}

fn serialize_cause<S: Serializer>(cause: &CampaignError, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Cause", 2)?;
    state.serialize_field("classification", cause.classification())?;
    state.serialize_field("reason", &cause.to_string())?;
    state.end()
}

impl SubmissionOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Confirmed { .. } => "confirmed",
            SubmissionOutcome::Expired { .. } => "expired",
            SubmissionOutcome::Rejected { .. } => "rejected",
            SubmissionOutcome::Abandoned { .. } => "abandoned",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Confirmed { .. })
    }

    pub fn signature(&self) -> Option<Signature> {
        match self {
            SubmissionOutcome::Confirmed { signature, .. }
            | SubmissionOutcome::Expired { signature, .. }
            | SubmissionOutcome::Abandoned { signature, .. } => Some(*signature),
            SubmissionOutcome::Rejected { .. } => None,
        }
    }

    /// Error view of a non-confirmed outcome; `None` for Confirmed and Abandoned.
    pub fn error(&self) -> Option<CampaignError> {
        match self {
            SubmissionOutcome::Expired { expiry_height, .. } => Some(CampaignError::Expired {
                expiry_height: *expiry_height,
            }),
            SubmissionOutcome::Rejected { cause, .. } => Some(cause.clone()),
            SubmissionOutcome::Confirmed { .. } | SubmissionOutcome::Abandoned { .. } => None,
        }
    }
}

/// Submission state machine over a gateway.
#[derive(Clone)]
pub struct TransactionSubmitter {
    gateway: Gateway,
    policy: RetryPolicy,
    registry: InFlightRegistry,
    abandon: AbandonSignal,
}

impl TransactionSubmitter {
    pub fn new(gateway: Gateway, policy: RetryPolicy) -> Self {
        Self {
            gateway,
            policy,
            registry: InFlightRegistry::new(),
            abandon: AbandonSignal::new(),
        }
    }

    /// Use an externally owned abandon signal (e.g. wired to Ctrl-C).
    pub fn with_abandon_signal(mut self, abandon: AbandonSignal) -> Self {
        self.abandon = abandon;
        self
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    pub fn abandon_signal(&self) -> &AbandonSignal {
        &self.abandon
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Claim `campaign` for a new submission. Fails with `AlreadyInFlight`.
    pub fn claim(&self, campaign: Pubkey) -> Result<InFlightGuard, CampaignError> {
        self.registry.claim(campaign)
    }

    /// Drive `intent` to a terminal outcome. The guard is released on return.
    pub async fn execute(
        &self,
        guard: InFlightGuard,
        intent: &OperationIntent,
        accounts: &DerivedAccounts,
    ) -> SubmissionOutcome {
        let kind = intent.kind();
        let mut submission = Submission::new(kind, guard.address(), self.policy.max_attempts(kind));
        let span = crate::observability::tracing::submission_span(submission.id, kind, &guard.address());

        let outcome = self
            .run(&guard, &mut submission, intent, accounts)
            .instrument(span.clone())
            .await;

        span.in_scope(|| {
            tracing::info!(
                outcome = outcome.label(),
                state = ?submission.state,
                attempts = submission.attempts,
                signature = ?submission.signature,
                "Submission finished"
            );
        });
        metrics::record_submission(kind.as_str(), outcome.label());
        outcome
    }

    async fn run(
        &self,
        guard: &InFlightGuard,
        submission: &mut Submission,
        intent: &OperationIntent,
        accounts: &DerivedAccounts,
    ) -> SubmissionOutcome {
        // Building
        let instruction = match instruction::build(intent, accounts) {
            Ok(ix) => ix,
            Err(e) => {
                tracing::warn!(error = %e, "Instruction could not be built");
                return self.reject(guard, submission, e.into());
            }
        };

        let (signature, token) = match self.send_with_retries(guard, submission, &instruction).await {
            Ok(accepted) => accepted,
            Err(cause) => return self.reject(guard, submission, cause),
        };

        // Confirming
        submission.transition(guard, SubmissionState::Confirming);
        let started = Instant::now();
        let confirmation = tokio::select! {
            biased;
            _ = self.abandon.triggered() => None,
            result = self.gateway.confirm(&signature, token.expiry_height) => Some(result),
        };

        match confirmation {
            Some(Ok(ConfirmationStatus::Confirmed { slot })) => {
                metrics::record_confirmation_time(submission.kind.as_str(), started.elapsed());
                submission.transition(guard, SubmissionState::Confirmed);
                SubmissionOutcome::Confirmed { signature, slot }
            }
            Some(Ok(ConfirmationStatus::Expired { expiry_height })) => {
                tracing::warn!(signature = %signature, expiry_height, "Transaction expired before inclusion");
                submission.transition(guard, SubmissionState::Expired);
                SubmissionOutcome::Expired {
                    signature,
                    expiry_height,
                }
            }
            Some(Ok(ConfirmationStatus::Failed(reason))) => {
                tracing::warn!(signature = %signature, reason = %reason, "Transaction failed on-chain");
                let cause = CampaignError::NodeRejected {
                    kind: RejectionKind::Permanent,
                    reason: format!("transaction {} failed on-chain: {}", signature, reason),
                };
                self.reject(guard, submission, cause)
            }
            Some(Err(e)) => {
                tracing::warn!(signature = %signature, error = %e, "Lost contact while confirming");
                SubmissionOutcome::Abandoned {
                    signature,
                    reason: Some(format!("lost contact with node: {}", e)),
                }
            }
            None => {
                tracing::info!(signature = %signature, "Confirmation wait abandoned");
                SubmissionOutcome::Abandoned {
                    signature,
                    reason: None,
                }
            }
        }
    }

    /// Building/Submitted loop. Returns the accepted signature and the token
    /// it was sent with, or the cause of rejection.
    ///
    /// A send that failed transiently may still have reached the node. Such
    /// sends are remembered: an "already processed" answer to a resend of the
    /// same transaction, or a status found for it before switching tokens,
    /// counts as accepted.
    async fn send_with_retries(
        &self,
        guard: &InFlightGuard,
        submission: &mut Submission,
        instruction: &Instruction,
    ) -> Result<(Signature, FreshnessToken), CampaignError> {
        let mut token: Option<FreshnessToken> = None;
        let mut last_round_trip = Duration::ZERO;
        let mut unacknowledged: Vec<(Signature, FreshnessToken)> = Vec::new();

        loop {
            let current = match token {
                Some(current) => current,
                None => {
                    let started = Instant::now();
                    let fetched = self.gateway.latest_freshness_token().await;
                    last_round_trip = started.elapsed();
                    match fetched {
                        Ok(fresh) => {
                            tracing::debug!(blockhash = %fresh.blockhash, expiry_height = fresh.expiry_height, "Freshness token acquired");
                            submission.set_token(fresh);
                            fresh
                        }
                        Err(e) => {
                            self.after_transient_failure(submission, &e, last_round_trip).await?;
                            continue;
                        }
                    }
                }
            };

            let transaction = match self.gateway.sign(instruction, &current).await {
                Ok(transaction) => transaction,
                Err(e) => return Err(CampaignError::rejected(&e)),
            };
            let signed = transaction.signature().copied();

            submission.transition(guard, SubmissionState::Submitted);
            submission.attempts += 1;
            metrics::record_submit_attempt(submission.kind.as_str());

            let started = Instant::now();
            let sent = self.gateway.send(&transaction).await;
            last_round_trip = started.elapsed();

            match sent {
                Ok(signature) => {
                    tracing::info!(
                        signature = %signature,
                        attempt = submission.attempts,
                        rtt_ms = last_round_trip.as_millis() as u64,
                        "Transaction submitted"
                    );
                    submission.signature = Some(signature);
                    return Ok((signature, current));
                }
                Err(LedgerError::AlreadyProcessed) => {
                    let landed = signed.filter(|sig| unacknowledged.iter().any(|(earlier, _)| earlier == sig));
                    match landed {
                        Some(signature) => {
                            tracing::info!(
                                signature = %signature,
                                attempt = submission.attempts,
                                "Earlier attempt already landed"
                            );
                            submission.signature = Some(signature);
                            return Ok((signature, current));
                        }
                        None => return Err(CampaignError::rejected(&LedgerError::AlreadyProcessed)),
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt = submission.attempts, error = %e, "Submission attempt failed");
                    if let Some(signature) = signed.filter(|_| e.is_transient() && !e.requires_fresh_token()) {
                        unacknowledged.push((signature, current));
                    }
                    self.after_transient_failure(submission, &e, last_round_trip).await?;
                    token = self.reusable_token(current, &e).await;
                    if token.is_none() {
                        if let Some((signature, sent_with)) = self.landed_earlier(&unacknowledged).await {
                            tracing::info!(signature = %signature, "Earlier attempt found on the ledger");
                            submission.signature = Some(signature);
                            return Ok((signature, sent_with));
                        }
                        submission.transition(guard, SubmissionState::Building);
                    }
                }
            }
        }
    }

    /// First unacknowledged send the node reports a status for.
    async fn landed_earlier(
        &self,
        unacknowledged: &[(Signature, FreshnessToken)],
    ) -> Option<(Signature, FreshnessToken)> {
        for (signature, token) in unacknowledged {
            match self.gateway.signature_status(signature).await {
                Ok(Some(_)) => return Some((*signature, *token)),
                Ok(None) => {}
                Err(e) => tracing::debug!(signature = %signature, error = %e, "Status of earlier attempt unavailable"),
            }
        }
        None
    }

    /// Classify a failure: permanent or budget spent ends the submission,
    /// otherwise sleep the backoff and let the loop retry.
    async fn after_transient_failure(
        &self,
        submission: &mut Submission,
        error: &LedgerError,
        last_round_trip: Duration,
    ) -> Result<(), CampaignError> {
        if !error.is_transient() {
            return Err(CampaignError::rejected(error));
        }
        if !submission.consume_retry() {
            tracing::warn!(attempts = submission.attempts, "Retry budget exhausted");
            return Err(CampaignError::rejected(error));
        }
        let failed = submission.attempts.max(1);
        let delay = self.policy.delay(failed, last_round_trip);
        tracing::debug!(
            delay_ms = delay.as_millis() as u64,
            retries_remaining = submission.retries_remaining,
            "Backing off before retry"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// The token to resubmit with, or `None` when a fresh one is needed.
    async fn reusable_token(&self, current: FreshnessToken, error: &LedgerError) -> Option<FreshnessToken> {
        if error.requires_fresh_token() {
            return None;
        }
        match self.gateway.block_height().await {
            Ok(height) if height <= current.expiry_height => Some(current),
            Ok(height) => {
                tracing::debug!(height, expiry_height = current.expiry_height, "Freshness token stale");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Block height unavailable, refreshing token");
                None
            }
        }
    }

    fn reject(&self, guard: &InFlightGuard, submission: &mut Submission, cause: CampaignError) -> SubmissionOutcome {
        submission.transition(guard, SubmissionState::Rejected);
        tracing::warn!(classification = cause.classification(), cause = %cause, "Submission rejected");
        SubmissionOutcome::Rejected {
            cause,
            attempts: submission.attempts,
        }
    }
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("gateway", &self.gateway)
            .field("policy", &self.policy)
            .field("registry", &self.registry)
            .finish()
    }
}
