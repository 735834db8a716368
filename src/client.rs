//! Campaign client: the boundary the view layer calls.
//!
//! # Data Flow
//! ```text
//! create / donate / withdraw:
//!     local preconditions (lengths, seed, existence, amount, reserve)
//!     → claim campaign address (in-flight registry)
//!     → TransactionSubmitter.execute → SubmissionOutcome
//!     → CampaignRepository.refresh (reconcile with the ledger)
//!
//! list_campaigns:
//!     CampaignRepository.refresh → sorted snapshot
//! ```
//!
//! # Design Decisions
//! - Local precondition failures are returned as `Err` and never reach the node
//! - Everything that reached the submitter comes back as a `SubmissionOutcome`
//! - The repository is refreshed after every outcome that touched the node;
//!   a failed refresh is logged and leaves the outcome unchanged

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{CampaignError, CampaignResult};
use crate::ledger::address::AddressDeriver;
use crate::ledger::gateway::Gateway;
use crate::ledger::rpc::RpcTransport;
use crate::ledger::types::Pubkey;
use crate::ledger::wallet::SigningAgent;
use crate::lifecycle::AbandonSignal;
use crate::program::instruction::DerivedAccounts;
use crate::program::intent::OperationIntent;
use crate::program::state::{Campaign, MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
use crate::repository::CampaignRepository;
use crate::submitter::{RetryPolicy, SubmissionOutcome, SubmissionState, TransactionSubmitter};

/// Crowdfunding client bound to one signing identity and one program.
#[derive(Clone)]
pub struct CampaignClient {
    gateway: Gateway,
    submitter: TransactionSubmitter,
    repository: CampaignRepository,
    deriver: AddressDeriver,
    seed_tag: String,
}

impl CampaignClient {
    pub fn new(gateway: Gateway, policy: RetryPolicy, program_id: Pubkey, seed_tag: impl Into<String>) -> Self {
        Self {
            submitter: TransactionSubmitter::new(gateway.clone(), policy),
            repository: CampaignRepository::new(gateway.clone(), program_id),
            deriver: AddressDeriver::new(program_id),
            seed_tag: seed_tag.into(),
            gateway,
        }
    }

    /// Wire a client from loaded configuration.
    pub fn from_config(
        config: &ClientConfig,
        transport: Arc<dyn RpcTransport>,
        signer: Arc<dyn SigningAgent>,
        abandon: AbandonSignal,
    ) -> CampaignResult<Self> {
        let program_id = Pubkey::from_str(&config.program.program_id)
            .map_err(|e| CampaignError::Configuration(format!("program.program_id: {}", e)))?;

        let gateway = Gateway::new(transport, signer, config.ledger.commitment)
            .with_poll_interval(Duration::from_millis(config.submitter.confirm_poll_interval_ms))
            .with_max_poll_failures(config.submitter.max_poll_failures);

        let mut client = Self::new(
            gateway,
            RetryPolicy::from(&config.submitter),
            program_id,
            config.program.seed_tag.clone(),
        );
        client.submitter = client.submitter.with_abandon_signal(abandon);
        Ok(client)
    }

    /// Signing identity every operation is requested by.
    pub fn requester(&self) -> Pubkey {
        self.gateway.signer_pubkey()
    }

    pub fn program_id(&self) -> Pubkey {
        self.deriver.program_id()
    }

    /// Derived address of the requester's campaign.
    pub fn campaign_address(&self) -> CampaignResult<Pubkey> {
        Ok(self.deriver.derive(&self.seed_tag, &self.requester())?)
    }

    /// Create the requester's campaign.
    pub async fn create_campaign(&self, name: &str, description: &str) -> CampaignResult<SubmissionOutcome> {
        if name.len() > MAX_NAME_LEN {
            return Err(CampaignError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(CampaignError::DescriptionTooLong {
                len: description.len(),
                max: MAX_DESCRIPTION_LEN,
            });
        }

        let campaign = self.campaign_address()?;
        let guard = self.submitter.claim(campaign)?;

        if self.gateway.fetch_account(&campaign).await?.is_some() {
            return Err(CampaignError::CampaignExists(campaign));
        }

        let intent = OperationIntent::create(self.requester(), name, description);
        let accounts = DerivedAccounts {
            program_id: self.program_id(),
            campaign,
            campaign_admin: None,
        };
        let outcome = self.submitter.execute(guard, &intent, &accounts).await;
        self.reconcile(&outcome).await;
        Ok(outcome)
    }

    /// Donate `amount` lamports to the campaign at `address`.
    pub async fn donate(&self, address: Pubkey, amount: u64) -> CampaignResult<SubmissionOutcome> {
        if amount == 0 {
            return Err(CampaignError::InvalidAmount);
        }
        let guard = self.submitter.claim(address)?;

        let intent = OperationIntent::donate(self.requester(), address, amount);
        let accounts = DerivedAccounts {
            program_id: self.program_id(),
            campaign: address,
            campaign_admin: None,
        };
        let outcome = self.submitter.execute(guard, &intent, &accounts).await;
        self.reconcile(&outcome).await;
        Ok(outcome)
    }

    /// Withdraw `amount` lamports from the campaign at `address` to its admin.
    ///
    /// The campaign is read fresh from the ledger, not from the cache, so the
    /// reserve check sees the current balance.
    pub async fn withdraw(&self, address: Pubkey, amount: u64) -> CampaignResult<SubmissionOutcome> {
        if amount == 0 {
            return Err(CampaignError::InvalidAmount);
        }
        let guard = self.submitter.claim(address)?;

        let account = self
            .gateway
            .fetch_account(&address)
            .await?
            .ok_or(CampaignError::NotFound(address))?;
        let campaign =
            Campaign::from_account(address, &self.program_id(), &account).map_err(|e| CampaignError::Decode {
                address,
                reason: e.to_string(),
            })?;

        let reserve_floor = self.gateway.minimum_reserve(campaign.data_len).await?;
        let available = campaign.withdrawable(reserve_floor);
        if amount > available {
            tracing::debug!(
                campaign = %address,
                requested = amount,
                available,
                reserve_floor,
                "Withdrawal would breach reserve floor"
            );
            return Err(CampaignError::InsufficientReserve {
                requested: amount,
                available,
                reserve_floor,
            });
        }
        if amount > campaign.amount_raised {
            return Err(CampaignError::ExceedsRaised {
                requested: amount,
                raised: campaign.amount_raised,
            });
        }

        let intent = OperationIntent::withdraw(self.requester(), address, amount);
        let accounts = DerivedAccounts {
            program_id: self.program_id(),
            campaign: address,
            campaign_admin: Some(campaign.admin),
        };
        let outcome = self.submitter.execute(guard, &intent, &accounts).await;
        self.reconcile(&outcome).await;
        Ok(outcome)
    }

    /// Refetch every campaign from the ledger.
    pub async fn list_campaigns(&self) -> CampaignResult<Vec<Campaign>> {
        self.repository.refresh().await
    }

    /// Last-known state of the campaign at `address`; no I/O.
    pub fn campaign(&self, address: &Pubkey) -> CampaignResult<Campaign> {
        self.repository.get(address)
    }

    /// Live submission state for `address`, if one is in flight.
    pub fn in_flight(&self, address: &Pubkey) -> Option<SubmissionState> {
        self.submitter.registry().state(address)
    }

    pub fn repository(&self) -> &CampaignRepository {
        &self.repository
    }

    pub fn submitter(&self) -> &TransactionSubmitter {
        &self.submitter
    }

    async fn reconcile(&self, outcome: &SubmissionOutcome) {
        if let SubmissionOutcome::Rejected { cause, .. } = outcome {
            if cause.is_local_precondition() {
                return;
            }
        }
        if let Err(e) = self.repository.refresh().await {
            tracing::warn!(error = %e, outcome = outcome.label(), "Repository refresh after submission failed");
        }
    }
}

impl std::fmt::Debug for CampaignClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignClient")
            .field("requester", &self.requester())
            .field("program_id", &self.program_id())
            .field("seed_tag", &self.seed_tag)
            .finish()
    }
}
