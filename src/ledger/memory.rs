//! In-memory ledger for tests and local demos.
//!
//! Implements [`RpcTransport`] without a network. Transactions are checked
//! the way a node checks them (known blockhash, valid signature) and the
//! campaign program's rules are applied atomically on submission.
//!
//! Scripted behaviour for exercising the submitter:
//! - queued send failures, returned FIFO before any processing, optionally
//!   after the chain advanced (a node that answered too slowly)
//! - lost responses: the transaction lands but the sender sees an error
//! - a resend of a processed transaction answers "already processed"
//! - pausing sends, and failing status queries
//! - holding accepted transactions until [`InMemoryLedger::release_held`]
//! - silently dropping accepted transactions (they never land)
//! - block height advancing on every height query
//!
//! ## Thread Safety
//!
//! State sits behind a `std::sync::Mutex`; a poisoned lock surfaces as
//! `LedgerError::Transport` instead of a panic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;
use ed25519_dalek::{Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::config::schema::DEFAULT_SEED_TAG;
use crate::ledger::address::AddressDeriver;
use crate::ledger::rpc::RpcTransport;
use crate::ledger::transaction::Transaction;
use crate::ledger::types::{
    AccountSnapshot, Commitment, FreshnessToken, Hash, LedgerError, LedgerResult, Pubkey, Signature,
    SignatureStatus, SYSTEM_PROGRAM_ID,
};
use crate::program::instruction::CampaignInstruction;
use crate::program::state::{CampaignAccount, CAMPAIGN_ACCOUNT_SPACE, MAX_DESCRIPTION_LEN, MAX_NAME_LEN};

/// Blocks a blockhash stays valid after it is handed out.
pub const BLOCKHASH_VALIDITY: u64 = 150;

const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
const EXEMPTION_YEARS: u64 = 2;
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

const PREFLIGHT_FAILURE: i64 = -32002;
const SIGNATURE_FAILURE: i64 = -32003;

/// Rent-exempt minimum for an account of `data_len` bytes.
pub fn rent_exempt_minimum(data_len: usize) -> u64 {
    (data_len as u64 + ACCOUNT_STORAGE_OVERHEAD) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_YEARS
}

struct LedgerState {
    accounts: HashMap<Pubkey, AccountSnapshot>,
    block_height: u64,
    height_step: u64,
    /// blockhash → last valid block height
    blockhashes: HashMap<Hash, u64>,
    blockhash_counter: u64,
    statuses: HashMap<Signature, SignatureStatus>,
    held: Vec<Transaction>,
    /// Error plus blocks the chain advances before it is returned.
    send_failures: VecDeque<(LedgerError, u64)>,
    lost_responses: VecDeque<LedgerError>,
    status_unavailable: bool,
    hold_confirmations: bool,
    drop_transactions: bool,
    reserve_floor: Option<u64>,
    send_count: usize,
    blockhash_requests: usize,
}

/// Ledger node simulated in process memory.
pub struct InMemoryLedger {
    program_id: Pubkey,
    deriver: AddressDeriver,
    seed_tag: String,
    state: Mutex<LedgerState>,
    sends_paused: watch::Sender<bool>,
}

impl InMemoryLedger {
    /// Create an empty ledger hosting the campaign program at `program_id`.
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            deriver: AddressDeriver::new(program_id),
            seed_tag: DEFAULT_SEED_TAG.to_string(),
            state: Mutex::new(LedgerState {
                accounts: HashMap::new(),
                block_height: 1,
                height_step: 1,
                blockhashes: HashMap::new(),
                blockhash_counter: 0,
                statuses: HashMap::new(),
                held: Vec::new(),
                send_failures: VecDeque::new(),
                lost_responses: VecDeque::new(),
                status_unavailable: false,
                hold_confirmations: false,
                drop_transactions: false,
                reserve_floor: None,
                send_count: 0,
                blockhash_requests: 0,
            }),
            sends_paused: watch::channel(false).0,
        }
    }

    /// Seed tag the program uses for campaign addresses.
    pub fn with_seed_tag(mut self, seed_tag: impl Into<String>) -> Self {
        self.seed_tag = seed_tag.into();
        self
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    fn state(&self) -> LedgerResult<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|e| LedgerError::Transport(format!("ledger state poisoned: {}", e)))
    }

    /// Credit `lamports` to a system-owned account, creating it if needed.
    pub fn airdrop(&self, address: Pubkey, lamports: u64) {
        if let Ok(mut state) = self.state.lock() {
            let account = state.accounts.entry(address).or_insert_with(|| AccountSnapshot {
                lamports: 0,
                owner: SYSTEM_PROGRAM_ID,
                data: Vec::new(),
                executable: false,
            });
            account.lamports = account.lamports.saturating_add(lamports);
        }
    }

    /// Overwrite an account.
    pub fn set_account(&self, address: Pubkey, account: AccountSnapshot) {
        if let Ok(mut state) = self.state.lock() {
            state.accounts.insert(address, account);
        }
    }

    /// Place a campaign account holding its reserve plus `amount_donated`.
    pub fn seed_campaign(&self, address: Pubkey, admin: Pubkey, name: &str, description: &str, amount_donated: u64) {
        let record = CampaignAccount {
            admin,
            name: name.to_string(),
            description: description.to_string(),
            amount_donated,
        };
        let data = record.to_account_data();
        let lamports = self.reserve_for(data.len()) + amount_donated;
        self.set_account(
            address,
            AccountSnapshot {
                lamports,
                owner: self.program_id,
                data,
                executable: false,
            },
        );
    }

    pub fn account(&self, address: &Pubkey) -> Option<AccountSnapshot> {
        self.state.lock().ok()?.accounts.get(address).cloned()
    }

    pub fn balance(&self, address: &Pubkey) -> u64 {
        self.account(address).map(|a| a.lamports).unwrap_or(0)
    }

    /// Queue an error returned by the next `send_transaction` call.
    pub fn push_send_failure(&self, error: LedgerError) {
        self.push_stalled_send_failure(error, 0);
    }

    /// Like [`push_send_failure`](Self::push_send_failure), but the chain
    /// advances `blocks` before the error is returned.
    pub fn push_stalled_send_failure(&self, error: LedgerError, blocks: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.send_failures.push_back((error, blocks));
        }
    }

    /// Execute the next valid transaction but answer the sender with `error`.
    pub fn push_lost_response(&self, error: LedgerError) {
        if let Ok(mut state) = self.state.lock() {
            state.lost_responses.push_back(error);
        }
    }

    /// Make every signature status query fail at the transport level.
    pub fn set_status_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.status_unavailable = unavailable;
        }
    }

    /// Block `send_transaction` calls until [`resume_sends`](Self::resume_sends).
    pub fn pause_sends(&self) {
        self.sends_paused.send_replace(true);
    }

    pub fn resume_sends(&self) {
        self.sends_paused.send_replace(false);
    }

    /// Accept transactions but do not execute them until released.
    pub fn set_hold_confirmations(&self, hold: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.hold_confirmations = hold;
        }
    }

    /// Execute every held transaction in arrival order.
    pub fn release_held(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.hold_confirmations = false;
            let held = std::mem::take(&mut state.held);
            for tx in held {
                let outcome = self.execute(&mut state, &tx);
                Self::record_status(&mut state, &tx, outcome.err());
            }
        }
    }

    /// Accept transactions and forget them, as if lost before a leader saw them.
    pub fn set_drop_transactions(&self, drop: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.drop_transactions = drop;
        }
    }

    /// Blocks added on every block height query.
    pub fn set_height_step(&self, step: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.height_step = step;
        }
    }

    pub fn advance_blocks(&self, blocks: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.block_height += blocks;
        }
    }

    /// Override the rent-exempt minimum reported and enforced for every size.
    pub fn set_reserve_floor(&self, lamports: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.reserve_floor = Some(lamports);
        }
    }

    /// Number of `send_transaction` calls, including failed ones.
    pub fn send_count(&self) -> usize {
        self.state.lock().map(|s| s.send_count).unwrap_or(0)
    }

    /// Number of `get_latest_blockhash` calls.
    pub fn blockhash_requests(&self) -> usize {
        self.state.lock().map(|s| s.blockhash_requests).unwrap_or(0)
    }

    fn reserve_for(&self, data_len: usize) -> u64 {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.reserve_floor)
            .unwrap_or_else(|| rent_exempt_minimum(data_len))
    }

    fn record_status(state: &mut LedgerState, tx: &Transaction, err: Option<String>) {
        if let Some(signature) = tx.signature() {
            state.statuses.insert(
                *signature,
                SignatureStatus {
                    slot: state.block_height,
                    confirmation_status: Some(Commitment::Finalized),
                    err,
                },
            );
        }
    }

    /// Apply every instruction of `tx` to a copy of the accounts and commit
    /// only if all succeed.
    fn execute(&self, state: &mut LedgerState, tx: &Transaction) -> Result<(), String> {
        let mut accounts = state.accounts.clone();
        let reserve_floor = state.reserve_floor;
        let reserve = |len: usize| reserve_floor.unwrap_or_else(|| rent_exempt_minimum(len));

        for (index, compiled) in tx.message.instructions.iter().enumerate() {
            let (program_id, keys) = tx
                .message
                .resolve(compiled)
                .ok_or_else(|| format!("Error processing Instruction {}: invalid account index", index))?;
            if program_id != self.program_id {
                return Err(format!("Error processing Instruction {}: unsupported program {}", index, program_id));
            }
            let signer = |pos: usize| -> Result<Pubkey, String> {
                let key = *keys.get(pos).ok_or("not enough account keys")?;
                let idx = tx.message.account_keys.iter().position(|k| *k == key).unwrap_or(usize::MAX);
                if !tx.message.is_signer(idx) {
                    return Err(format!("missing required signature for {}", key));
                }
                Ok(key)
            };
            let instruction = CampaignInstruction::unpack(&compiled.data)
                .map_err(|e| format!("Error processing Instruction {}: {}", index, e))?;

            let result = match instruction {
                CampaignInstruction::Create { name, description } => {
                    let campaign = *keys.first().ok_or("not enough account keys")?;
                    let user = signer(1)?;
                    self.apply_create(&mut accounts, campaign, user, name, description, reserve(CAMPAIGN_ACCOUNT_SPACE))
                }
                CampaignInstruction::Donate { amount } => {
                    let campaign = *keys.first().ok_or("not enough account keys")?;
                    let user = signer(1)?;
                    self.apply_donate(&mut accounts, campaign, user, amount)
                }
                CampaignInstruction::Withdraw { amount } => {
                    let campaign = *keys.first().ok_or("not enough account keys")?;
                    let user = signer(1)?;
                    let data_len = accounts.get(&campaign).map(|a| a.data.len()).unwrap_or(0);
                    self.apply_withdraw(&mut accounts, campaign, user, amount, reserve(data_len))
                }
            };
            result.map_err(|e| format!("Error processing Instruction {}: {}", index, e))?;
        }

        state.accounts = accounts;
        Ok(())
    }

    fn load_campaign(
        &self,
        accounts: &HashMap<Pubkey, AccountSnapshot>,
        campaign: &Pubkey,
    ) -> Result<CampaignAccount, String> {
        let account = accounts.get(campaign).ok_or("AccountNotInitialized")?;
        if account.owner != self.program_id {
            return Err("AccountOwnedByWrongProgram".to_string());
        }
        CampaignAccount::decode(&account.data).map_err(|e| format!("AccountDidNotDeserialize: {}", e))
    }

    fn store_campaign(accounts: &mut HashMap<Pubkey, AccountSnapshot>, campaign: &Pubkey, record: &CampaignAccount) {
        if let Some(account) = accounts.get_mut(campaign) {
            let encoded = record.to_account_data();
            let len = account.data.len().max(encoded.len());
            account.data = encoded;
            account.data.resize(len, 0);
        }
    }

    fn apply_create(
        &self,
        accounts: &mut HashMap<Pubkey, AccountSnapshot>,
        campaign: Pubkey,
        user: Pubkey,
        name: String,
        description: String,
        rent: u64,
    ) -> Result<(), String> {
        let expected = self
            .deriver
            .derive(&self.seed_tag, &user)
            .map_err(|e| e.to_string())?;
        if campaign != expected {
            return Err("ConstraintSeeds: campaign address does not match seeds".to_string());
        }
        if accounts.get(&campaign).is_some_and(|a| a.lamports > 0 || !a.data.is_empty()) {
            return Err(format!("Allocate: account {} already in use", campaign));
        }
        if name.len() > MAX_NAME_LEN {
            return Err("custom program error: 0x1770 (NameTooLong)".to_string());
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err("custom program error: 0x1771 (DescriptionTooLong)".to_string());
        }
        let payer = accounts.get_mut(&user).ok_or("AccountNotFound")?;
        if payer.lamports < rent {
            return Err(format!("Transfer: insufficient lamports {}, need {}", payer.lamports, rent));
        }
        payer.lamports -= rent;

        let record = CampaignAccount {
            admin: user,
            name,
            description,
            amount_donated: 0,
        };
        accounts.insert(
            campaign,
            AccountSnapshot {
                lamports: rent,
                owner: self.program_id,
                data: record.to_account_data(),
                executable: false,
            },
        );
        Ok(())
    }

    fn apply_donate(
        &self,
        accounts: &mut HashMap<Pubkey, AccountSnapshot>,
        campaign: Pubkey,
        user: Pubkey,
        amount: u64,
    ) -> Result<(), String> {
        let mut record = self.load_campaign(accounts, &campaign)?;
        let donor = accounts.get_mut(&user).ok_or("AccountNotFound")?;
        if donor.lamports < amount {
            return Err(format!("Transfer: insufficient lamports {}, need {}", donor.lamports, amount));
        }
        donor.lamports -= amount;
        if let Some(target) = accounts.get_mut(&campaign) {
            target.lamports = target.lamports.checked_add(amount).ok_or("ArithmeticOverflow")?;
        }
        record.amount_donated = record.amount_donated.checked_add(amount).ok_or("ArithmeticOverflow")?;
        Self::store_campaign(accounts, &campaign, &record);
        Ok(())
    }

    fn apply_withdraw(
        &self,
        accounts: &mut HashMap<Pubkey, AccountSnapshot>,
        campaign: Pubkey,
        user: Pubkey,
        amount: u64,
        rent: u64,
    ) -> Result<(), String> {
        let mut record = self.load_campaign(accounts, &campaign)?;
        if record.admin != user {
            return Err("invalid account data for instruction".to_string());
        }
        if record.amount_donated < amount {
            return Err("insufficient funds for instruction".to_string());
        }
        let balance = accounts.get(&campaign).map(|a| a.lamports).unwrap_or(0);
        if balance.saturating_sub(amount) < rent || balance < amount {
            return Err("insufficient funds for instruction".to_string());
        }

        if let Some(source) = accounts.get_mut(&campaign) {
            source.lamports -= amount;
        }
        let admin = accounts.entry(user).or_insert_with(|| AccountSnapshot {
            lamports: 0,
            owner: SYSTEM_PROGRAM_ID,
            data: Vec::new(),
            executable: false,
        });
        admin.lamports = admin.lamports.saturating_add(amount);
        record.amount_donated -= amount;
        Self::store_campaign(accounts, &campaign, &record);
        Ok(())
    }
}

fn verify_signature(tx: &Transaction) -> Result<(), String> {
    let payer = tx.message.payer().ok_or("transaction has no fee payer")?;
    let signature = tx.signature().ok_or("transaction is unsigned")?;
    let key = VerifyingKey::from_bytes(&payer.0).map_err(|e| e.to_string())?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    key.verify(&tx.message.serialize(), &sig).map_err(|e| e.to_string())
}

#[async_trait]
impl RpcTransport for InMemoryLedger {
    async fn get_account_info(&self, address: &Pubkey) -> LedgerResult<Option<AccountSnapshot>> {
        Ok(self.state()?.accounts.get(address).cloned())
    }

    async fn get_program_accounts(&self, program_id: &Pubkey) -> LedgerResult<Vec<(Pubkey, AccountSnapshot)>> {
        Ok(self
            .state()?
            .accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .map(|(address, account)| (*address, account.clone()))
            .collect())
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LedgerResult<u64> {
        let state = self.state()?;
        Ok(state.reserve_floor.unwrap_or_else(|| rent_exempt_minimum(data_len)))
    }

    async fn get_latest_blockhash(&self) -> LedgerResult<FreshnessToken> {
        let mut state = self.state()?;
        state.blockhash_requests += 1;
        state.blockhash_counter += 1;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&Sha256::digest(state.blockhash_counter.to_le_bytes()));
        let blockhash = Hash(bytes);
        let expiry_height = state.block_height + BLOCKHASH_VALIDITY;
        state.blockhashes.insert(blockhash, expiry_height);

        Ok(FreshnessToken {
            blockhash,
            expiry_height,
        })
    }

    async fn get_block_height(&self) -> LedgerResult<u64> {
        let mut state = self.state()?;
        let height = state.block_height;
        state.block_height += state.height_step;
        Ok(height)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let mut paused = self.sends_paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;

        let mut state = self.state()?;
        state.send_count += 1;

        if let Some((error, blocks)) = state.send_failures.pop_front() {
            state.block_height += blocks;
            return Err(error);
        }

        let valid_until = state.blockhashes.get(&transaction.message.recent_blockhash).copied();
        if valid_until.map_or(true, |expiry| state.block_height > expiry) {
            return Err(LedgerError::BlockhashNotFound);
        }

        verify_signature(transaction).map_err(|reason| LedgerError::Node {
            code: SIGNATURE_FAILURE,
            message: format!("Transaction signature verification failure: {}", reason),
        })?;
        let signature = *transaction
            .signature()
            .ok_or_else(|| LedgerError::InvalidTransaction("unsigned transaction".to_string()))?;

        if state.statuses.contains_key(&signature) {
            return Err(LedgerError::AlreadyProcessed);
        }
        if state.held.iter().any(|t| t.signature() == Some(&signature)) {
            return Ok(signature);
        }
        if state.drop_transactions {
            return Ok(signature);
        }
        if state.hold_confirmations {
            state.held.push(transaction.clone());
            return Ok(signature);
        }

        self.execute(&mut state, transaction).map_err(|reason| LedgerError::Node {
            code: PREFLIGHT_FAILURE,
            message: format!("Transaction simulation failed: {}", reason),
        })?;
        Self::record_status(&mut state, transaction, None);
        if let Some(error) = state.lost_responses.pop_front() {
            return Err(error);
        }
        Ok(signature)
    }

    async fn get_signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>> {
        let state = self.state()?;
        if state.status_unavailable {
            return Err(LedgerError::Transport("signature status unavailable".to_string()));
        }
        Ok(state.statuses.get(signature).cloned())
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("program_id", &self.program_id)
            .field("seed_tag", &self.seed_tag)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::Message;
    use crate::ledger::wallet::{LocalKeypair, SigningAgent};
    use crate::program::instruction::{build, DerivedAccounts};
    use crate::program::intent::OperationIntent;

    const PROGRAM: Pubkey = Pubkey([42u8; 32]);

    async fn signed(ledger: &InMemoryLedger, wallet: &LocalKeypair, intent: OperationIntent, campaign: Pubkey) -> Transaction {
        let ix = build(
            &intent,
            &DerivedAccounts {
                program_id: PROGRAM,
                campaign,
                campaign_admin: Some(wallet.pubkey()),
            },
        )
        .unwrap();
        let token = ledger.get_latest_blockhash().await.unwrap();
        let message = Message::compile(&[ix], &wallet.pubkey(), token.blockhash).unwrap();
        Transaction::sign(message, wallet).await.unwrap()
    }

    #[test]
    fn test_rent_formula() {
        assert_eq!(rent_exempt_minimum(0), 890_880);
        assert_eq!(rent_exempt_minimum(CAMPAIGN_ACCOUNT_SPACE), (656 + 128) * 3_480 * 2);
    }

    #[tokio::test]
    async fn test_create_allocates_campaign() {
        let ledger = InMemoryLedger::new(PROGRAM);
        let wallet = LocalKeypair::from_seed([1u8; 32]);
        ledger.airdrop(wallet.pubkey(), 1_000_000_000);
        let campaign = AddressDeriver::new(PROGRAM).derive(DEFAULT_SEED_TAG, &wallet.pubkey()).unwrap();

        let tx = signed(&ledger, &wallet, OperationIntent::create(wallet.pubkey(), "n", "d"), campaign).await;
        ledger.send_transaction(&tx).await.unwrap();

        let account = ledger.account(&campaign).unwrap();
        assert_eq!(account.owner, PROGRAM);
        assert_eq!(account.lamports, rent_exempt_minimum(CAMPAIGN_ACCOUNT_SPACE));
        assert_eq!(CampaignAccount::decode(&account.data).unwrap().admin, wallet.pubkey());

        // Same address again is rejected at preflight.
        let tx = signed(&ledger, &wallet, OperationIntent::create(wallet.pubkey(), "n", "d"), campaign).await;
        let err = ledger.send_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::Node { code: PREFLIGHT_FAILURE, .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_non_derived_address() {
        let ledger = InMemoryLedger::new(PROGRAM);
        let wallet = LocalKeypair::from_seed([1u8; 32]);
        ledger.airdrop(wallet.pubkey(), 1_000_000_000);

        let tx = signed(&ledger, &wallet, OperationIntent::create(wallet.pubkey(), "n", "d"), Pubkey([5u8; 32])).await;
        let err = ledger.send_transaction(&tx).await.unwrap_err();
        assert!(err.to_string().contains("ConstraintSeeds"));
    }

    #[tokio::test]
    async fn test_withdraw_respects_reserve() {
        let ledger = InMemoryLedger::new(PROGRAM);
        let wallet = LocalKeypair::from_seed([1u8; 32]);
        let campaign = Pubkey([7u8; 32]);
        ledger.set_reserve_floor(100);
        ledger.seed_campaign(campaign, wallet.pubkey(), "n", "d", 900);
        assert_eq!(ledger.balance(&campaign), 1_000);

        let tx = signed(&ledger, &wallet, OperationIntent::withdraw(wallet.pubkey(), campaign, 950), campaign).await;
        assert!(ledger.send_transaction(&tx).await.is_err());

        let tx = signed(&ledger, &wallet, OperationIntent::withdraw(wallet.pubkey(), campaign, 850), campaign).await;
        ledger.send_transaction(&tx).await.unwrap();
        assert_eq!(ledger.balance(&campaign), 150);
        assert_eq!(ledger.balance(&wallet.pubkey()), 850);
    }

    #[tokio::test]
    async fn test_expired_blockhash_rejected() {
        let ledger = InMemoryLedger::new(PROGRAM);
        let wallet = LocalKeypair::from_seed([1u8; 32]);
        let campaign = Pubkey([7u8; 32]);
        ledger.airdrop(wallet.pubkey(), 1_000);
        ledger.seed_campaign(campaign, wallet.pubkey(), "n", "d", 0);

        let tx = signed(&ledger, &wallet, OperationIntent::donate(wallet.pubkey(), campaign, 10), campaign).await;
        ledger.advance_blocks(BLOCKHASH_VALIDITY + 1);
        assert_eq!(ledger.send_transaction(&tx).await.unwrap_err(), LedgerError::BlockhashNotFound);
    }

    #[tokio::test]
    async fn test_held_transaction_lands_on_release() {
        let ledger = InMemoryLedger::new(PROGRAM);
        let wallet = LocalKeypair::from_seed([1u8; 32]);
        let campaign = Pubkey([7u8; 32]);
        ledger.airdrop(wallet.pubkey(), 1_000);
        ledger.seed_campaign(campaign, wallet.pubkey(), "n", "d", 0);
        ledger.set_hold_confirmations(true);

        let tx = signed(&ledger, &wallet, OperationIntent::donate(wallet.pubkey(), campaign, 10), campaign).await;
        let signature = ledger.send_transaction(&tx).await.unwrap();
        assert!(ledger.get_signature_status(&signature).await.unwrap().is_none());

        ledger.release_held();
        let status = ledger.get_signature_status(&signature).await.unwrap().unwrap();
        assert!(status.err.is_none());
        assert_eq!(ledger.balance(&wallet.pubkey()), 990);
    }

    #[tokio::test]
    async fn test_resend_of_processed_transaction() {
        let ledger = InMemoryLedger::new(PROGRAM);
        let wallet = LocalKeypair::from_seed([1u8; 32]);
        let campaign = Pubkey([7u8; 32]);
        ledger.airdrop(wallet.pubkey(), 1_000);
        ledger.seed_campaign(campaign, wallet.pubkey(), "n", "d", 0);
        ledger.push_lost_response(LedgerError::Timeout(1));

        let tx = signed(&ledger, &wallet, OperationIntent::donate(wallet.pubkey(), campaign, 10), campaign).await;
        assert_eq!(ledger.send_transaction(&tx).await.unwrap_err(), LedgerError::Timeout(1));
        assert_eq!(ledger.balance(&wallet.pubkey()), 990);

        assert_eq!(ledger.send_transaction(&tx).await.unwrap_err(), LedgerError::AlreadyProcessed);
        assert_eq!(ledger.balance(&wallet.pubkey()), 990);
    }

    #[tokio::test]
    async fn test_stalled_failure_advances_chain() {
        let ledger = InMemoryLedger::new(PROGRAM);
        ledger.set_height_step(0);
        let start = ledger.get_block_height().await.unwrap();
        ledger.push_stalled_send_failure(LedgerError::Timeout(1), 500);

        let wallet = LocalKeypair::from_seed([1u8; 32]);
        let tx = signed(&ledger, &wallet, OperationIntent::donate(wallet.pubkey(), Pubkey([7u8; 32]), 10), Pubkey([7u8; 32])).await;
        assert!(ledger.send_transaction(&tx).await.is_err());
        assert_eq!(ledger.get_block_height().await.unwrap(), start + 500);
    }

    #[tokio::test]
    async fn test_status_unavailable() {
        let ledger = InMemoryLedger::new(PROGRAM);
        ledger.set_status_unavailable(true);
        assert!(matches!(
            ledger.get_signature_status(&Signature([0u8; 64])).await,
            Err(LedgerError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_scripted_failures_are_fifo() {
        let ledger = InMemoryLedger::new(PROGRAM);
        let wallet = LocalKeypair::from_seed([1u8; 32]);
        let campaign = Pubkey([7u8; 32]);
        ledger.airdrop(wallet.pubkey(), 1_000);
        ledger.seed_campaign(campaign, wallet.pubkey(), "n", "d", 0);
        ledger.push_send_failure(LedgerError::RateLimited);
        ledger.push_send_failure(LedgerError::Timeout(1));

        let tx = signed(&ledger, &wallet, OperationIntent::donate(wallet.pubkey(), campaign, 10), campaign).await;
        assert_eq!(ledger.send_transaction(&tx).await.unwrap_err(), LedgerError::RateLimited);
        assert_eq!(ledger.send_transaction(&tx).await.unwrap_err(), LedgerError::Timeout(1));
        assert!(ledger.send_transaction(&tx).await.is_ok());
        assert_eq!(ledger.send_count(), 3);
    }
}
