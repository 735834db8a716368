//! Request builder: typed intents to program instructions.
//!
//! Instruction data is an 8-byte discriminator (`sha256("global:<name>")[..8]`)
//! followed by the Borsh-encoded arguments.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ledger::transaction::{AccountMeta, Instruction};
use crate::ledger::types::{Pubkey, SYSTEM_PROGRAM_ID};
use crate::program::intent::{IntentAction, OperationIntent};

/// Instruction discriminator for the program method `name`.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{}", name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Local failures while building an instruction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Requester is not the campaign authority (or the authority is unknown).
    #[error("{requester} is not the campaign authority (admin: {})", display_admin(.admin))]
    MissingAuthority { requester: Pubkey, admin: Option<Pubkey> },

    /// Intent target and derived campaign account disagree.
    #[error("intent targets {target} but derived campaign is {derived}")]
    AccountMismatch { target: Pubkey, derived: Pubkey },

    #[error("instruction encoding failed: {0}")]
    Encoding(String),
}

fn display_admin(admin: &Option<Pubkey>) -> String {
    admin.map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string())
}

#[derive(BorshSerialize, BorshDeserialize)]
struct CreateArgs {
    name: String,
    description: String,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AmountArgs {
    amount: u64,
}

/// The program's three instructions with their arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignInstruction {
    Create { name: String, description: String },
    Donate { amount: u64 },
    Withdraw { amount: u64 },
}

impl CampaignInstruction {
    /// Program method name.
    pub fn name(&self) -> &'static str {
        match self {
            CampaignInstruction::Create { .. } => "create",
            CampaignInstruction::Donate { .. } => "donate",
            CampaignInstruction::Withdraw { .. } => "withdraw",
        }
    }

    /// Encode into instruction data.
    pub fn pack(&self) -> Result<Vec<u8>, BuildError> {
        let args = match self {
            CampaignInstruction::Create { name, description } => borsh::to_vec(&CreateArgs {
                name: name.clone(),
                description: description.clone(),
            }),
            CampaignInstruction::Donate { amount } | CampaignInstruction::Withdraw { amount } => {
                borsh::to_vec(&AmountArgs { amount: *amount })
            }
        }
        .map_err(|e| BuildError::Encoding(e.to_string()))?;

        let mut data = instruction_discriminator(self.name()).to_vec();
        data.extend_from_slice(&args);
        Ok(data)
    }

    /// Decode instruction data produced by [`pack`](Self::pack).
    pub fn unpack(data: &[u8]) -> Result<Self, BuildError> {
        if data.len() < 8 {
            return Err(BuildError::Encoding(format!("instruction data is {} bytes", data.len())));
        }
        let (tag, args) = data.split_at(8);
        let decode_err = |e: std::io::Error| BuildError::Encoding(e.to_string());

        if tag == instruction_discriminator("create") {
            let args: CreateArgs = borsh::from_slice(args).map_err(decode_err)?;
            Ok(CampaignInstruction::Create {
                name: args.name,
                description: args.description,
            })
        } else if tag == instruction_discriminator("donate") {
            let args: AmountArgs = borsh::from_slice(args).map_err(decode_err)?;
            Ok(CampaignInstruction::Donate { amount: args.amount })
        } else if tag == instruction_discriminator("withdraw") {
            let args: AmountArgs = borsh::from_slice(args).map_err(decode_err)?;
            Ok(CampaignInstruction::Withdraw { amount: args.amount })
        } else {
            Err(BuildError::Encoding("unknown instruction discriminator".to_string()))
        }
    }
}

/// Accounts resolved ahead of building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAccounts {
    pub program_id: Pubkey,
    /// Campaign account: derived address for Create, the target otherwise.
    pub campaign: Pubkey,
    /// Current campaign authority, when known. Required for Withdraw.
    pub campaign_admin: Option<Pubkey>,
}

/// Build the instruction for `intent`.
pub fn build(intent: &OperationIntent, accounts: &DerivedAccounts) -> Result<Instruction, BuildError> {
    if let Some(target) = intent.target() {
        if target != accounts.campaign {
            return Err(BuildError::AccountMismatch {
                target,
                derived: accounts.campaign,
            });
        }
    }

    let (instruction, metas) = match &intent.action {
        IntentAction::Create { name, description } => (
            CampaignInstruction::Create {
                name: name.clone(),
                description: description.clone(),
            },
            vec![
                AccountMeta::writable(accounts.campaign, false),
                AccountMeta::writable(intent.requester, true),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            ],
        ),
        IntentAction::Donate { amount, .. } => (
            CampaignInstruction::Donate { amount: *amount },
            vec![
                AccountMeta::writable(accounts.campaign, false),
                AccountMeta::writable(intent.requester, true),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            ],
        ),
        IntentAction::Withdraw { amount, .. } => {
            if accounts.campaign_admin != Some(intent.requester) {
                return Err(BuildError::MissingAuthority {
                    requester: intent.requester,
                    admin: accounts.campaign_admin,
                });
            }
            (
                CampaignInstruction::Withdraw { amount: *amount },
                vec![
                    AccountMeta::writable(accounts.campaign, false),
                    AccountMeta::writable(intent.requester, true),
                ],
            )
        }
    };

    Ok(Instruction {
        program_id: accounts.program_id,
        accounts: metas,
        data: instruction.pack()?,
    })
}
