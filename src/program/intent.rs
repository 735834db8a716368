//! Operation intents issued by the view layer.

use serde::Serialize;

use crate::ledger::types::Pubkey;

/// Kind of state change requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Donate,
    Withdraw,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Donate => "donate",
            OperationKind::Withdraw => "withdraw",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the intent asks for, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentAction {
    Create { name: String, description: String },
    Donate { target: Pubkey, amount: u64 },
    Withdraw { target: Pubkey, amount: u64 },
}

/// A requested state change, consumed once by the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationIntent {
    /// Signing identity issuing the request.
    pub requester: Pubkey,
    pub action: IntentAction,
}

impl OperationIntent {
    pub fn create(requester: Pubkey, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            requester,
            action: IntentAction::Create {
                name: name.into(),
                description: description.into(),
            },
        }
    }

    pub fn donate(requester: Pubkey, target: Pubkey, amount: u64) -> Self {
        Self {
            requester,
            action: IntentAction::Donate { target, amount },
        }
    }

    pub fn withdraw(requester: Pubkey, target: Pubkey, amount: u64) -> Self {
        Self {
            requester,
            action: IntentAction::Withdraw { target, amount },
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self.action {
            IntentAction::Create { .. } => OperationKind::Create,
            IntentAction::Donate { .. } => OperationKind::Donate,
            IntentAction::Withdraw { .. } => OperationKind::Withdraw,
        }
    }

    /// Campaign the intent acts on; `None` for Create, whose address is derived.
    pub fn target(&self) -> Option<Pubkey> {
        match self.action {
            IntentAction::Create { .. } => None,
            IntentAction::Donate { target, .. } | IntentAction::Withdraw { target, .. } => Some(target),
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self.action {
            IntentAction::Create { .. } => None,
            IntentAction::Donate { amount, .. } | IntentAction::Withdraw { amount, .. } => Some(amount),
        }
    }
}
