//! Campaign program interface.
//!
//! # Data Flow
//! ```text
//! View intent (intent.rs)
//!     → build (instruction.rs): discriminator + Borsh args + account list
//!     → submitter
//!
//! Program accounts
//!     → decode (state.rs): discriminator check + Borsh record → Campaign
//! ```
//!
//! Everything here is pure; no I/O.

pub mod instruction;
pub mod intent;
pub mod state;

pub use instruction::{build, BuildError, CampaignInstruction, DerivedAccounts};
pub use intent::{IntentAction, OperationIntent, OperationKind};
pub use state::{Campaign, CampaignAccount, StateError, CAMPAIGN_ACCOUNT_SPACE, MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
