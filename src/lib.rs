//! Crowdfunding client for a ledger-resident campaign program.
//!
//! # Architecture Overview
//!
//! ```text
//!     View (CLI)
//!        │ create / donate / withdraw / list
//!        ▼
//!   ┌──────────┐   intent    ┌───────────┐  instruction  ┌──────────────┐
//!   │  client  │────────────▶│ submitter │──────────────▶│   gateway    │──▶ ledger node
//!   │  facade  │             │ + inflight│◀──────────────│ (rpc/wallet) │◀── (JSON-RPC)
//!   └────┬─────┘             └───────────┘    outcome    └──────┬───────┘
//!        │ refresh                                              │
//!        ▼                                                      │
//!   ┌────────────┐        program accounts                      │
//!   │ repository │◀─────────────────────────────────────────────┘
//!   └────────────┘
//!
//!   Cross-cutting: config, observability, lifecycle (abandon on Ctrl-C)
//! ```

// Core subsystems
pub mod client;
pub mod ledger;
pub mod program;
pub mod repository;
pub mod submitter;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use client::CampaignClient;
pub use config::schema::ClientConfig;
pub use error::{CampaignError, CampaignResult, RejectionKind};
pub use lifecycle::AbandonSignal;
pub use repository::{CampaignRepository, DecodeError};
pub use submitter::{SubmissionOutcome, SubmissionState, TransactionSubmitter};
