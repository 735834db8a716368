//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Abandon (abandon.rs):
//!     trigger → every confirmation wait in progress stops waiting
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → trigger abandon, or exit when nothing is waiting
//! ```
//!
//! # Design Decisions
//! - An accepted transaction cannot be cancelled; only the local wait ends
//! - Abandoned waits are reconciled by the repository refresh that follows

pub mod abandon;
pub mod signals;

pub use abandon::AbandonSignal;
