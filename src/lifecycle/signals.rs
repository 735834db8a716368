//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for Ctrl-C for the whole run
//! - First Ctrl-C while a confirmation wait is running abandons the wait
//! - Ctrl-C with nothing waiting, or a second Ctrl-C, exits the process
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Registering the handler replaces the default SIGINT behaviour for the
//!   life of the process, so the listener never stops and exits itself

use crate::lifecycle::abandon::AbandonSignal;

/// Exit status after an interrupt (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What an interrupt should do given the current abandon state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// End the confirmation waits in progress and keep running.
    Abandon,
    /// Terminate the process.
    Exit,
}

/// Decide how to handle one Ctrl-C.
pub fn interrupt_action(signal: &AbandonSignal) -> InterruptAction {
    if signal.is_triggered() || signal.waiting() == 0 {
        InterruptAction::Exit
    } else {
        InterruptAction::Abandon
    }
}

/// Spawn a task that handles every Ctrl-C for the rest of the process.
pub fn abandon_on_ctrl_c(signal: AbandonSignal) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for interrupt");
                return;
            }
            match interrupt_action(&signal) {
                InterruptAction::Abandon => {
                    tracing::warn!("Interrupt received, abandoning confirmation wait (Ctrl-C again to exit)");
                    signal.trigger();
                }
                InterruptAction::Exit => {
                    tracing::warn!("Interrupt received, exiting");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    })
}
