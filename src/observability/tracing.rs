//! Submission spans.
//!
//! A span per submission carries its id, kind and campaign so that every
//! event logged while it runs (gateway polls included) can be correlated.

use ::tracing::Span;
use uuid::Uuid;

use crate::ledger::types::Pubkey;
use crate::program::intent::OperationKind;

/// Span covering one submission from Building to its terminal state.
pub fn submission_span(id: Uuid, kind: OperationKind, campaign: &Pubkey) -> Span {
    ::tracing::info_span!(
        "submission",
        id = %id,
        kind = kind.as_str(),
        campaign = %campaign,
    )
}
