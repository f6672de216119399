//! Projections (read model builders).
//!
//! Projections consume committed envelopes and keep query-friendly read
//! models. They are:
//! - **Rebuildable** from the event store ([`replay`])
//! - **Idempotent**: envelopes at or below a stream's cursor are ignored, so
//!   at-least-once delivery is safe
//! - **Version-guarded**: services also push post-command state directly
//!   (`observe`), which only ever moves a record forward

pub mod inventory_catalog;
pub mod job_board;

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

use shopfloor_core::AggregateId;
use shopfloor_events::EventEnvelope;

use crate::event_store::{EventStore, EventStoreError};

pub use inventory_catalog::CatalogProjection;
pub use job_board::{JobBoardProjection, JobSummary};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("event does not belong to its stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection state lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Anything that can be fed committed envelopes.
pub trait Projection: Send + Sync {
    /// Aggregate type this projection consumes; other envelopes are skipped.
    fn aggregate_type(&self) -> &'static str;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all state, cursors included.
    fn reset(&self);
}

/// Rebuild `projection` from scratch using every stored event of its type.
/// Returns the number of envelopes replayed.
pub fn replay<S, P>(store: &S, projection: &P) -> Result<usize, ProjectionError>
where
    S: EventStore + ?Sized,
    P: Projection + ?Sized,
{
    let events = store.load_by_type(projection.aggregate_type())?;
    projection.reset();
    for stored in &events {
        projection.apply_envelope(&stored.to_envelope())?;
    }
    tracing::debug!(
        aggregate_type = projection.aggregate_type(),
        events = events.len(),
        "projection rebuilt"
    );
    Ok(events.len())
}

/// Cursor gate shared by the projections. `Ok(true)` means apply and advance.
fn gate(cursors: &HashMap<AggregateId, u64>, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
    let last = cursors.get(&aggregate_id).copied().unwrap_or(0);
    if seq == 0 {
        return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
    }
    if seq <= last {
        // Duplicate or replay; safe to ignore.
        return Ok(false);
    }
    if seq != last + 1 {
        return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
    }
    Ok(true)
}
