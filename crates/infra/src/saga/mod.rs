//! Saga infrastructure: feeding committed events to process managers and
//! replaying source streams to recover actions that never landed.

pub mod material_posting;

pub use material_posting::{LedgerPosting, MaterialPostingSaga};

use std::marker::PhantomData;

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use shopfloor_events::{EventEnvelope, Saga, SagaAction};

use crate::event_store::{EventStore, EventStoreError};

/// Executes saga actions against their target aggregates.
pub trait ActionExecutor<A>: Send + Sync {
    type Error: std::fmt::Debug + From<EventStoreError>;

    /// Apply one action. Returns `false` when its idempotency key had already
    /// been applied and nothing changed.
    fn execute(&self, action: &A) -> Result<bool, Self::Error>;
}

/// Runs one saga type over committed envelopes.
pub struct SagaRunner<G, X> {
    executor: X,
    _saga: PhantomData<fn() -> G>,
}

impl<G, X> SagaRunner<G, X>
where
    G: Saga,
    X: ActionExecutor<G::Action>,
{
    pub fn new(executor: X) -> Self {
        Self {
            executor,
            _saga: PhantomData,
        }
    }

    /// Execute every action the saga derives from one committed envelope, in
    /// order, stopping at the first failure. Returns how many actions changed
    /// state.
    pub fn handle(&self, envelope: &EventEnvelope<JsonValue>) -> Result<usize, X::Error> {
        if !G::source_types().contains(&envelope.aggregate_type()) {
            return Ok(0);
        }

        let mut applied = 0;
        for action in G::react(envelope) {
            if self.executor.execute(&action)? {
                applied += 1;
            } else {
                debug!(
                    saga = G::saga_type(),
                    key = action.idempotency_key(),
                    "saga action already applied"
                );
            }
        }
        Ok(applied)
    }

    /// Replay every source stream through the saga. Actions that already
    /// landed are skipped by key; the rest are applied now.
    pub fn recover<S>(&self, store: &S) -> Result<usize, X::Error>
    where
        S: EventStore + ?Sized,
    {
        let mut applied = 0;
        for aggregate_type in G::source_types() {
            for stored in store.load_by_type(aggregate_type)? {
                applied += self.handle(&stored.to_envelope())?;
            }
        }
        if applied > 0 {
            info!(saga = G::saga_type(), applied, "saga recovery applied missing actions");
        }
        Ok(applied)
    }
}
