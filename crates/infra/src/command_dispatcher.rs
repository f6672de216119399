//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream
//!   ↓
//! 2. Rehydrate (apply history)
//!   ↓
//! 3. Handle (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(version read)
//!   ↓
//! 5. Publish committed events to the bus
//! ```
//!
//! A lost race at step 4 reloads and re-decides, up to `max_retries` times.
//! Because the decision is re-made against fresh state, a retried ledger adjust
//! or count commit is computed from the stock that actually won.
//!
//! This module contains no IO itself; it composes infrastructure traits.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use shopfloor_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use shopfloor_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command was rejected by the aggregate.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Optimistic concurrency kept failing after every retry.
    #[error("concurrency conflict after {attempts} attempt(s): {message}")]
    Concurrency { attempts: u32, message: String },
    /// Stored payload could not be read back into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    /// Stream read back out of order or with a foreign aggregate id.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; the events
    /// are already stored).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl DispatchError {
    /// Conflicts (lost races, mismatched scans) are recoverable by the caller.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DispatchError::Concurrency { .. } | DispatchError::Domain(DomainError::Conflict(_))
        )
    }
}

/// Result of one successful dispatch.
#[derive(Debug, Clone)]
pub struct Dispatched<A: Aggregate> {
    /// Committed events with their assigned sequence numbers.
    pub committed: Vec<StoredEvent>,
    /// The same events, typed.
    pub events: Vec<A::Event>,
    /// Aggregate state after the events were applied.
    pub state: A,
}

impl<A: Aggregate> Dispatched<A> {
    pub fn is_noop(&self) -> bool {
        self.committed.is_empty()
    }
}

/// Reusable command execution engine.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    max_retries: u32,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Extra attempts after the first on optimistic concurrency failure.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load and rehydrate an aggregate without dispatching anything.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id).map_err(DispatchError::Store)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Dispatch a command through the full pipeline, retrying on lost races.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: shopfloor_events::Event,
    {
        let attempts = self.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_dispatch(aggregate_id, aggregate_type, &command, &make_aggregate) {
                Err(EventStoreOutcome::Conflict(message)) if attempt < attempts => {
                    warn!(
                        aggregate_type,
                        aggregate_id = %aggregate_id,
                        attempt,
                        %message,
                        "optimistic concurrency conflict; retrying"
                    );
                }
                Err(EventStoreOutcome::Conflict(message)) => {
                    return Err(DispatchError::Concurrency {
                        attempts: attempt,
                        message,
                    });
                }
                Err(EventStoreOutcome::Failed(err)) => return Err(err),
                Ok(dispatched) => return Ok(dispatched),
            }
        }
    }

    fn try_dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: &impl Fn(AggregateId) -> A,
    ) -> Result<Dispatched<A>, EventStoreOutcome>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: shopfloor_events::Event,
    {
        // 1) Load history
        let history = self
            .store
            .load_stream(aggregate_id)
            .map_err(|e| EventStoreOutcome::Failed(DispatchError::Store(e)))?;
        validate_loaded_stream(aggregate_id, &history).map_err(EventStoreOutcome::Failed)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history).map_err(EventStoreOutcome::Failed)?;

        // 3) Decide (no mutation)
        let decided = aggregate
            .handle(command)
            .map_err(|e| EventStoreOutcome::Failed(DispatchError::Domain(e)))?;
        if decided.is_empty() {
            return Ok(Dispatched {
                committed: vec![],
                events: vec![],
                state: aggregate,
            });
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EventStoreOutcome::Failed(DispatchError::Store(e)))?;

        let committed = match self.store.append(uncommitted, expected) {
            Ok(committed) => committed,
            Err(EventStoreError::Concurrency(msg)) => return Err(EventStoreOutcome::Conflict(msg)),
            Err(e) => return Err(EventStoreOutcome::Failed(DispatchError::Store(e))),
        };

        for ev in &decided {
            aggregate.apply(ev);
        }

        // 5) Publish after append
        for stored in &committed {
            self.bus.publish(stored.to_envelope()).map_err(|e| {
                EventStoreOutcome::Failed(DispatchError::Publish(format!("{e:?}")))
            })?;
        }

        debug!(
            aggregate_type,
            aggregate_id = %aggregate_id,
            events = committed.len(),
            version = stream_version(&committed),
            "events committed"
        );

        Ok(Dispatched {
            committed,
            events: decided,
            state: aggregate,
        })
    }
}

enum EventStoreOutcome {
    Conflict(String),
    Failed(DispatchError),
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::CorruptStream(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::CorruptStream(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
