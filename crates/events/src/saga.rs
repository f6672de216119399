//! Process-manager mechanics (framework only, no business rules).
//!
//! A saga listens to committed events of one or more aggregate types and
//! turns them into follow-up actions on other aggregates. Infra runs sagas:
//! it feeds them envelopes as they commit and, after a crash, replays the
//! source streams through them again.
//!
//! Replays are the recovery path, so every action must carry its own
//! idempotency key and the executor must treat a repeated key as done.

use serde_json::Value as JsonValue;

use crate::EventEnvelope;

/// A follow-up action that can be applied at most once.
pub trait SagaAction: Clone + Send + Sync + 'static {
    /// Deterministic key derived from the source event. The same source event
    /// must always produce the same key.
    fn idempotency_key(&self) -> &str;
}

/// Saga contract.
pub trait Saga: Send + Sync + 'static {
    type Action: SagaAction;

    /// Stable saga type identifier, used in logs (e.g. "saga.material_posting").
    fn saga_type() -> &'static str;

    /// Aggregate types whose streams this saga reacts to.
    fn source_types() -> &'static [&'static str];

    /// React to one committed domain event, producing zero or more actions.
    ///
    /// Must be a pure function of the envelope so that a replay yields the
    /// same actions with the same keys.
    fn react(incoming: &EventEnvelope<JsonValue>) -> Vec<Self::Action>;
}
