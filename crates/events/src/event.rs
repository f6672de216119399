use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A persisted domain fact.
///
/// Events are stored as JSON payloads and rehydrated on every load, so the
/// serde representation is part of the stream format: rename a variant and
/// old streams stop loading.
pub trait Event: Clone + core::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable dotted name, `<context>.<aggregate>.<fact>`
    /// (e.g. "jobs.card.materials_issued").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Shop-floor wall clock at the moment the fact happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}
