//! Append-only event store boundary.
//!
//! Every shop-floor mutation is one append against the version that was read,
//! so concurrent operators on the same stream race through a compare-and-swap
//! instead of a lock.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
