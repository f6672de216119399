//! Domain events, envelopes and the pub/sub bus used to fan committed events
//! out to read models, plus the process-manager contract used to chain
//! follow-up work onto committed events.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod saga;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use saga::{Saga, SagaAction};
