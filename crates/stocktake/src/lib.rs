//! Stock-take sessions (event-sourced) and the per-item count workflow.
//!
//! Sessions live on a single registry stream so that "at most one in progress"
//! is enforced by the stream's optimistic version check. The count workflow is
//! a plain state machine held by the operator's terminal; only its final
//! `VerifiedCount` ever reaches the ledger.

pub mod registry;
pub mod workflow;

pub use registry::{
    FinishSession, SessionFinished, SessionStarted, StartSession, StockTakeRegistry,
    StockTakeRegistryCommand, StockTakeRegistryEvent, StockTakeSession, StockTakeSessionId,
    StockTakeSessionStatus,
};
pub use workflow::{CountEntry, CountState, CountWorkflow, VerifiedCount, units_from_weight};
