use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use shopfloor_core::{AggregateId, DomainError, EmployeeId};
use shopfloor_events::{EventBus, EventEnvelope};
use shopfloor_inventory::CatalogEntry;
use shopfloor_stocktake::{
    CountWorkflow, FinishSession, StartSession, StockTakeRegistry, StockTakeRegistryCommand,
    StockTakeSession, StockTakeSessionId,
};

use super::error::ServiceResult;
use super::stock_ledger::StockLedger;
use crate::aggregate_types;
use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;

/// Items already counted in a session versus those still to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub session_id: StockTakeSessionId,
    pub counted: Vec<CatalogEntry>,
    pub remaining: Vec<CatalogEntry>,
}

/// Stock-take sessions and the commit path for verified counts.
pub struct StockTakeService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    ledger: StockLedger<S, B>,
}

impl<S, B> StockTakeService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, ledger: StockLedger<S, B>) -> Self {
        Self { dispatcher, ledger }
    }

    /// Open a session. Writes one registry event and nothing per item.
    pub fn start(&self, started_by: EmployeeId, at: DateTime<Utc>) -> ServiceResult<StockTakeSession> {
        let session_id = StockTakeSessionId::new(AggregateId::new());
        let registry = self.execute(StockTakeRegistryCommand::StartSession(StartSession {
            session_id,
            started_by,
            occurred_at: at,
        }))?;
        let session = registry
            .session(session_id)
            .cloned()
            .ok_or_else(|| DomainError::invariant("started session missing from registry"))?;
        info!(session_id = %session_id, started_by = %started_by, "stock-take session started");
        Ok(session)
    }

    /// Stamp the end time and close the session. Items never counted keep
    /// their ledger quantities.
    pub fn finish(
        &self,
        session_id: StockTakeSessionId,
        finished_by: EmployeeId,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTakeSession> {
        let registry = self.execute(StockTakeRegistryCommand::FinishSession(FinishSession {
            session_id,
            finished_by,
            occurred_at: at,
        }))?;
        let session = registry
            .session(session_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("stock-take session {session_id}")))?;
        let progress = self.progress(session_id)?;
        info!(
            session_id = %session_id,
            counted = progress.counted.len(),
            uncounted = progress.remaining.len(),
            "stock-take session finished"
        );
        Ok(session)
    }

    pub fn active(&self) -> ServiceResult<Option<StockTakeSession>> {
        Ok(self.registry()?.active().cloned())
    }

    pub fn session(&self, session_id: StockTakeSessionId) -> ServiceResult<StockTakeSession> {
        self.registry()?
            .session(session_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("stock-take session {session_id}")).into())
    }

    /// Every session, oldest first.
    pub fn sessions(&self) -> ServiceResult<Vec<StockTakeSession>> {
        Ok(self.registry()?.sessions().to_vec())
    }

    /// Membership is the item's back-pointer to the last session that
    /// counted it.
    pub fn progress(&self, session_id: StockTakeSessionId) -> ServiceResult<SessionProgress> {
        self.session(session_id)?;
        let (counted, remaining): (Vec<CatalogEntry>, Vec<CatalogEntry>) = self
            .ledger
            .catalog()
            .list()
            .into_iter()
            .partition(|entry| entry.last_counted_in_session == Some(session_id.0));
        Ok(SessionProgress {
            session_id,
            counted,
            remaining,
        })
    }

    /// A fresh per-terminal count workflow for an in-progress session.
    pub fn begin_count(&self, session_id: StockTakeSessionId) -> ServiceResult<CountWorkflow> {
        self.ensure_in_progress(session_id)?;
        Ok(CountWorkflow::new(session_id))
    }

    /// Resolve a scanned code and move the workflow to AwaitingCount.
    pub fn scan(&self, workflow: &mut CountWorkflow, item_code: &str) -> ServiceResult<CatalogEntry> {
        let entry = self.ledger.item_by_code(item_code)?;
        workflow.scan_item(entry.clone())?;
        debug!(item_code, session_id = %workflow.session_id(), "item scanned for count");
        Ok(entry)
    }

    /// Post the workflow's verified count to the ledger and return the
    /// workflow to Idle. Without a successful confirmation scan there is
    /// nothing to post.
    pub fn commit(
        &self,
        workflow: &mut CountWorkflow,
        counted_by: EmployeeId,
        at: DateTime<Utc>,
    ) -> ServiceResult<CatalogEntry> {
        let verified = workflow.verified().cloned().ok_or_else(|| {
            DomainError::invariant(format!(
                "nothing to commit: count is {}",
                workflow.state().label()
            ))
        })?;
        self.ensure_in_progress(verified.session_id())?;

        let entry = self.ledger.record_count(&verified, counted_by, at)?;
        workflow.mark_committed()?;
        Ok(entry)
    }

    fn ensure_in_progress(&self, session_id: StockTakeSessionId) -> ServiceResult<()> {
        let session = self.session(session_id)?;
        if !session.is_in_progress() {
            return Err(DomainError::invariant(format!(
                "stock-take session {session_id} is already completed"
            ))
            .into());
        }
        Ok(())
    }

    fn registry(&self) -> ServiceResult<StockTakeRegistry> {
        Ok(self
            .dispatcher
            .load(StockTakeRegistry::stream_id(), StockTakeRegistry::empty)?)
    }

    fn execute(&self, command: StockTakeRegistryCommand) -> ServiceResult<StockTakeRegistry> {
        Ok(self
            .dispatcher
            .dispatch(
                StockTakeRegistry::stream_id(),
                aggregate_types::STOCK_TAKE_REGISTRY,
                command,
                StockTakeRegistry::empty,
            )?
            .state)
    }
}
