use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopfloor_core::{Aggregate, AggregateId, AggregateRoot, DomainError, EmployeeId};
use shopfloor_events::Event;

/// Stock-take session identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockTakeSessionId(pub AggregateId);

impl StockTakeSessionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockTakeSessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockTakeSessionStatus {
    InProgress,
    Completed,
}

/// One session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTakeSession {
    pub id: StockTakeSessionId,
    pub status: StockTakeSessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub started_by: EmployeeId,
    pub finished_by: Option<EmployeeId>,
}

impl StockTakeSession {
    pub fn is_in_progress(&self) -> bool {
        self.status == StockTakeSessionStatus::InProgress
    }
}

/// Aggregate root: the registry of every stock-take session.
///
/// There is exactly one registry stream (see [`StockTakeRegistry::stream_id`]).
/// Starting a session is one event on it and nothing else; no inventory item is
/// touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockTakeRegistry {
    id: AggregateId,
    sessions: Vec<StockTakeSession>,
    active: Option<usize>,
    version: u64,
}

impl StockTakeRegistry {
    /// Well-known stream id of the registry.
    pub fn stream_id() -> AggregateId {
        AggregateId::from_uuid(Uuid::nil())
    }

    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            sessions: Vec::new(),
            active: None,
            version: 0,
        }
    }

    pub fn active(&self) -> Option<&StockTakeSession> {
        self.active.and_then(|idx| self.sessions.get(idx))
    }

    pub fn session(&self, id: StockTakeSessionId) -> Option<&StockTakeSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Sessions in start order.
    pub fn sessions(&self) -> &[StockTakeSession] {
        &self.sessions
    }
}

impl AggregateRoot for StockTakeRegistry {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: StartSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSession {
    pub session_id: StockTakeSessionId,
    pub started_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinishSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishSession {
    pub session_id: StockTakeSessionId,
    pub finished_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockTakeRegistryCommand {
    StartSession(StartSession),
    FinishSession(FinishSession),
}

/// Event: SessionStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: StockTakeSessionId,
    pub started_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SessionFinished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFinished {
    pub session_id: StockTakeSessionId,
    pub finished_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockTakeRegistryEvent {
    SessionStarted(SessionStarted),
    SessionFinished(SessionFinished),
}

impl Event for StockTakeRegistryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockTakeRegistryEvent::SessionStarted(_) => "stocktake.session.started",
            StockTakeRegistryEvent::SessionFinished(_) => "stocktake.session.finished",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockTakeRegistryEvent::SessionStarted(e) => e.occurred_at,
            StockTakeRegistryEvent::SessionFinished(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockTakeRegistry {
    type Command = StockTakeRegistryCommand;
    type Event = StockTakeRegistryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockTakeRegistryEvent::SessionStarted(e) => {
                self.sessions.push(StockTakeSession {
                    id: e.session_id,
                    status: StockTakeSessionStatus::InProgress,
                    start_time: e.occurred_at,
                    end_time: None,
                    started_by: e.started_by,
                    finished_by: None,
                });
                self.active = Some(self.sessions.len() - 1);
            }
            StockTakeRegistryEvent::SessionFinished(e) => {
                if let Some(session) = self.sessions.iter_mut().find(|s| s.id == e.session_id) {
                    session.status = StockTakeSessionStatus::Completed;
                    session.end_time = Some(e.occurred_at);
                    session.finished_by = Some(e.finished_by);
                }
                self.active = None;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockTakeRegistryCommand::StartSession(cmd) => {
                if let Some(active) = self.active() {
                    return Err(DomainError::conflict(format!(
                        "stock-take session {} is already in progress",
                        active.id
                    )));
                }
                if self.session(cmd.session_id).is_some() {
                    return Err(DomainError::conflict("session id already used"));
                }
                Ok(vec![StockTakeRegistryEvent::SessionStarted(SessionStarted {
                    session_id: cmd.session_id,
                    started_by: cmd.started_by,
                    occurred_at: cmd.occurred_at,
                })])
            }
            StockTakeRegistryCommand::FinishSession(cmd) => {
                let Some(session) = self.session(cmd.session_id) else {
                    return Err(DomainError::not_found(format!(
                        "stock-take session {}",
                        cmd.session_id
                    )));
                };
                if !session.is_in_progress() {
                    return Err(DomainError::invariant("stock-take session already completed"));
                }
                Ok(vec![StockTakeRegistryEvent::SessionFinished(SessionFinished {
                    session_id: cmd.session_id,
                    finished_by: cmd.finished_by,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn start(registry: &mut StockTakeRegistry) -> Result<StockTakeSessionId, DomainError> {
        let session_id = StockTakeSessionId::new(AggregateId::new());
        let events = registry.handle(&StockTakeRegistryCommand::StartSession(StartSession {
            session_id,
            started_by: EmployeeId::new(),
            occurred_at: test_time(),
        }))?;
        for e in &events {
            registry.apply(e);
        }
        Ok(session_id)
    }

    fn finish(registry: &mut StockTakeRegistry, session_id: StockTakeSessionId) -> Result<(), DomainError> {
        let events = registry.handle(&StockTakeRegistryCommand::FinishSession(FinishSession {
            session_id,
            finished_by: EmployeeId::new(),
            occurred_at: test_time(),
        }))?;
        for e in &events {
            registry.apply(e);
        }
        Ok(())
    }

    #[test]
    fn only_one_session_in_progress() {
        let mut registry = StockTakeRegistry::empty(StockTakeRegistry::stream_id());
        let first = start(&mut registry).unwrap();

        let err = start(&mut registry).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(registry.active().map(|s| s.id), Some(first));

        finish(&mut registry, first).unwrap();
        assert!(registry.active().is_none());
        assert!(start(&mut registry).is_ok());
        assert_eq!(registry.sessions().len(), 2);
    }

    #[test]
    fn completed_is_terminal() {
        let mut registry = StockTakeRegistry::empty(StockTakeRegistry::stream_id());
        let id = start(&mut registry).unwrap();
        finish(&mut registry, id).unwrap();

        let session = registry.session(id).unwrap();
        assert_eq!(session.status, StockTakeSessionStatus::Completed);
        assert!(session.end_time.is_some());
        assert!(matches!(
            finish(&mut registry, id),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn unknown_session_cannot_finish() {
        let registry = StockTakeRegistry::empty(StockTakeRegistry::stream_id());
        let err = registry
            .handle(&StockTakeRegistryCommand::FinishSession(FinishSession {
                session_id: StockTakeSessionId::new(AggregateId::new()),
                finished_by: EmployeeId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
