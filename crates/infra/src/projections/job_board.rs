use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

use shopfloor_core::{AggregateId, AggregateRoot, DepartmentId, PartId};
use shopfloor_events::EventEnvelope;
use shopfloor_jobs::{Assignee, JobCard, JobCardEvent, JobCardId, JobStatus, QueueKey};

use super::{Projection, ProjectionError, gate};
use crate::aggregate_types;
use crate::read_model::KeyedStore;

/// One row of the job board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub job_id: JobCardId,
    pub job_number: String,
    pub part_id: PartId,
    pub department_id: DepartmentId,
    pub assignee: Assignee,
    pub status: JobStatus,
    pub priority: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub parent_job_id: Option<JobCardId>,
    pub stage: Option<u32>,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
}

impl JobSummary {
    /// Summary of a created job card; `None` for an empty aggregate.
    pub fn of(job: &JobCard) -> Option<Self> {
        Some(Self {
            job_id: job.id_typed(),
            job_number: job.job_number().to_string(),
            part_id: job.part_id()?,
            department_id: job.department_id()?,
            assignee: job.assignee(),
            status: job.status(),
            priority: job.priority(),
            created_at: job.created_at()?,
            parent_job_id: job.parent_job_id(),
            stage: job.stage(),
            material_cost: job.material_cost(),
            labor_cost: job.labor_cost(),
        })
    }

    pub fn queue_key(&self) -> QueueKey {
        QueueKey {
            priority: self.priority,
            created_at: self.created_at,
            job_id: self.job_id,
        }
    }

    pub fn total_cost(&self) -> Decimal {
        self.material_cost + self.labor_cost
    }
}

#[derive(Debug, Default)]
struct BoardState {
    cursors: HashMap<AggregateId, u64>,
    by_number: HashMap<String, JobCardId>,
}

/// Job board: job cards by id, business number, status, department and parent.
#[derive(Debug)]
pub struct JobBoardProjection<S>
where
    S: KeyedStore<JobCardId, JobSummary>,
{
    store: S,
    state: RwLock<BoardState>,
}

impl<S> JobBoardProjection<S>
where
    S: KeyedStore<JobCardId, JobSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: RwLock::new(BoardState::default()),
        }
    }

    pub fn get(&self, job_id: &JobCardId) -> Option<JobSummary> {
        self.store.get(job_id)
    }

    pub fn by_number(&self, job_number: &str) -> Option<JobSummary> {
        let job_id = {
            let state = self.state.read().ok()?;
            *state.by_number.get(job_number)?
        };
        self.store.get(&job_id)
    }

    /// All jobs in queue order.
    pub fn list(&self) -> Vec<JobSummary> {
        let mut jobs = self.store.list();
        jobs.sort_by_key(JobSummary::queue_key);
        jobs
    }

    pub fn by_status(&self, status: JobStatus) -> Vec<JobSummary> {
        self.list().into_iter().filter(|j| j.status == status).collect()
    }

    pub fn by_department(&self, department_id: DepartmentId) -> Vec<JobSummary> {
        self.list()
            .into_iter()
            .filter(|j| j.department_id == department_id)
            .collect()
    }

    /// Children of a routed job, by stage.
    pub fn children_of(&self, parent: JobCardId) -> Vec<JobSummary> {
        let mut children: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|j| j.parent_job_id == Some(parent))
            .collect();
        children.sort_by_key(|j| (j.stage, j.created_at));
        children
    }

    /// Record post-command state, ignored unless newer than what is held.
    pub fn observe(&self, job: &JobCard) -> Result<(), ProjectionError> {
        let Some(summary) = JobSummary::of(job) else {
            return Ok(());
        };
        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        let last = state.cursors.get(&summary.job_id.0).copied().unwrap_or(0);
        if job.version() <= last {
            return Ok(());
        }
        state.by_number.insert(summary.job_number.clone(), summary.job_id);
        state.cursors.insert(summary.job_id.0, job.version());
        self.store.upsert(summary.job_id, summary);
        Ok(())
    }

    fn existing(&self, job_id: &JobCardId) -> Result<JobSummary, ProjectionError> {
        self.store.get(job_id).ok_or_else(|| {
            ProjectionError::StreamMismatch(format!("job {job_id} changed before it was created"))
        })
    }
}

impl<S> Projection for JobBoardProjection<S>
where
    S: KeyedStore<JobCardId, JobSummary>,
{
    fn aggregate_type(&self) -> &'static str {
        aggregate_types::JOB_CARD
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::JOB_CARD {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        if !gate(&state.cursors, aggregate_id, seq)? {
            return Ok(());
        }

        let event: JobCardEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        let job_id = JobCardId::new(aggregate_id);

        let summary = match event {
            JobCardEvent::JobCreated(e) => {
                if e.job_id != job_id {
                    return Err(ProjectionError::StreamMismatch(
                        "event job_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                state.by_number.insert(e.job_number.clone(), e.job_id);
                JobSummary {
                    job_id: e.job_id,
                    job_number: e.job_number,
                    part_id: e.part_id,
                    department_id: e.department_id,
                    assignee: e.assignee,
                    status: JobStatus::Pending,
                    priority: e.priority,
                    created_at: e.occurred_at,
                    parent_job_id: e.parent_job_id,
                    stage: e.stage,
                    material_cost: e.consumables.iter().map(|c| c.cost).sum(),
                    labor_cost: Decimal::ZERO,
                }
            }
            other => {
                let mut summary = self.existing(&job_id)?;
                match other {
                    JobCardEvent::JobCreated(_) | JobCardEvent::MaterialsIssued(_) => {}
                    JobCardEvent::JobStarted(_) | JobCardEvent::JobResumed(_) => {
                        summary.status = JobStatus::InProgress;
                    }
                    JobCardEvent::JobPaused(_) => summary.status = JobStatus::Paused,
                    JobCardEvent::JobCompleted(e) => {
                        summary.status = JobStatus::AwaitingQc;
                        summary.labor_cost = e.labor_cost;
                    }
                    JobCardEvent::QcPassed(_) => summary.status = JobStatus::Complete,
                    JobCardEvent::JobHalted(_) => summary.status = JobStatus::HaltedIssue,
                    JobCardEvent::JobReassigned(e) => {
                        summary.status = JobStatus::Pending;
                        summary.assignee = Assignee::Employee(e.new_employee);
                    }
                    JobCardEvent::JobAdjusted(e) => {
                        summary.material_cost = e.material_cost;
                        summary.labor_cost = e.labor_cost;
                    }
                    JobCardEvent::PrioritySet(e) => summary.priority = e.priority,
                }
                summary
            }
        };

        self.store.upsert(job_id, summary);
        state.cursors.insert(aggregate_id, seq);
        Ok(())
    }

    fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            state.cursors.clear();
            state.by_number.clear();
        }
        self.store.clear();
    }
}
