use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopfloor_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use shopfloor_events::Event;

/// Aggregate root: the per-day job number sequence.
///
/// One well-known stream (see [`JobNumberSequence::stream_id`]) holds every
/// reservation. A reservation is a versioned append, so two writers racing
/// for the same day cannot both get the same number: the loser re-reads and
/// takes the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNumberSequence {
    id: AggregateId,
    last_by_day: BTreeMap<NaiveDate, u32>,
    version: u64,
}

impl JobNumberSequence {
    /// Well-known stream id of the sequence.
    pub fn stream_id() -> AggregateId {
        AggregateId::from_uuid(Uuid::from_u128(1))
    }

    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            last_by_day: BTreeMap::new(),
            version: 0,
        }
    }

    /// Last sequence handed out for `day`, zero if none yet.
    pub fn last_for(&self, day: NaiveDate) -> u32 {
        self.last_by_day.get(&day).copied().unwrap_or(0)
    }
}

/// `JC-<yyyymmdd>-<seq>`, the sequence zero-padded to four digits.
pub fn format_job_number(day: NaiveDate, sequence: u32) -> String {
    format!("JC-{}-{sequence:04}", day.format("%Y%m%d"))
}

impl AggregateRoot for JobNumberSequence {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReserveJobNumber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveJobNumber {
    pub day: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobNumberCommand {
    ReserveJobNumber(ReserveJobNumber),
}

/// Event: JobNumberReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNumberReserved {
    pub day: NaiveDate,
    pub sequence: u32,
    pub job_number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobNumberEvent {
    JobNumberReserved(JobNumberReserved),
}

impl JobNumberEvent {
    pub fn job_number(&self) -> &str {
        match self {
            JobNumberEvent::JobNumberReserved(e) => &e.job_number,
        }
    }
}

impl Event for JobNumberEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JobNumberEvent::JobNumberReserved(_) => "jobs.number.reserved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JobNumberEvent::JobNumberReserved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for JobNumberSequence {
    type Command = JobNumberCommand;
    type Event = JobNumberEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JobNumberEvent::JobNumberReserved(e) => {
                let last = self.last_by_day.entry(e.day).or_insert(0);
                *last = (*last).max(e.sequence);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JobNumberCommand::ReserveJobNumber(cmd) => {
                let sequence = self.last_for(cmd.day).checked_add(1).ok_or_else(|| {
                    DomainError::invariant(format!("job number sequence for {} is exhausted", cmd.day))
                })?;
                Ok(vec![JobNumberEvent::JobNumberReserved(JobNumberReserved {
                    day: cmd.day,
                    sequence,
                    job_number: format_job_number(cmd.day, sequence),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
