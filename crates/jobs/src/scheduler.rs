//! Work-queue ordering.
//!
//! Jobs with an explicit priority come first (1 is most urgent), then jobs
//! without one. Ties break on creation time, then id, so the order is total.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};

use shopfloor_core::{DomainError, DomainResult};

use crate::job::{JobCard, JobCardId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueKey {
    pub priority: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub job_id: JobCardId,
}

impl QueueKey {
    pub fn of(job: &JobCard) -> Self {
        Self {
            priority: job.priority(),
            created_at: job.created_at().unwrap_or(DateTime::<Utc>::MIN_UTC),
            job_id: job.id_typed(),
        }
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_priority = match (self.priority, other.priority) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_priority
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.job_id.cmp(&other.job_id))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dense priorities 1..=n following the supplied order.
pub fn reprioritize(ordered: &[JobCardId]) -> DomainResult<Vec<(JobCardId, u32)>> {
    let mut seen = HashSet::with_capacity(ordered.len());
    for id in ordered {
        if !seen.insert(*id) {
            return Err(DomainError::validation(format!(
                "job {id} listed more than once"
            )));
        }
    }

    ordered
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            u32::try_from(idx + 1)
                .map(|p| (*id, p))
                .map_err(|_| DomainError::validation("too many jobs to prioritize"))
        })
        .collect()
}
