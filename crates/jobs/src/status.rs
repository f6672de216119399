//! Job status and the one legal transition table.

use serde::{Deserialize, Serialize};

/// Job card status. `Complete` is terminal; `HaltedIssue` is recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Paused")]
    Paused,
    #[serde(rename = "Awaiting QC")]
    AwaitingQc,
    #[serde(rename = "Complete")]
    Complete,
    #[serde(rename = "Halted-Issue")]
    HaltedIssue,
}

/// Operations that move a job between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Start,
    Pause,
    Resume,
    Complete,
    PassQc,
    Halt,
    Relaunch,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Paused,
        JobStatus::AwaitingQc,
        JobStatus::Complete,
        JobStatus::HaltedIssue,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete)
    }

    /// Status after `transition`, or `None` if the table forbids it.
    pub fn after(self, transition: Transition) -> Option<JobStatus> {
        use JobStatus::*;
        match (self, transition) {
            (Pending, Transition::Start) => Some(InProgress),
            (InProgress, Transition::Pause) => Some(Paused),
            (Paused, Transition::Resume) => Some(InProgress),
            (InProgress, Transition::Complete) => Some(AwaitingQc),
            (AwaitingQc, Transition::PassQc) => Some(Complete),
            (HaltedIssue, Transition::Relaunch) => Some(Pending),
            (s, Transition::Halt) if !s.is_terminal() => Some(HaltedIssue),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::InProgress => "In Progress",
            JobStatus::Paused => "Paused",
            JobStatus::AwaitingQc => "Awaiting QC",
            JobStatus::Complete => "Complete",
            JobStatus::HaltedIssue => "Halted-Issue",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
