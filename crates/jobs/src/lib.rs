//! Job cards (event-sourced).
//!
//! A job card is the dispatchable unit of work: one department pass for one
//! production unit. It carries a frozen material snapshot and moves through a
//! strict status table. Multi-stage routing, queue ordering and the printable
//! job sheet live next to it. Pure domain logic (no IO, no storage).

pub mod job;
pub mod numbering;
pub mod routing;
pub mod scheduler;
pub mod sheet;
pub mod status;

pub use job::{
    AdjustJob, Assignee, CompleteJob, ConsumableDelta, CreateJob, HaltJob, IssueEntry,
    IssuedMaterial, JobAdjusted, JobAdjustment, JobCard, JobCardCommand, JobCardEvent,
    JobCardId, JobCompleted, JobCreated, JobHalted, JobPaused, JobReassigned, JobResumed,
    JobStarted, MaterialsIssued, PassQc, PauseJob, PrioritySet, QcPassed, ReassignAndRelaunch,
    MAX_ADJUST_MINUTES, ResumeJob, SetPriority, StartJob,
};
pub use numbering::{
    JobNumberCommand, JobNumberEvent, JobNumberReserved, JobNumberSequence, ReserveJobNumber,
    format_job_number,
};
pub use routing::{InMemorySkillRoster, PlannedStage, RoutingStep, SkillRoster, plan_routing};
pub use scheduler::{QueueKey, reprioritize};
pub use sheet::JobSheet;
pub use status::{JobStatus, Transition};
