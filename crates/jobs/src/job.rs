use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use shopfloor_core::{
    Aggregate, AggregateId, AggregateRoot, DepartmentId, DomainError, EmployeeId, PartId,
    ValueObject,
};
use shopfloor_events::Event;
use shopfloor_inventory::InventoryItemId;
use shopfloor_recipes::ResolvedConsumable;

use crate::status::{JobStatus, Transition};

const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_MINUTE: i64 = 60_000;

/// Largest time correction, either sign, one adjustment may carry: one week.
pub const MAX_ADJUST_MINUTES: i64 = 7 * 24 * 60;

/// Job card identifier (stream id). The human-facing business number is
/// `JobCard::job_number`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobCardId(pub AggregateId);

impl JobCardId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for JobCardId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Who the job is assigned to. `Unassigned` is the explicit sentinel used when
/// routing finds no qualified employee; such a job cannot be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "employee_id", rename_all = "snake_case")]
pub enum Assignee {
    Unassigned,
    Employee(EmployeeId),
}

impl Assignee {
    pub fn employee(&self) -> Option<EmployeeId> {
        match self {
            Assignee::Unassigned => None,
            Assignee::Employee(id) => Some(*id),
        }
    }
}

/// One entry of the append-only issue log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEntry {
    pub reason: String,
    pub raised_by: EmployeeId,
    pub status_before: JobStatus,
    pub at: DateTime<Utc>,
}

/// Signed correction to one material, priced at the time it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumableDelta {
    pub item_id: InventoryItemId,
    pub quantity_delta: Decimal,
    pub cost_delta: Decimal,
}

impl ValueObject for ConsumableDelta {}

/// Post-completion correction. The frozen snapshot is never rewritten; these
/// entries are layered on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAdjustment {
    pub time_delta_minutes: i64,
    pub consumable_deltas: Vec<ConsumableDelta>,
    pub reason: String,
    pub actor: EmployeeId,
    pub at: DateTime<Utc>,
}

/// Snapshot line handed to the ledger when materials are issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedMaterial {
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
}

/// Aggregate root: JobCard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCard {
    id: JobCardId,
    job_number: String,
    part_id: Option<PartId>,
    department_id: Option<DepartmentId>,
    assignee: Assignee,
    status: JobStatus,
    quantity: u32,
    priority: Option<u32>,
    estimated_time_minutes: u32,
    steps: Vec<String>,
    tools: Vec<String>,
    accessories: Vec<String>,
    required_skills: Vec<String>,
    processed_consumables: Vec<ResolvedConsumable>,
    ambient_temp_c: Decimal,
    parent_job_id: Option<JobCardId>,
    stage: Option<u32>,
    created_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    total_paused_ms: i64,
    worked_ms: i64,
    issue_log: Vec<IssueEntry>,
    adjustments: Vec<JobAdjustment>,
    materials_issued: bool,
    labor_rate_per_hour: Decimal,
    material_cost: Decimal,
    labor_cost: Decimal,
    version: u64,
    created: bool,
}

impl JobCard {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: JobCardId) -> Self {
        Self {
            id,
            job_number: String::new(),
            part_id: None,
            department_id: None,
            assignee: Assignee::Unassigned,
            status: JobStatus::Pending,
            quantity: 0,
            priority: None,
            estimated_time_minutes: 0,
            steps: Vec::new(),
            tools: Vec::new(),
            accessories: Vec::new(),
            required_skills: Vec::new(),
            processed_consumables: Vec::new(),
            ambient_temp_c: Decimal::ZERO,
            parent_job_id: None,
            stage: None,
            created_at: None,
            started_at: None,
            paused_at: None,
            completed_at: None,
            total_paused_ms: 0,
            worked_ms: 0,
            issue_log: Vec::new(),
            adjustments: Vec::new(),
            materials_issued: false,
            labor_rate_per_hour: Decimal::ZERO,
            material_cost: Decimal::ZERO,
            labor_cost: Decimal::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> JobCardId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn job_number(&self) -> &str {
        &self.job_number
    }

    pub fn part_id(&self) -> Option<PartId> {
        self.part_id
    }

    pub fn department_id(&self) -> Option<DepartmentId> {
        self.department_id
    }

    pub fn assignee(&self) -> Assignee {
        self.assignee
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn priority(&self) -> Option<u32> {
        self.priority
    }

    pub fn estimated_time_minutes(&self) -> u32 {
        self.estimated_time_minutes
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn accessories(&self) -> &[String] {
        &self.accessories
    }

    pub fn required_skills(&self) -> &[String] {
        &self.required_skills
    }

    /// The frozen material snapshot taken at creation.
    pub fn processed_consumables(&self) -> &[ResolvedConsumable] {
        &self.processed_consumables
    }

    pub fn ambient_temp_c(&self) -> Decimal {
        self.ambient_temp_c
    }

    pub fn parent_job_id(&self) -> Option<JobCardId> {
        self.parent_job_id
    }

    pub fn stage(&self) -> Option<u32> {
        self.stage
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn total_paused_ms(&self) -> i64 {
        self.total_paused_ms
    }

    pub fn issue_log(&self) -> &[IssueEntry] {
        &self.issue_log
    }

    pub fn adjustments(&self) -> &[JobAdjustment] {
        &self.adjustments
    }

    pub fn materials_issued(&self) -> bool {
        self.materials_issued
    }

    pub fn material_cost(&self) -> Decimal {
        self.material_cost
    }

    pub fn labor_cost(&self) -> Decimal {
        self.labor_cost
    }

    pub fn total_cost(&self) -> Decimal {
        self.material_cost + self.labor_cost
    }

    /// Working time up to `now`: wall-clock delta since the first start minus
    /// every closed or open pause interval.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let Some(started) = self.started_at else {
            return 0;
        };
        let end = match self.status {
            JobStatus::AwaitingQc | JobStatus::Complete => self.completed_at.unwrap_or(now),
            _ => now,
        };
        let open_pause = match (self.status, self.paused_at) {
            (JobStatus::AwaitingQc | JobStatus::Complete, _) => 0,
            (_, Some(p)) => millis_between(p, end),
            _ => 0,
        };
        (millis_between(started, end) - self.total_paused_ms - open_pause).max(0)
    }

    /// Snapshot quantity plus every recorded delta for one material.
    pub fn effective_quantity(&self, item_id: &InventoryItemId) -> Decimal {
        let base: Decimal = self
            .processed_consumables
            .iter()
            .filter(|c| &c.item_id == item_id)
            .map(|c| c.quantity)
            .sum();
        let deltas: Decimal = self
            .adjustments
            .iter()
            .flat_map(|a| a.consumable_deltas.iter())
            .filter(|d| &d.item_id == item_id)
            .map(|d| d.quantity_delta)
            .sum();
        base + deltas
    }

    fn snapshot_cost(&self) -> Decimal {
        self.processed_consumables.iter().map(|c| c.cost).sum()
    }

    fn adjusted_minutes(&self) -> Result<i64, DomainError> {
        self.adjustments
            .iter()
            .try_fold(0i64, |acc, a| acc.checked_add(a.time_delta_minutes))
            .ok_or_else(|| DomainError::validation("accumulated time adjustments overflow"))
    }

    fn labor_cost_for(&self, worked_ms: i64, rate: Decimal) -> Result<Decimal, DomainError> {
        let ms = self
            .adjusted_minutes()?
            .checked_mul(MS_PER_MINUTE)
            .and_then(|adjusted| worked_ms.checked_add(adjusted))
            .ok_or_else(|| DomainError::validation("adjusted working time overflows"))?
            .max(0);
        Decimal::from(ms)
            .checked_div(Decimal::from(MS_PER_HOUR))
            .and_then(|hours| hours.checked_mul(rate))
            .map(|cost| cost.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
            .ok_or_else(|| DomainError::validation("labor cost overflows"))
    }
}

fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().max(0)
}

impl AggregateRoot for JobCard {
    type Id = JobCardId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateJob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJob {
    pub job_id: JobCardId,
    pub job_number: String,
    pub part_id: PartId,
    pub department_id: DepartmentId,
    pub assignee: Assignee,
    pub quantity: u32,
    pub priority: Option<u32>,
    pub estimated_time_minutes: u32,
    pub steps: Vec<String>,
    pub tools: Vec<String>,
    pub accessories: Vec<String>,
    pub required_skills: Vec<String>,
    pub consumables: Vec<ResolvedConsumable>,
    pub ambient_temp_c: Decimal,
    pub parent_job_id: Option<JobCardId>,
    pub stage: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartJob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartJob {
    pub job_id: JobCardId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PauseJob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseJob {
    pub job_id: JobCardId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResumeJob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeJob {
    pub job_id: JobCardId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteJob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteJob {
    pub job_id: JobCardId,
    pub labor_rate_per_hour: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PassQc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassQc {
    pub job_id: JobCardId,
    pub inspector: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: HaltJob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltJob {
    pub job_id: JobCardId,
    pub reason: String,
    pub raised_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReassignAndRelaunch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignAndRelaunch {
    pub job_id: JobCardId,
    pub new_employee: EmployeeId,
    pub actor: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustJob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustJob {
    pub job_id: JobCardId,
    pub time_delta_minutes: i64,
    pub consumable_deltas: Vec<ConsumableDelta>,
    pub reason: String,
    pub actor: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetPriority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPriority {
    pub job_id: JobCardId,
    pub priority: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobCardCommand {
    CreateJob(CreateJob),
    StartJob(StartJob),
    PauseJob(PauseJob),
    ResumeJob(ResumeJob),
    CompleteJob(CompleteJob),
    PassQc(PassQc),
    HaltJob(HaltJob),
    ReassignAndRelaunch(ReassignAndRelaunch),
    AdjustJob(AdjustJob),
    SetPriority(SetPriority),
}

/// Event: JobCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: JobCardId,
    pub job_number: String,
    pub part_id: PartId,
    pub department_id: DepartmentId,
    pub assignee: Assignee,
    pub quantity: u32,
    pub priority: Option<u32>,
    pub estimated_time_minutes: u32,
    pub steps: Vec<String>,
    pub tools: Vec<String>,
    pub accessories: Vec<String>,
    pub required_skills: Vec<String>,
    pub consumables: Vec<ResolvedConsumable>,
    pub ambient_temp_c: Decimal,
    pub parent_job_id: Option<JobCardId>,
    pub stage: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobStarted. `closed_pause_ms` is the halt interval closed by this
/// start (zero on a first start).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStarted {
    pub job_id: JobCardId,
    pub employee_id: EmployeeId,
    pub closed_pause_ms: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobPaused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPaused {
    pub job_id: JobCardId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobResumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResumed {
    pub job_id: JobCardId,
    pub paused_ms: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompleted {
    pub job_id: JobCardId,
    pub worked_ms: i64,
    pub labor_rate_per_hour: Decimal,
    pub labor_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialsIssued. Emitted once per job, with the first completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialsIssued {
    pub job_id: JobCardId,
    pub job_number: String,
    pub issued_by: EmployeeId,
    pub lines: Vec<IssuedMaterial>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QcPassed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcPassed {
    pub job_id: JobCardId,
    pub inspector: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobHalted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHalted {
    pub job_id: JobCardId,
    pub issue: IssueEntry,
}

/// Event: JobReassigned (back to Pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReassigned {
    pub job_id: JobCardId,
    pub previous: Assignee,
    pub new_employee: EmployeeId,
    pub actor: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAdjusted {
    pub job_id: JobCardId,
    pub job_number: String,
    pub adjustment: JobAdjustment,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
}

/// Event: PrioritySet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritySet {
    pub job_id: JobCardId,
    pub priority: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobCardEvent {
    JobCreated(JobCreated),
    JobStarted(JobStarted),
    JobPaused(JobPaused),
    JobResumed(JobResumed),
    JobCompleted(JobCompleted),
    MaterialsIssued(MaterialsIssued),
    QcPassed(QcPassed),
    JobHalted(JobHalted),
    JobReassigned(JobReassigned),
    JobAdjusted(JobAdjusted),
    PrioritySet(PrioritySet),
}

impl Event for JobCardEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JobCardEvent::JobCreated(_) => "jobs.card.created",
            JobCardEvent::JobStarted(_) => "jobs.card.started",
            JobCardEvent::JobPaused(_) => "jobs.card.paused",
            JobCardEvent::JobResumed(_) => "jobs.card.resumed",
            JobCardEvent::JobCompleted(_) => "jobs.card.completed",
            JobCardEvent::MaterialsIssued(_) => "jobs.card.materials_issued",
            JobCardEvent::QcPassed(_) => "jobs.card.qc_passed",
            JobCardEvent::JobHalted(_) => "jobs.card.halted",
            JobCardEvent::JobReassigned(_) => "jobs.card.reassigned",
            JobCardEvent::JobAdjusted(_) => "jobs.card.adjusted",
            JobCardEvent::PrioritySet(_) => "jobs.card.priority_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JobCardEvent::JobCreated(e) => e.occurred_at,
            JobCardEvent::JobStarted(e) => e.occurred_at,
            JobCardEvent::JobPaused(e) => e.occurred_at,
            JobCardEvent::JobResumed(e) => e.occurred_at,
            JobCardEvent::JobCompleted(e) => e.occurred_at,
            JobCardEvent::MaterialsIssued(e) => e.occurred_at,
            JobCardEvent::QcPassed(e) => e.occurred_at,
            JobCardEvent::JobHalted(e) => e.issue.at,
            JobCardEvent::JobReassigned(e) => e.occurred_at,
            JobCardEvent::JobAdjusted(e) => e.adjustment.at,
            JobCardEvent::PrioritySet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for JobCard {
    type Command = JobCardCommand;
    type Event = JobCardEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JobCardEvent::JobCreated(e) => {
                self.id = e.job_id;
                self.job_number = e.job_number.clone();
                self.part_id = Some(e.part_id);
                self.department_id = Some(e.department_id);
                self.assignee = e.assignee;
                self.status = JobStatus::Pending;
                self.quantity = e.quantity;
                self.priority = e.priority;
                self.estimated_time_minutes = e.estimated_time_minutes;
                self.steps = e.steps.clone();
                self.tools = e.tools.clone();
                self.accessories = e.accessories.clone();
                self.required_skills = e.required_skills.clone();
                self.processed_consumables = e.consumables.clone();
                self.ambient_temp_c = e.ambient_temp_c;
                self.parent_job_id = e.parent_job_id;
                self.stage = e.stage;
                self.created_at = Some(e.occurred_at);
                self.material_cost = self.snapshot_cost();
                self.created = true;
            }
            JobCardEvent::JobStarted(e) => {
                self.status = JobStatus::InProgress;
                if self.started_at.is_none() {
                    self.started_at = Some(e.occurred_at);
                }
                self.total_paused_ms += e.closed_pause_ms;
                self.paused_at = None;
            }
            JobCardEvent::JobPaused(e) => {
                self.status = JobStatus::Paused;
                self.paused_at = Some(e.occurred_at);
            }
            JobCardEvent::JobResumed(e) => {
                self.status = JobStatus::InProgress;
                self.total_paused_ms += e.paused_ms;
                self.paused_at = None;
            }
            JobCardEvent::JobCompleted(e) => {
                self.status = JobStatus::AwaitingQc;
                self.completed_at = Some(e.occurred_at);
                self.worked_ms = e.worked_ms;
                self.labor_rate_per_hour = e.labor_rate_per_hour;
                self.labor_cost = e.labor_cost;
            }
            JobCardEvent::MaterialsIssued(_) => {
                self.materials_issued = true;
            }
            JobCardEvent::QcPassed(_) => {
                self.status = JobStatus::Complete;
            }
            JobCardEvent::JobHalted(e) => {
                // Time spent halted is not working time: open a pause interval
                // that the next start closes.
                self.paused_at = match e.issue.status_before {
                    JobStatus::InProgress => Some(e.issue.at),
                    JobStatus::AwaitingQc => self.completed_at,
                    _ => self.paused_at,
                };
                self.status = JobStatus::HaltedIssue;
                self.issue_log.push(e.issue.clone());
            }
            JobCardEvent::JobReassigned(e) => {
                self.assignee = Assignee::Employee(e.new_employee);
                self.status = JobStatus::Pending;
            }
            JobCardEvent::JobAdjusted(e) => {
                self.adjustments.push(e.adjustment.clone());
                self.material_cost = e.material_cost;
                self.labor_cost = e.labor_cost;
            }
            JobCardEvent::PrioritySet(e) => {
                self.priority = e.priority;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JobCardCommand::CreateJob(cmd) => self.handle_create(cmd),
            JobCardCommand::StartJob(cmd) => self.handle_start(cmd),
            JobCardCommand::PauseJob(cmd) => self.handle_pause(cmd),
            JobCardCommand::ResumeJob(cmd) => self.handle_resume(cmd),
            JobCardCommand::CompleteJob(cmd) => self.handle_complete(cmd),
            JobCardCommand::PassQc(cmd) => self.handle_pass_qc(cmd),
            JobCardCommand::HaltJob(cmd) => self.handle_halt(cmd),
            JobCardCommand::ReassignAndRelaunch(cmd) => self.handle_relaunch(cmd),
            JobCardCommand::AdjustJob(cmd) => self.handle_adjust(cmd),
            JobCardCommand::SetPriority(cmd) => self.handle_set_priority(cmd),
        }
    }
}

impl JobCard {
    fn ensure_job_id(&self, job_id: JobCardId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("job card {job_id}")));
        }
        if self.id != job_id {
            return Err(DomainError::invariant("job_id mismatch"));
        }
        Ok(())
    }

    fn transition(&self, transition: Transition, op: &str) -> Result<JobStatus, DomainError> {
        self.status.after(transition).ok_or_else(|| {
            DomainError::invariant(format!(
                "cannot {op} job {} while it is {}",
                self.job_number, self.status
            ))
        })
    }

    fn handle_create(&self, cmd: &CreateJob) -> Result<Vec<JobCardEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("job card already exists"));
        }
        if cmd.job_number.trim().is_empty() {
            return Err(DomainError::validation("job number cannot be empty"));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        Ok(vec![JobCardEvent::JobCreated(JobCreated {
            job_id: cmd.job_id,
            job_number: cmd.job_number.clone(),
            part_id: cmd.part_id,
            department_id: cmd.department_id,
            assignee: cmd.assignee,
            quantity: cmd.quantity,
            priority: cmd.priority,
            estimated_time_minutes: cmd.estimated_time_minutes,
            steps: cmd.steps.clone(),
            tools: cmd.tools.clone(),
            accessories: cmd.accessories.clone(),
            required_skills: cmd.required_skills.clone(),
            consumables: cmd.consumables.clone(),
            ambient_temp_c: cmd.ambient_temp_c,
            parent_job_id: cmd.parent_job_id,
            stage: cmd.stage,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start(&self, cmd: &StartJob) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        self.transition(Transition::Start, "start")?;

        let employee_id = self.assignee.employee().ok_or_else(|| {
            DomainError::invariant(format!(
                "job {} has no assigned employee and cannot be started",
                self.job_number
            ))
        })?;

        let closed_pause_ms = match (self.started_at, self.paused_at) {
            (Some(_), Some(p)) => millis_between(p, cmd.occurred_at),
            _ => 0,
        };

        Ok(vec![JobCardEvent::JobStarted(JobStarted {
            job_id: cmd.job_id,
            employee_id,
            closed_pause_ms,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pause(&self, cmd: &PauseJob) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        self.transition(Transition::Pause, "pause")?;

        Ok(vec![JobCardEvent::JobPaused(JobPaused {
            job_id: cmd.job_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_resume(&self, cmd: &ResumeJob) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        self.transition(Transition::Resume, "resume")?;

        let paused_ms = self
            .paused_at
            .map(|p| millis_between(p, cmd.occurred_at))
            .unwrap_or(0);

        Ok(vec![JobCardEvent::JobResumed(JobResumed {
            job_id: cmd.job_id,
            paused_ms,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteJob) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        self.transition(Transition::Complete, "complete")?;

        if cmd.labor_rate_per_hour < Decimal::ZERO {
            return Err(DomainError::validation("labor rate cannot be negative"));
        }

        let worked_ms = self.elapsed_ms(cmd.occurred_at);
        let mut events = vec![JobCardEvent::JobCompleted(JobCompleted {
            job_id: cmd.job_id,
            worked_ms,
            labor_rate_per_hour: cmd.labor_rate_per_hour,
            labor_cost: self.labor_cost_for(worked_ms, cmd.labor_rate_per_hour)?,
            occurred_at: cmd.occurred_at,
        })];

        // Ledger deduction fires once per job, with its first completion.
        if !self.materials_issued {
            let issued_by = self.assignee.employee().ok_or_else(|| {
                DomainError::invariant("completed job has no assigned employee")
            })?;
            events.push(JobCardEvent::MaterialsIssued(MaterialsIssued {
                job_id: cmd.job_id,
                job_number: self.job_number.clone(),
                issued_by,
                lines: self
                    .processed_consumables
                    .iter()
                    .map(|c| IssuedMaterial {
                        item_id: c.item_id,
                        quantity: c.quantity,
                    })
                    .collect(),
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_pass_qc(&self, cmd: &PassQc) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        self.transition(Transition::PassQc, "pass QC for")?;

        Ok(vec![JobCardEvent::QcPassed(QcPassed {
            job_id: cmd.job_id,
            inspector: cmd.inspector,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_halt(&self, cmd: &HaltJob) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::invariant("halting a job requires a reason"));
        }
        self.transition(Transition::Halt, "halt")?;

        Ok(vec![JobCardEvent::JobHalted(JobHalted {
            job_id: cmd.job_id,
            issue: IssueEntry {
                reason: cmd.reason.trim().to_string(),
                raised_by: cmd.raised_by,
                status_before: self.status,
                at: cmd.occurred_at,
            },
        })])
    }

    fn handle_relaunch(&self, cmd: &ReassignAndRelaunch) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        self.transition(Transition::Relaunch, "relaunch")?;

        Ok(vec![JobCardEvent::JobReassigned(JobReassigned {
            job_id: cmd.job_id,
            previous: self.assignee,
            new_employee: cmd.new_employee,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustJob) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        if self.status != JobStatus::AwaitingQc {
            return Err(DomainError::invariant(format!(
                "job {} can only be adjusted while Awaiting QC (currently {})",
                self.job_number, self.status
            )));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::invariant("an adjustment requires a reason"));
        }
        if cmd.time_delta_minutes == 0 && cmd.consumable_deltas.is_empty() {
            return Err(DomainError::validation("adjustment carries no deltas"));
        }
        if cmd.time_delta_minutes.checked_abs().is_none_or(|m| m > MAX_ADJUST_MINUTES) {
            return Err(DomainError::validation(format!(
                "time adjustment of {} minutes is outside ±{MAX_ADJUST_MINUTES}",
                cmd.time_delta_minutes
            )));
        }
        if cmd.consumable_deltas.iter().any(|d| d.quantity_delta.is_zero()) {
            return Err(DomainError::validation("consumable deltas cannot be zero"));
        }

        let adjustment = JobAdjustment {
            time_delta_minutes: cmd.time_delta_minutes,
            consumable_deltas: cmd.consumable_deltas.clone(),
            reason: cmd.reason.trim().to_string(),
            actor: cmd.actor,
            at: cmd.occurred_at,
        };

        let mut projected = self.clone();
        projected.adjustments.push(adjustment.clone());
        let material_cost = projected.snapshot_cost()
            + projected
                .adjustments
                .iter()
                .flat_map(|a| a.consumable_deltas.iter())
                .map(|d| d.cost_delta)
                .sum::<Decimal>();
        let labor_cost = projected.labor_cost_for(self.worked_ms, self.labor_rate_per_hour)?;

        Ok(vec![JobCardEvent::JobAdjusted(JobAdjusted {
            job_id: cmd.job_id,
            job_number: self.job_number.clone(),
            adjustment,
            material_cost,
            labor_cost,
        })])
    }

    fn handle_set_priority(&self, cmd: &SetPriority) -> Result<Vec<JobCardEvent>, DomainError> {
        self.ensure_job_id(cmd.job_id)?;
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "job {} is complete; its priority is frozen",
                self.job_number
            )));
        }
        if self.priority == cmd.priority {
            return Ok(vec![]);
        }

        Ok(vec![JobCardEvent::PrioritySet(PrioritySet {
            job_id: cmd.job_id,
            priority: cmd.priority,
            occurred_at: cmd.occurred_at,
        })])
    }
}
