use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::info;

use shopfloor_core::{AggregateId, DepartmentId, DomainError, EmployeeId, PartId};
use shopfloor_events::{EventBus, EventEnvelope};
use shopfloor_inventory::InventoryItemId;
use shopfloor_jobs::{
    AdjustJob, Assignee, CompleteJob, ConsumableDelta, CreateJob, HaltJob, JobCard, JobCardCommand,
    JobCardId, JobNumberCommand, JobNumberSequence, JobSheet, JobStatus, PassQc, PauseJob,
    ReassignAndRelaunch, ReserveJobNumber, ResumeJob, RoutingStep, SetPriority, SkillRoster, StartJob, plan_routing,
    reprioritize,
};
use shopfloor_recipes::{Recipe, RecipeKey, ResolvedBom, resolve};

use super::error::ServiceResult;
use super::stock_ledger::StockLedger;
use super::JobBoard;
use crate::aggregate_types;
use crate::command_dispatcher::{CommandDispatcher, Dispatched};
use crate::config::ShopfloorConfig;
use crate::event_store::EventStore;
use crate::projections::JobSummary;
use crate::recipe_store::RecipeStore;
use crate::saga::{MaterialPostingSaga, SagaRunner};

/// Input for a single-department job card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateJobRequest {
    pub part_id: PartId,
    pub department_id: DepartmentId,
    pub quantity: u32,
    pub priority: Option<u32>,
    /// Explicit assignee; otherwise the roster is asked for someone holding
    /// the recipe's required skills.
    pub assignee: Option<EmployeeId>,
    /// Shop temperature at creation; falls back to the configured default.
    pub ambient_temp_c: Option<Decimal>,
}

impl CreateJobRequest {
    pub fn new(part_id: PartId, department_id: DepartmentId) -> Self {
        Self {
            part_id,
            department_id,
            quantity: 1,
            priority: None,
            assignee: None,
            ambient_temp_c: None,
        }
    }

    pub fn assigned_to(mut self, employee_id: EmployeeId) -> Self {
        self.assignee = Some(employee_id);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn at_temperature(mut self, ambient_temp_c: Decimal) -> Self {
        self.ambient_temp_c = Some(ambient_temp_c);
        self
    }
}

struct NewJob {
    recipe: Recipe,
    bom: ResolvedBom,
    assignee: Assignee,
    quantity: u32,
    priority: Option<u32>,
    parent_job_id: Option<JobCardId>,
    stage: Option<u32>,
}

/// Job card creation, the status machine, routing and the work queue.
///
/// Job cards are always read back from their own stream before a decision;
/// the job board is only used for listings and number lookups.
///
/// Material movements are recorded on the job stream first. The matching
/// ledger postings are derived from those committed events and are keyed, so
/// a posting that failed after the job committed is applied by
/// [`recover_postings`](Self::recover_postings) without double counting.
pub struct JobLifecycleManager<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    ledger: StockLedger<S, B>,
    postings: SagaRunner<MaterialPostingSaga, StockLedger<S, B>>,
    job_board: Arc<JobBoard>,
    recipes: Arc<dyn RecipeStore>,
    roster: Arc<dyn SkillRoster + Send + Sync>,
    config: ShopfloorConfig,
}

impl<S, B> JobLifecycleManager<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        ledger: StockLedger<S, B>,
        job_board: Arc<JobBoard>,
        recipes: Arc<dyn RecipeStore>,
        roster: Arc<dyn SkillRoster + Send + Sync>,
        config: ShopfloorConfig,
    ) -> Self {
        Self {
            dispatcher,
            postings: SagaRunner::new(ledger.clone()),
            ledger,
            job_board,
            recipes,
            roster,
            config,
        }
    }

    pub fn config(&self) -> &ShopfloorConfig {
        &self.config
    }

    /// Resolve the recipe for (part, department) and open a Pending job card
    /// holding the frozen material snapshot.
    pub fn create(&self, request: CreateJobRequest, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let ambient = request
            .ambient_temp_c
            .unwrap_or(self.config.default_ambient_temp_c);
        let recipe = self.recipe(request.part_id, request.department_id)?;
        let bom = resolve(
            &recipe.consumables,
            self.ledger.catalog().as_ref(),
            ambient,
            &self.config.cure_policy,
        )?;
        let assignee = match request.assignee {
            Some(employee_id) => Assignee::Employee(employee_id),
            None => self
                .roster
                .find_qualified(request.department_id, &recipe.required_skills)
                .map(Assignee::Employee)
                .unwrap_or(Assignee::Unassigned),
        };

        self.open(
            NewJob {
                recipe,
                bom,
                assignee,
                quantity: request.quantity,
                priority: request.priority,
                parent_job_id: None,
                stage: None,
            },
            at,
        )
    }

    /// Spawn one child job card per routing step, in `order`. Every stage's
    /// recipe is resolved before any child is created, so an unknown recipe
    /// leaves the board untouched.
    pub fn route(
        &self,
        parent_id: JobCardId,
        steps: &[RoutingStep],
        ambient_temp_c: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> ServiceResult<Vec<JobCard>> {
        let parent = self.job(parent_id)?;
        if !self.job_board.children_of(parent_id).is_empty() {
            return Err(DomainError::conflict(format!(
                "job {} has already been routed",
                parent.job_number()
            ))
            .into());
        }
        let part_id = parent
            .part_id()
            .ok_or_else(|| DomainError::invariant("parent job has no part"))?;
        let ambient = ambient_temp_c.unwrap_or(parent.ambient_temp_c());

        let plan = plan_routing(steps, &*self.roster)?;
        let mut stages = Vec::with_capacity(plan.len());
        for stage in plan {
            let recipe = self.recipe(part_id, stage.step.department_id)?;
            let bom = resolve(
                &recipe.consumables,
                self.ledger.catalog().as_ref(),
                ambient,
                &self.config.cure_policy,
            )?;
            stages.push(NewJob {
                recipe,
                bom,
                assignee: stage.assignee,
                quantity: parent.quantity(),
                priority: parent.priority(),
                parent_job_id: Some(parent_id),
                stage: Some(stage.step.order),
            });
        }

        let children = stages
            .into_iter()
            .map(|stage| self.open(stage, at))
            .collect::<ServiceResult<Vec<_>>>()?;
        info!(
            parent = parent.job_number(),
            stages = children.len(),
            "job routed"
        );
        Ok(children)
    }

    pub fn start(&self, job_id: JobCardId, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let job = self.execute(job_id, JobCardCommand::StartJob(StartJob { job_id, occurred_at: at }))?.state;
        info!(job_number = job.job_number(), "job started");
        Ok(job)
    }

    pub fn pause(&self, job_id: JobCardId, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let job = self.execute(job_id, JobCardCommand::PauseJob(PauseJob { job_id, occurred_at: at }))?.state;
        info!(job_number = job.job_number(), "job paused");
        Ok(job)
    }

    pub fn resume(&self, job_id: JobCardId, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let job = self.execute(job_id, JobCardCommand::ResumeJob(ResumeJob { job_id, occurred_at: at }))?.state;
        info!(
            job_number = job.job_number(),
            total_paused_ms = job.total_paused_ms(),
            "job resumed"
        );
        Ok(job)
    }

    /// In Progress → Awaiting QC. The first completion of a job also issues
    /// its frozen materials, which are then posted to the ledger.
    pub fn complete(&self, job_id: JobCardId, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let dispatched = self.execute(
            job_id,
            JobCardCommand::CompleteJob(CompleteJob {
                job_id,
                labor_rate_per_hour: self.config.labor_rate_per_hour,
                occurred_at: at,
            }),
        )?;
        self.run_postings(&dispatched)?;

        let job = dispatched.state;
        info!(
            job_number = job.job_number(),
            labor_cost = %job.labor_cost(),
            material_cost = %job.material_cost(),
            "job completed"
        );
        Ok(job)
    }

    pub fn pass_qc(&self, job_id: JobCardId, inspector: EmployeeId, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let job = self
            .execute(
                job_id,
                JobCardCommand::PassQc(PassQc {
                    job_id,
                    inspector,
                    occurred_at: at,
                }),
            )?
            .state;
        info!(job_number = job.job_number(), inspector = %inspector, "job passed QC");
        Ok(job)
    }

    pub fn halt(
        &self,
        job_id: JobCardId,
        reason: &str,
        raised_by: EmployeeId,
        at: DateTime<Utc>,
    ) -> ServiceResult<JobCard> {
        let job = self
            .execute(
                job_id,
                JobCardCommand::HaltJob(HaltJob {
                    job_id,
                    reason: reason.to_string(),
                    raised_by,
                    occurred_at: at,
                }),
            )?
            .state;
        info!(job_number = job.job_number(), reason, "job halted");
        Ok(job)
    }

    /// Halted-Issue → Pending under a new employee. The material snapshot is
    /// left exactly as it was.
    pub fn reassign_and_relaunch(
        &self,
        job_id: JobCardId,
        new_employee: EmployeeId,
        actor: EmployeeId,
        at: DateTime<Utc>,
    ) -> ServiceResult<JobCard> {
        let job = self
            .execute(
                job_id,
                JobCardCommand::ReassignAndRelaunch(ReassignAndRelaunch {
                    job_id,
                    new_employee,
                    actor,
                    occurred_at: at,
                }),
            )?
            .state;
        info!(job_number = job.job_number(), employee = %new_employee, "job relaunched");
        Ok(job)
    }

    /// Record a post-completion correction. Each material delta is priced at
    /// the catalog's current price and, once the job commits, posted to the
    /// ledger.
    pub fn adjust(
        &self,
        job_id: JobCardId,
        time_delta_minutes: i64,
        consumable_deltas: &[(InventoryItemId, Decimal)],
        reason: &str,
        actor: EmployeeId,
        at: DateTime<Utc>,
    ) -> ServiceResult<JobCard> {
        let mut priced = Vec::with_capacity(consumable_deltas.len());
        for (item_id, quantity_delta) in consumable_deltas {
            let entry = self.ledger.item(item_id)?;
            priced.push(ConsumableDelta {
                item_id: *item_id,
                quantity_delta: *quantity_delta,
                cost_delta: *quantity_delta * entry.price,
            });
        }

        let materials = priced.len();
        let dispatched = self.execute(
            job_id,
            JobCardCommand::AdjustJob(AdjustJob {
                job_id,
                time_delta_minutes,
                consumable_deltas: priced,
                reason: reason.to_string(),
                actor,
                occurred_at: at,
            }),
        )?;
        self.run_postings(&dispatched)?;

        let job = dispatched.state;
        info!(
            job_number = job.job_number(),
            time_delta_minutes,
            materials,
            total_cost = %job.total_cost(),
            "job adjusted"
        );
        Ok(job)
    }

    pub fn set_priority(&self, job_id: JobCardId, priority: Option<u32>, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let dispatched = self.execute(
            job_id,
            JobCardCommand::SetPriority(SetPriority {
                job_id,
                priority,
                occurred_at: at,
            }),
        )?;
        if !dispatched.is_noop() {
            info!(job_number = dispatched.state.job_number(), ?priority, "job priority set");
        }
        Ok(dispatched.state)
    }

    /// Give the listed jobs priorities 1..=n in the order supplied. Each job
    /// is updated by its own command.
    pub fn reorder_queue(&self, ordered: &[JobCardId], at: DateTime<Utc>) -> ServiceResult<Vec<(JobCardId, u32)>> {
        let assignments = reprioritize(ordered)?;
        for (job_id, priority) in &assignments {
            self.set_priority(*job_id, Some(*priority), at)?;
        }
        Ok(assignments)
    }

    /// Authoritative job state, rebuilt from the job's stream.
    pub fn job(&self, job_id: JobCardId) -> ServiceResult<JobCard> {
        let job = self
            .dispatcher
            .load(job_id.0, |id| JobCard::empty(JobCardId::new(id)))?;
        if !job.is_created() {
            return Err(DomainError::not_found(format!("job card {job_id}")).into());
        }
        Ok(job)
    }

    pub fn by_number(&self, job_number: &str) -> ServiceResult<JobSummary> {
        self.job_board
            .by_number(job_number)
            .ok_or_else(|| DomainError::not_found(format!("job {job_number}")).into())
    }

    pub fn by_status(&self, status: JobStatus) -> Vec<JobSummary> {
        self.job_board.by_status(status)
    }

    pub fn by_department(&self, department_id: DepartmentId) -> Vec<JobSummary> {
        self.job_board.by_department(department_id)
    }

    /// Pending work in dispatch order.
    pub fn queue(&self) -> Vec<JobSummary> {
        self.job_board.by_status(JobStatus::Pending)
    }

    /// Children of a routed job, by stage.
    pub fn routing_sequence(&self, parent_id: JobCardId) -> Vec<JobSummary> {
        self.job_board.children_of(parent_id)
    }

    /// First stage of a routed job that is not yet complete.
    pub fn next_stage(&self, parent_id: JobCardId) -> Option<JobSummary> {
        self.routing_sequence(parent_id)
            .into_iter()
            .find(|stage| stage.status != JobStatus::Complete)
    }

    /// Replay every job stream and apply any ledger posting that never
    /// landed. Returns how many postings were applied; safe to run at any
    /// time, including at startup.
    pub fn recover_postings(&self) -> ServiceResult<usize> {
        self.postings.recover(self.dispatcher.store())
    }

    pub fn job_sheet(&self, job_id: JobCardId, now: DateTime<Utc>) -> ServiceResult<JobSheet> {
        Ok(self.job(job_id)?.job_sheet(now))
    }

    fn recipe(&self, part_id: PartId, department_id: DepartmentId) -> ServiceResult<Recipe> {
        let key = RecipeKey::new(part_id, department_id);
        self.recipes
            .get(&key)?
            .ok_or_else(|| DomainError::not_found(format!("recipe {key}")).into())
    }

    fn open(&self, new_job: NewJob, at: DateTime<Utc>) -> ServiceResult<JobCard> {
        let NewJob {
            recipe,
            bom,
            assignee,
            quantity,
            priority,
            parent_job_id,
            stage,
        } = new_job;
        let job_id = JobCardId::new(AggregateId::new());
        let job_number = self.next_job_number(at)?;

        let job = self
            .execute(
                job_id,
                JobCardCommand::CreateJob(CreateJob {
                    job_id,
                    job_number,
                    part_id: recipe.key.part_id,
                    department_id: recipe.key.department_id,
                    assignee,
                    quantity,
                    priority,
                    estimated_time_minutes: recipe.estimated_time_minutes,
                    steps: recipe.steps,
                    tools: recipe.tools,
                    accessories: recipe.accessories,
                    required_skills: recipe.required_skills,
                    consumables: bom.consumables,
                    ambient_temp_c: bom.ambient_temp_c,
                    parent_job_id,
                    stage,
                    occurred_at: at,
                }),
            )?
            .state;

        info!(
            job_id = %job_id,
            job_number = job.job_number(),
            assigned = job.assignee().employee().is_some(),
            material_cost = %job.material_cost(),
            stage = ?stage,
            "job card created"
        );
        Ok(job)
    }

    fn run_postings(&self, dispatched: &Dispatched<JobCard>) -> ServiceResult<()> {
        for stored in &dispatched.committed {
            self.postings.handle(&stored.to_envelope())?;
        }
        Ok(())
    }

    /// Reserve the next `JC-<yyyymmdd>-<seq>` on the shared sequence stream.
    /// Every manager on the same store draws from that stream, so numbers are
    /// unique across writers.
    fn next_job_number(&self, at: DateTime<Utc>) -> ServiceResult<String> {
        let dispatched = self.dispatcher.dispatch(
            JobNumberSequence::stream_id(),
            aggregate_types::JOB_NUMBER_SEQUENCE,
            JobNumberCommand::ReserveJobNumber(ReserveJobNumber {
                day: at.date_naive(),
                occurred_at: at,
            }),
            JobNumberSequence::empty,
        )?;
        dispatched
            .events
            .first()
            .map(|e| e.job_number().to_string())
            .ok_or_else(|| DomainError::invariant("job number reservation produced no event").into())
    }

    fn execute(&self, job_id: JobCardId, command: JobCardCommand) -> ServiceResult<Dispatched<JobCard>> {
        let dispatched = self.dispatcher.dispatch(
            job_id.0,
            aggregate_types::JOB_CARD,
            command,
            |id| JobCard::empty(JobCardId::new(id)),
        )?;
        self.job_board.observe(&dispatched.state)?;
        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use shopfloor_inventory::{AdjustmentCause, MaterialClass};
    use shopfloor_jobs::InMemorySkillRoster;
    use shopfloor_recipes::ConsumableRule;

    use crate::services::testing::{Harness, harness, harness_with_roster, register_cmd};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Fixture {
        h: Harness,
        part: PartId,
        dept: DepartmentId,
        resin: InventoryItemId,
    }

    fn fixture() -> Fixture {
        let h = harness();
        let part = PartId::new();
        let dept = DepartmentId::new();
        let resin = h
            .ledger
            .register_item(register_cmd("RES-POLY", dec!(40), MaterialClass::Standard))
            .unwrap()
            .item_id;

        let mut recipe = Recipe::new(RecipeKey::new(part, dept)).with_rule(ConsumableRule::Fixed {
            item_id: resin,
            quantity: dec!(3),
        });
        recipe.steps = vec!["wax mould".to_string(), "lay up".to_string()];
        recipe.estimated_time_minutes = 90;
        h.recipes.put(recipe).unwrap();

        Fixture { h, part, dept, resin }
    }

    fn create(f: &Fixture, employee: EmployeeId) -> JobCard {
        f.h.jobs
            .create(CreateJobRequest::new(f.part, f.dept).assigned_to(employee), t0())
            .unwrap()
    }

    #[test]
    fn job_numbers_are_sequential_per_day() {
        let f = fixture();
        let a = create(&f, EmployeeId::new());
        let b = create(&f, EmployeeId::new());
        assert_eq!(a.job_number(), "JC-20260302-0001");
        assert_eq!(b.job_number(), "JC-20260302-0002");

        let next_day = f
            .h
            .jobs
            .create(CreateJobRequest::new(f.part, f.dept), t0() + Duration::days(1))
            .unwrap();
        assert_eq!(next_day.job_number(), "JC-20260303-0001");
        assert_eq!(f.h.jobs.by_number("JC-20260302-0002").unwrap().job_id, b.id_typed());
    }

    #[test]
    fn unknown_recipe_is_not_found() {
        let f = fixture();
        let err = f
            .h
            .jobs
            .create(CreateJobRequest::new(f.part, DepartmentId::new()), t0())
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(f.h.job_board.list().is_empty());
    }

    #[test]
    fn unassigned_job_cannot_start() {
        let f = fixture();
        let job = f.h.jobs.create(CreateJobRequest::new(f.part, f.dept), t0()).unwrap();
        assert_eq!(job.assignee(), Assignee::Unassigned);

        let err = f.h.jobs.start(job.id_typed(), t0()).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(f.h.jobs.job(job.id_typed()).unwrap().status(), JobStatus::Pending);
    }

    #[test]
    fn roster_supplies_assignee_when_none_given() {
        let part = PartId::new();
        let dept = DepartmentId::new();
        let laminator = EmployeeId::new();
        let mut roster = InMemorySkillRoster::new();
        roster.register(laminator, dept, ["laminating"]);
        let h = harness_with_roster(roster);

        let mut recipe = Recipe::new(RecipeKey::new(part, dept));
        recipe.required_skills = vec!["laminating".to_string()];
        h.recipes.put(recipe).unwrap();

        let job = h.jobs.create(CreateJobRequest::new(part, dept), t0()).unwrap();
        assert_eq!(job.assignee(), Assignee::Employee(laminator));
    }

    #[test]
    fn completion_deducts_once_and_prices_labor() {
        let f = fixture();
        let worker = EmployeeId::new();
        let job = create(&f, worker);
        let id = job.id_typed();

        f.h.jobs.start(id, t0()).unwrap();
        f.h.jobs.pause(id, t0() + Duration::minutes(30)).unwrap();
        f.h.jobs.resume(id, t0() + Duration::minutes(60)).unwrap();
        let done = f.h.jobs.complete(id, t0() + Duration::minutes(90)).unwrap();

        // 60 worked minutes at the default 25/h.
        assert_eq!(done.status(), JobStatus::AwaitingQc);
        assert_eq!(done.labor_cost(), dec!(25.00));
        assert_eq!(f.h.ledger.item(&f.resin).unwrap().current_stock, dec!(37));

        // Halt from QC, relaunch, run again: no second deduction.
        let qa = EmployeeId::new();
        f.h.jobs.halt(id, "gelcoat blistering", qa, t0() + Duration::minutes(95)).unwrap();
        f.h.jobs
            .reassign_and_relaunch(id, worker, qa, t0() + Duration::minutes(100))
            .unwrap();
        f.h.jobs.start(id, t0() + Duration::minutes(110)).unwrap();
        f.h.jobs.complete(id, t0() + Duration::minutes(120)).unwrap();
        assert_eq!(f.h.ledger.item(&f.resin).unwrap().current_stock, dec!(37));

        let history = f.h.ledger.history(&f.resin).unwrap();
        assert_eq!(history.len(), 2);
        assert!(matches!(
            history[1].attribution.cause,
            AdjustmentCause::JobConsumption { job, .. } if job == id.0
        ));

        let closed = f.h.jobs.pass_qc(id, qa, t0() + Duration::minutes(130)).unwrap();
        assert_eq!(closed.status(), JobStatus::Complete);
        assert_eq!(f.h.jobs.by_status(JobStatus::Complete).len(), 1);
    }

    #[test]
    fn adjust_posts_deltas_and_keeps_snapshot() {
        let f = fixture();
        let job = create(&f, EmployeeId::new());
        let id = job.id_typed();
        f.h.jobs.start(id, t0()).unwrap();
        f.h.jobs.complete(id, t0() + Duration::minutes(60)).unwrap();

        let adjusted = f
            .h
            .jobs
            .adjust(id, 15, &[(f.resin, dec!(1))], "extra coat on transom", EmployeeId::new(), t0() + Duration::minutes(70))
            .unwrap();

        assert_eq!(adjusted.processed_consumables()[0].quantity, dec!(3));
        assert_eq!(adjusted.effective_quantity(&f.resin), dec!(4));
        assert_eq!(adjusted.material_cost(), dec!(10.00));
        // 75 minutes at 25/h.
        assert_eq!(adjusted.labor_cost(), dec!(31.25));
        assert_eq!(f.h.ledger.item(&f.resin).unwrap().current_stock, dec!(36));
    }

    #[test]
    fn adjust_outside_qc_posts_nothing() {
        let f = fixture();
        let job = create(&f, EmployeeId::new());
        let err = f
            .h
            .jobs
            .adjust(job.id_typed(), 0, &[(f.resin, dec!(1))], "too early", EmployeeId::new(), t0())
            .unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(f.h.ledger.item(&f.resin).unwrap().current_stock, dec!(40));
    }

    #[test]
    fn reorder_queue_assigns_dense_priorities() {
        let f = fixture();
        let a = create(&f, EmployeeId::new()).id_typed();
        let b = create(&f, EmployeeId::new()).id_typed();
        let c = create(&f, EmployeeId::new()).id_typed();

        f.h.jobs.reorder_queue(&[c, a], t0()).unwrap();

        let order: Vec<_> = f.h.jobs.queue().into_iter().map(|j| j.job_id).collect();
        assert_eq!(order, vec![c, a, b]);
        assert!(f.h.jobs.reorder_queue(&[a, a], t0()).unwrap_err().is_validation());
    }

    #[test]
    fn job_sheet_reads_from_the_stream() {
        let f = fixture();
        let job = create(&f, EmployeeId::new());
        let sheet = f.h.jobs.job_sheet(job.id_typed(), t0()).unwrap();
        assert_eq!(sheet.job_number, job.job_number());
        assert_eq!(sheet.materials.len(), 1);
        assert_eq!(sheet.steps.len(), 2);
        assert!(f.h.jobs.job_sheet(JobCardId::new(AggregateId::new()), t0()).unwrap_err().is_not_found());
    }
}
