//! Printable job sheet: everything an operator needs on the floor, plus the
//! running cost picture. Serialized as JSON by callers that render it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use shopfloor_core::{DepartmentId, PartId};
use shopfloor_recipes::ResolvedConsumable;

use crate::job::{Assignee, IssueEntry, JobAdjustment, JobCard, JobCardId};
use crate::status::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSheet {
    pub job_id: JobCardId,
    pub job_number: String,
    pub part_id: Option<PartId>,
    pub department_id: Option<DepartmentId>,
    pub stage: Option<u32>,
    pub parent_job_id: Option<JobCardId>,
    pub assignee: Assignee,
    pub status: JobStatus,
    pub quantity: u32,
    pub priority: Option<u32>,
    pub steps: Vec<String>,
    pub tools: Vec<String>,
    pub accessories: Vec<String>,
    pub required_skills: Vec<String>,
    pub ambient_temp_c: Decimal,
    pub materials: Vec<ResolvedConsumable>,
    pub estimated_time_minutes: u32,
    pub elapsed_minutes: i64,
    pub adjustments: Vec<JobAdjustment>,
    pub issues: Vec<IssueEntry>,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub total_cost: Decimal,
}

impl JobCard {
    /// Sheet as of `now`. Materials come from the frozen snapshot; corrections
    /// are listed separately under `adjustments`.
    pub fn job_sheet(&self, now: DateTime<Utc>) -> JobSheet {
        JobSheet {
            job_id: self.id_typed(),
            job_number: self.job_number().to_string(),
            part_id: self.part_id(),
            department_id: self.department_id(),
            stage: self.stage(),
            parent_job_id: self.parent_job_id(),
            assignee: self.assignee(),
            status: self.status(),
            quantity: self.quantity(),
            priority: self.priority(),
            steps: self.steps().to_vec(),
            tools: self.tools().to_vec(),
            accessories: self.accessories().to_vec(),
            required_skills: self.required_skills().to_vec(),
            ambient_temp_c: self.ambient_temp_c(),
            materials: self.processed_consumables().to_vec(),
            estimated_time_minutes: self.estimated_time_minutes(),
            elapsed_minutes: self.elapsed_ms(now) / 60_000,
            adjustments: self.adjustments().to_vec(),
            issues: self.issue_log().to_vec(),
            material_cost: self.material_cost(),
            labor_cost: self.labor_cost(),
            total_cost: self.total_cost(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CreateJob, JobCardCommand, StartJob};
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use shopfloor_core::{Aggregate, AggregateId, EmployeeId};

    #[test]
    fn sheet_serializes_status_label_and_elapsed_time() {
        let t0 = DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = JobCardId::new(AggregateId::new());
        let mut job = JobCard::empty(id);
        let create = JobCardCommand::CreateJob(CreateJob {
            job_id: id,
            job_number: "JC-20260302-0007".to_string(),
            part_id: PartId::new(),
            department_id: DepartmentId::new(),
            assignee: Assignee::Employee(EmployeeId::new()),
            quantity: 2,
            priority: Some(1),
            estimated_time_minutes: 45,
            steps: vec!["sand".to_string()],
            tools: vec![],
            accessories: vec![],
            required_skills: vec![],
            consumables: vec![],
            ambient_temp_c: dec!(18),
            parent_job_id: None,
            stage: Some(1),
            occurred_at: t0,
        });
        for e in job.handle(&create).unwrap() {
            job.apply(&e);
        }
        for e in job
            .handle(&JobCardCommand::StartJob(StartJob {
                job_id: id,
                occurred_at: t0,
            }))
            .unwrap()
        {
            job.apply(&e);
        }

        let sheet = job.job_sheet(t0 + Duration::minutes(25));
        assert_eq!(sheet.elapsed_minutes, 25);

        let json = serde_json::to_value(&sheet).unwrap();
        assert_eq!(json["status"], "In Progress");
        assert_eq!(json["job_number"], "JC-20260302-0007");
        assert_eq!(json["stage"], 1);
    }
}
