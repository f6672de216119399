//! Multi-stage routing: one part passing through departments in a fixed order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use shopfloor_core::{DepartmentId, DomainError, DomainResult, EmployeeId};

use crate::job::Assignee;

/// One department pass in a part's routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStep {
    pub department_id: DepartmentId,
    pub order: u32,
    #[serde(default)]
    pub required_skills: Vec<String>,
}

impl RoutingStep {
    pub fn new(department_id: DepartmentId, order: u32) -> Self {
        Self {
            department_id,
            order,
            required_skills: Vec::new(),
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_skills = skills.into_iter().map(Into::into).collect();
        self
    }
}

/// Employee lookup by department and skill set.
pub trait SkillRoster {
    /// First employee in `department` holding every skill in `skills`.
    fn find_qualified(&self, department: DepartmentId, skills: &[String]) -> Option<EmployeeId>;
}

impl<R> SkillRoster for &R
where
    R: SkillRoster + ?Sized,
{
    fn find_qualified(&self, department: DepartmentId, skills: &[String]) -> Option<EmployeeId> {
        (**self).find_qualified(department, skills)
    }
}

#[derive(Debug, Clone)]
struct RosterEntry {
    employee_id: EmployeeId,
    department_id: DepartmentId,
    skills: HashSet<String>,
}

/// Roster kept in registration order; lookups pick the earliest match.
#[derive(Debug, Default, Clone)]
pub struct InMemorySkillRoster {
    entries: Vec<RosterEntry>,
}

impl InMemorySkillRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I, S>(&mut self, employee_id: EmployeeId, department_id: DepartmentId, skills: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(RosterEntry {
            employee_id,
            department_id,
            skills: skills.into_iter().map(Into::into).collect(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SkillRoster for InMemorySkillRoster {
    fn find_qualified(&self, department: DepartmentId, skills: &[String]) -> Option<EmployeeId> {
        self.entries
            .iter()
            .find(|e| e.department_id == department && skills.iter().all(|s| e.skills.contains(s)))
            .map(|e| e.employee_id)
    }
}

/// A routing step with its assignee already chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub step: RoutingStep,
    pub assignee: Assignee,
}

/// Orders `steps` by `order` and picks an assignee per stage. Stages with no
/// qualified employee get `Assignee::Unassigned` rather than failing the plan.
pub fn plan_routing<R>(steps: &[RoutingStep], roster: &R) -> DomainResult<Vec<PlannedStage>>
where
    R: SkillRoster + ?Sized,
{
    if steps.is_empty() {
        return Err(DomainError::invariant("routing has no steps"));
    }

    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.order) {
            return Err(DomainError::validation(format!(
                "routing order {} appears more than once",
                step.order
            )));
        }
    }

    let mut ordered = steps.to_vec();
    ordered.sort_by_key(|s| s.order);

    Ok(ordered
        .into_iter()
        .map(|step| {
            let assignee = roster
                .find_qualified(step.department_id, &step.required_skills)
                .map(Assignee::Employee)
                .unwrap_or(Assignee::Unassigned);
            PlannedStage { step, assignee }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_order_not_input_position() {
        let a = DepartmentId::new();
        let b = DepartmentId::new();
        let steps = vec![RoutingStep::new(a, 2), RoutingStep::new(b, 1)];

        let plan = plan_routing(&steps, &InMemorySkillRoster::new()).unwrap();
        let departments: Vec<_> = plan.iter().map(|p| p.step.department_id).collect();
        assert_eq!(departments, vec![b, a]);
    }

    #[test]
    fn empty_routing_is_rejected() {
        let err = plan_routing(&[], &InMemorySkillRoster::new()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let d = DepartmentId::new();
        let steps = vec![RoutingStep::new(d, 1), RoutingStep::new(DepartmentId::new(), 1)];
        let err = plan_routing(&steps, &InMemorySkillRoster::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn roster_picks_first_fully_qualified_employee() {
        let dept = DepartmentId::new();
        let partial = EmployeeId::new();
        let first = EmployeeId::new();
        let second = EmployeeId::new();

        let mut roster = InMemorySkillRoster::new();
        roster.register(partial, dept, ["lamination"]);
        roster.register(first, dept, ["lamination", "gelcoat"]);
        roster.register(second, dept, ["gelcoat", "lamination"]);

        let steps = vec![RoutingStep::new(dept, 1).with_skills(["lamination", "gelcoat"])];
        let plan = plan_routing(&steps, &roster).unwrap();
        assert_eq!(plan[0].assignee, Assignee::Employee(first));
    }

    #[test]
    fn unstaffed_stage_is_unassigned() {
        let mut roster = InMemorySkillRoster::new();
        roster.register(EmployeeId::new(), DepartmentId::new(), ["painting"]);

        let steps = vec![RoutingStep::new(DepartmentId::new(), 1).with_skills(["painting"])];
        let plan = plan_routing(&steps, &roster).unwrap();
        assert_eq!(plan[0].assignee, Assignee::Unassigned);
    }
}
