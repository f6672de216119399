use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfloor_core::{DepartmentId, DomainError, DomainResult, PartId, ValueObject};
use shopfloor_inventory::InventoryItemId;

/// Recipes are unique per (part, department).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecipeKey {
    pub part_id: PartId,
    pub department_id: DepartmentId,
}

impl RecipeKey {
    pub fn new(part_id: PartId, department_id: DepartmentId) -> Self {
        Self {
            part_id,
            department_id,
        }
    }
}

impl core::fmt::Display for RecipeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "part {} / department {}", self.part_id, self.department_id)
    }
}

/// Cut size in centimetres.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: Decimal,
    pub width_cm: Decimal,
}

impl ValueObject for Dimensions {}

impl Dimensions {
    pub fn new(length_cm: Decimal, width_cm: Decimal) -> Self {
        Self {
            length_cm,
            width_cm,
        }
    }

    pub fn area_cm2(&self) -> Decimal {
        self.length_cm * self.width_cm
    }

    pub fn is_positive(&self) -> bool {
        self.length_cm > Decimal::ZERO && self.width_cm > Decimal::ZERO
    }
}

/// One piece cut from sheet stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cut {
    pub dimensions: Dimensions,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ValueObject for Cut {}

impl Cut {
    pub fn new(length_cm: Decimal, width_cm: Decimal) -> Self {
        Self {
            dimensions: Dimensions::new(length_cm, width_cm),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// How a recipe consumes one material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumableRule {
    /// A fixed quantity in the material's own unit.
    Fixed {
        item_id: InventoryItemId,
        quantity: Decimal,
    },
    /// Sheet material consumed by the area of each cut.
    Dimensional {
        item_id: InventoryItemId,
        cuts: Vec<Cut>,
    },
}

impl ConsumableRule {
    pub fn item_id(&self) -> InventoryItemId {
        match self {
            ConsumableRule::Fixed { item_id, .. } => *item_id,
            ConsumableRule::Dimensional { item_id, .. } => *item_id,
        }
    }

    /// Shape checks that need no catalog.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            ConsumableRule::Fixed { item_id, quantity } => {
                if *quantity <= Decimal::ZERO {
                    return Err(DomainError::validation(format!(
                        "fixed quantity for item {item_id} must be positive"
                    )));
                }
            }
            ConsumableRule::Dimensional { item_id, cuts } => {
                if cuts.is_empty() {
                    return Err(DomainError::validation(format!(
                        "dimensional rule for item {item_id} has no cuts"
                    )));
                }
                for (idx, cut) in cuts.iter().enumerate() {
                    if !cut.dimensions.is_positive() {
                        return Err(DomainError::validation(format!(
                            "cut {idx} for item {item_id} has non-positive dimensions ({} x {})",
                            cut.dimensions.length_cm, cut.dimensions.width_cm
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Reusable bill-of-process for producing one part in one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub key: RecipeKey,
    pub steps: Vec<String>,
    pub tools: Vec<String>,
    pub accessories: Vec<String>,
    pub estimated_time_minutes: u32,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub consumables: Vec<ConsumableRule>,
}

impl Recipe {
    pub fn new(key: RecipeKey) -> Self {
        Self {
            key,
            steps: Vec::new(),
            tools: Vec::new(),
            accessories: Vec::new(),
            estimated_time_minutes: 0,
            required_skills: Vec::new(),
            consumables: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: ConsumableRule) -> Self {
        self.consumables.push(rule);
        self
    }

    /// Validated before a recipe is stored.
    pub fn validate(&self) -> DomainResult<()> {
        if self.steps.iter().any(|s| s.trim().is_empty()) {
            return Err(DomainError::validation("recipe steps cannot be blank"));
        }
        for rule in &self.consumables {
            rule.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shopfloor_core::AggregateId;

    fn item() -> InventoryItemId {
        InventoryItemId::new(AggregateId::new())
    }

    #[test]
    fn empty_cut_list_is_rejected() {
        let rule = ConsumableRule::Dimensional {
            item_id: item(),
            cuts: vec![],
        };
        assert!(matches!(rule.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn non_positive_cut_names_its_index() {
        let rule = ConsumableRule::Dimensional {
            item_id: item(),
            cuts: vec![Cut::new(dec!(10), dec!(10)), Cut::new(dec!(0), dec!(5))],
        };
        match rule.validate() {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("cut 1")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rule_round_trips_with_type_tag() {
        let rule = ConsumableRule::Fixed {
            item_id: item(),
            quantity: dec!(2),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "fixed");
        let back: ConsumableRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }
}
