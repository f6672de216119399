//! Who moved stock, and why.

use serde::{Deserialize, Serialize};

use shopfloor_core::{AggregateId, EmployeeId, ValueObject};

/// Reason a ledger row changed. Stored on every adjustment event so the audit
/// trail can be filtered by cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjustmentCause {
    /// Frozen job consumables issued when a job card completes.
    JobConsumption { job: AggregateId, job_number: String },
    /// Post-completion correction recorded against a job card.
    JobAdjustment { job: AggregateId, job_number: String },
    /// Verified physical count committed in a stock-take session.
    StockTake { session: AggregateId },
    /// Goods received.
    Receipt,
    /// Manual edit from the back office.
    ManualEdit,
}

impl AdjustmentCause {
    pub fn label(&self) -> &'static str {
        match self {
            AdjustmentCause::JobConsumption { .. } => "job_consumption",
            AdjustmentCause::JobAdjustment { .. } => "job_adjustment",
            AdjustmentCause::StockTake { .. } => "stock_take",
            AdjustmentCause::Receipt => "receipt",
            AdjustmentCause::ManualEdit => "manual_edit",
        }
    }
}

/// Actor + cause attached to every ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub actor: EmployeeId,
    pub cause: AdjustmentCause,
    pub note: Option<String>,
}

impl ValueObject for Attribution {}

impl Attribution {
    pub fn new(actor: EmployeeId, cause: AdjustmentCause) -> Self {
        Self {
            actor,
            cause,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
