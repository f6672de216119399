//! Scan-gated count of one item: scan, enter the count, scan again to confirm.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use shopfloor_core::{DomainError, DomainResult};
use shopfloor_inventory::{CatalogEntry, InventoryItemId, StockTakeMethod};

use crate::registry::StockTakeSessionId;

/// What the operator typed or weighed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CountEntry {
    /// Whole units, for count-method items.
    Units(u64),
    /// Gross weight including the container, for weight-method items.
    Gross(Decimal),
}

/// Units on hand from a weighed container: `round_half_up((gross - tare) / unit_weight)`.
pub fn units_from_weight(gross: Decimal, tare: Decimal, unit_weight: Decimal) -> DomainResult<Decimal> {
    if unit_weight <= Decimal::ZERO {
        return Err(DomainError::validation("unit weight must be positive"));
    }
    if gross < tare {
        return Err(DomainError::validation(format!(
            "gross weight {gross} is below the tare weight {tare}"
        )));
    }
    Ok(((gross - tare) / unit_weight)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

/// A count that passed the confirmation scan. Only [`CountWorkflow::confirm_scan`]
/// produces one, so nothing else can reach the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCount {
    session_id: StockTakeSessionId,
    item_id: InventoryItemId,
    item_code: String,
    counted: Decimal,
}

impl VerifiedCount {
    pub fn session_id(&self) -> StockTakeSessionId {
        self.session_id
    }

    pub fn item_id(&self) -> InventoryItemId {
        self.item_id
    }

    pub fn item_code(&self) -> &str {
        &self.item_code
    }

    pub fn counted(&self) -> Decimal {
        self.counted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountState {
    Idle,
    AwaitingCount { item: CatalogEntry },
    AwaitingConfirmation { item: CatalogEntry, counted: Decimal },
    Verified(VerifiedCount),
}

impl CountState {
    pub fn label(&self) -> &'static str {
        match self {
            CountState::Idle => "idle",
            CountState::AwaitingCount { .. } => "awaiting_count",
            CountState::AwaitingConfirmation { .. } => "awaiting_confirmation",
            CountState::Verified(_) => "verified",
        }
    }
}

/// Per-terminal count state machine. Holds no locks and writes nothing; a
/// failed or cancelled step has no ledger effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountWorkflow {
    session_id: StockTakeSessionId,
    state: CountState,
}

impl CountWorkflow {
    pub fn new(session_id: StockTakeSessionId) -> Self {
        Self {
            session_id,
            state: CountState::Idle,
        }
    }

    pub fn session_id(&self) -> StockTakeSessionId {
        self.session_id
    }

    pub fn state(&self) -> &CountState {
        &self.state
    }

    /// The count waiting to be committed, if the confirmation scan succeeded.
    pub fn verified(&self) -> Option<&VerifiedCount> {
        match &self.state {
            CountState::Verified(v) => Some(v),
            _ => None,
        }
    }

    /// Idle → AwaitingCount. The caller resolves the scanned code to a catalog
    /// entry (unknown codes fail there with `NotFound`).
    pub fn scan_item(&mut self, item: CatalogEntry) -> DomainResult<()> {
        if !matches!(self.state, CountState::Idle) {
            return Err(DomainError::invariant(format!(
                "cannot scan a new item while {}",
                self.state.label()
            )));
        }
        self.state = CountState::AwaitingCount { item };
        Ok(())
    }

    /// AwaitingCount → AwaitingConfirmation. Returns the unit quantity derived
    /// from the entry.
    pub fn enter_count(&mut self, entry: CountEntry) -> DomainResult<Decimal> {
        let CountState::AwaitingCount { item } = &self.state else {
            return Err(DomainError::invariant(format!(
                "cannot enter a count while {}",
                self.state.label()
            )));
        };

        let counted = match (item.stock_take_method, entry) {
            (StockTakeMethod::Count, CountEntry::Units(units)) => Decimal::from(units),
            (StockTakeMethod::Weight, CountEntry::Gross(gross)) => {
                units_from_weight(gross, item.tare_weight, item.unit_weight)?
            }
            (StockTakeMethod::Count, CountEntry::Gross(_)) => {
                return Err(DomainError::validation(format!(
                    "item {} is counted in units, not weighed",
                    item.item_code
                )));
            }
            (StockTakeMethod::Weight, CountEntry::Units(_)) => {
                return Err(DomainError::validation(format!(
                    "item {} is counted by weight",
                    item.item_code
                )));
            }
        };

        let item = item.clone();
        self.state = CountState::AwaitingConfirmation { item, counted };
        Ok(counted)
    }

    /// AwaitingConfirmation → Verified when `scanned` equals the item code.
    /// A mismatch drops back to AwaitingCount so the count is entered again.
    pub fn confirm_scan(&mut self, scanned: &str) -> DomainResult<VerifiedCount> {
        let state = core::mem::replace(&mut self.state, CountState::Idle);
        match state {
            CountState::AwaitingConfirmation { item, counted } => {
                if scanned != item.item_code {
                    let expected = item.item_code.clone();
                    self.state = CountState::AwaitingCount { item };
                    return Err(DomainError::conflict(format!(
                        "confirmation scan '{scanned}' does not match item {expected}"
                    )));
                }
                let verified = VerifiedCount {
                    session_id: self.session_id,
                    item_id: item.item_id,
                    item_code: item.item_code,
                    counted,
                };
                self.state = CountState::Verified(verified.clone());
                Ok(verified)
            }
            other => {
                let label = other.label();
                self.state = other;
                Err(DomainError::invariant(format!(
                    "nothing to confirm while {label}"
                )))
            }
        }
    }

    /// Verified → Idle, after the ledger accepted the count.
    pub fn mark_committed(&mut self) -> DomainResult<VerifiedCount> {
        match core::mem::replace(&mut self.state, CountState::Idle) {
            CountState::Verified(v) => Ok(v),
            other => {
                let label = other.label();
                self.state = other;
                Err(DomainError::invariant(format!(
                    "no verified count to commit while {label}"
                )))
            }
        }
    }

    /// Any state → Idle.
    pub fn cancel(&mut self) {
        self.state = CountState::Idle;
    }
}
