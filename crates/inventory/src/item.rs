use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfloor_core::{Aggregate, AggregateId, AggregateRoot, DomainError, EmployeeId};
use shopfloor_events::Event;

use crate::attribution::{AdjustmentCause, Attribution};

/// Inventory item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How an item is physically counted during a stock-take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockTakeMethod {
    /// Operator types a unit count.
    Count,
    /// Operator weighs the container; units are derived from tare and unit weight.
    Weight,
}

/// Material behaviour relevant to recipe resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum MaterialClass {
    /// Consumed by unit count.
    Standard,
    /// Sheet/roll stock consumed by cut area. One unit is one canonical sheet.
    Sheet { length_cm: Decimal, width_cm: Decimal },
    /// Catalyst/hardener: quantity depends on ambient temperature.
    Catalyst,
}

impl MaterialClass {
    /// Area of one canonical unit, for sheet materials.
    pub fn unit_area_cm2(&self) -> Option<Decimal> {
        match self {
            MaterialClass::Sheet {
                length_cm,
                width_cm,
            } => Some(*length_cm * *width_cm),
            _ => None,
        }
    }

    pub fn is_catalyst(&self) -> bool {
        matches!(self, MaterialClass::Catalyst)
    }
}

/// Read-only snapshot of an item as seen by recipe resolution, scanning and
/// stock-take progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_id: InventoryItemId,
    pub item_code: String,
    pub name: String,
    pub unit: String,
    pub category: String,
    pub price: Decimal,
    pub current_stock: Decimal,
    pub reorder_level: Decimal,
    pub standard_stock_level: Decimal,
    pub stock_take_method: StockTakeMethod,
    pub tare_weight: Decimal,
    pub unit_weight: Decimal,
    pub material_class: MaterialClass,
    /// Denormalized back-pointer to the last stock-take session that counted
    /// this item. Used for membership filtering only.
    pub last_counted_in_session: Option<AggregateId>,
}

impl CatalogEntry {
    pub fn needs_reorder(&self) -> bool {
        self.current_stock <= self.reorder_level
    }

    /// Quantity needed to get back to the standard stock level.
    pub fn reorder_quantity(&self) -> Decimal {
        (self.standard_stock_level - self.current_stock).max(Decimal::ZERO)
    }
}

/// Aggregate root: InventoryItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: InventoryItemId,
    item_code: String,
    name: String,
    unit: String,
    category: String,
    price: Decimal,
    stock: Decimal,
    reorder_level: Decimal,
    standard_stock_level: Decimal,
    stock_take_method: StockTakeMethod,
    tare_weight: Decimal,
    unit_weight: Decimal,
    material_class: MaterialClass,
    last_counted_in_session: Option<AggregateId>,
    applied_postings: BTreeSet<String>,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            item_code: String::new(),
            name: String::new(),
            unit: String::new(),
            category: String::new(),
            price: Decimal::ZERO,
            stock: Decimal::ZERO,
            reorder_level: Decimal::ZERO,
            standard_stock_level: Decimal::ZERO,
            stock_take_method: StockTakeMethod::Count,
            tare_weight: Decimal::ZERO,
            unit_weight: Decimal::ZERO,
            material_class: MaterialClass::Standard,
            last_counted_in_session: None,
            applied_postings: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn item_code(&self) -> &str {
        &self.item_code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> Decimal {
        self.stock
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn last_counted_in_session(&self) -> Option<AggregateId> {
        self.last_counted_in_session
    }

    /// Whether a keyed posting has already moved this item's stock.
    pub fn has_applied_posting(&self, key: &str) -> bool {
        self.applied_postings.contains(key)
    }

    pub fn to_catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            item_id: self.id,
            item_code: self.item_code.clone(),
            name: self.name.clone(),
            unit: self.unit.clone(),
            category: self.category.clone(),
            price: self.price,
            current_stock: self.stock,
            reorder_level: self.reorder_level,
            standard_stock_level: self.standard_stock_level,
            stock_take_method: self.stock_take_method,
            tare_weight: self.tare_weight,
            unit_weight: self.unit_weight,
            material_class: self.material_class,
            last_counted_in_session: self.last_counted_in_session,
        }
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub item_id: InventoryItemId,
    pub item_code: String,
    pub name: String,
    pub unit: String,
    pub category: String,
    pub price: Decimal,
    pub opening_stock: Decimal,
    pub reorder_level: Decimal,
    pub standard_stock_level: Decimal,
    pub stock_take_method: StockTakeMethod,
    pub tare_weight: Decimal,
    pub unit_weight: Decimal,
    pub material_class: MaterialClass,
    pub registered_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (signed delta, clamped at zero).
///
/// A `posting_key` makes the adjustment idempotent: a second command with a
/// key the item has already applied produces no events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub item_id: InventoryItemId,
    pub delta: Decimal,
    pub attribution: Attribution,
    #[serde(default)]
    pub posting_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCount (verified physical count from a stock-take session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub item_id: InventoryItemId,
    pub session_id: AggregateId,
    pub counted: Decimal,
    pub counted_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePricing (manual edit of price and reorder thresholds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePricing {
    pub item_id: InventoryItemId,
    pub price: Decimal,
    pub reorder_level: Decimal,
    pub standard_stock_level: Decimal,
    pub edited_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    RegisterItem(RegisterItem),
    AdjustStock(AdjustStock),
    RecordCount(RecordCount),
    UpdatePricing(UpdatePricing),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub item_id: InventoryItemId,
    pub item_code: String,
    pub name: String,
    pub unit: String,
    pub category: String,
    pub price: Decimal,
    pub opening_stock: Decimal,
    pub reorder_level: Decimal,
    pub standard_stock_level: Decimal,
    pub stock_take_method: StockTakeMethod,
    pub tare_weight: Decimal,
    pub unit_weight: Decimal,
    pub material_class: MaterialClass,
    pub registered_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
///
/// `requested_delta` is what the caller asked for, `applied_delta` what the
/// ledger actually moved after clamping at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub item_id: InventoryItemId,
    pub requested_delta: Decimal,
    pub applied_delta: Decimal,
    pub new_quantity: Decimal,
    pub attribution: Attribution,
    #[serde(default)]
    pub posting_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockCounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCounted {
    pub item_id: InventoryItemId,
    pub session_id: AggregateId,
    pub previous_quantity: Decimal,
    pub counted: Decimal,
    pub applied_delta: Decimal,
    pub attribution: Attribution,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemPricingUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPricingUpdated {
    pub item_id: InventoryItemId,
    pub price: Decimal,
    pub reorder_level: Decimal,
    pub standard_stock_level: Decimal,
    pub edited_by: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemRegistered(ItemRegistered),
    StockAdjusted(StockAdjusted),
    StockCounted(StockCounted),
    ItemPricingUpdated(ItemPricingUpdated),
}

impl InventoryEvent {
    pub fn item_id(&self) -> InventoryItemId {
        match self {
            InventoryEvent::ItemRegistered(e) => e.item_id,
            InventoryEvent::StockAdjusted(e) => e.item_id,
            InventoryEvent::StockCounted(e) => e.item_id,
            InventoryEvent::ItemPricingUpdated(e) => e.item_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemRegistered(_) => "inventory.item.registered",
            InventoryEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
            InventoryEvent::StockCounted(_) => "inventory.item.stock_counted",
            InventoryEvent::ItemPricingUpdated(_) => "inventory.item.pricing_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemRegistered(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
            InventoryEvent::StockCounted(e) => e.occurred_at,
            InventoryEvent::ItemPricingUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.item_code = e.item_code.clone();
                self.name = e.name.clone();
                self.unit = e.unit.clone();
                self.category = e.category.clone();
                self.price = e.price;
                self.stock = e.opening_stock;
                self.reorder_level = e.reorder_level;
                self.standard_stock_level = e.standard_stock_level;
                self.stock_take_method = e.stock_take_method;
                self.tare_weight = e.tare_weight;
                self.unit_weight = e.unit_weight;
                self.material_class = e.material_class;
                self.created = true;
            }
            InventoryEvent::StockAdjusted(e) => {
                self.stock = e.new_quantity;
                if let Some(key) = &e.posting_key {
                    self.applied_postings.insert(key.clone());
                }
            }
            InventoryEvent::StockCounted(e) => {
                self.stock = e.counted;
                self.last_counted_in_session = Some(e.session_id);
            }
            InventoryEvent::ItemPricingUpdated(e) => {
                self.price = e.price;
                self.reorder_level = e.reorder_level;
                self.standard_stock_level = e.standard_stock_level;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::RegisterItem(cmd) => self.handle_register(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            InventoryCommand::RecordCount(cmd) => self.handle_record_count(cmd),
            InventoryCommand::UpdatePricing(cmd) => self.handle_update_pricing(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_item_id(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("inventory item {}", self.id)));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.item_code.trim().is_empty() {
            return Err(DomainError::validation("item_code cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.price < Decimal::ZERO {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if cmd.opening_stock < Decimal::ZERO {
            return Err(DomainError::validation("opening stock cannot be negative"));
        }
        if cmd.tare_weight < Decimal::ZERO {
            return Err(DomainError::validation("tare weight cannot be negative"));
        }
        if cmd.stock_take_method == StockTakeMethod::Weight && cmd.unit_weight <= Decimal::ZERO {
            return Err(DomainError::validation(
                "weight-counted items need a positive unit weight",
            ));
        }
        if let MaterialClass::Sheet {
            length_cm,
            width_cm,
        } = cmd.material_class
        {
            if length_cm <= Decimal::ZERO || width_cm <= Decimal::ZERO {
                return Err(DomainError::validation(
                    "sheet materials need positive canonical dimensions",
                ));
            }
        }

        Ok(vec![InventoryEvent::ItemRegistered(ItemRegistered {
            item_id: cmd.item_id,
            item_code: cmd.item_code.trim().to_string(),
            name: cmd.name.clone(),
            unit: cmd.unit.clone(),
            category: cmd.category.clone(),
            price: cmd.price,
            opening_stock: cmd.opening_stock,
            reorder_level: cmd.reorder_level,
            standard_stock_level: cmd.standard_stock_level,
            stock_take_method: cmd.stock_take_method,
            tare_weight: cmd.tare_weight,
            unit_weight: cmd.unit_weight,
            material_class: cmd.material_class,
            registered_by: cmd.registered_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;

        if let Some(key) = &cmd.posting_key {
            if self.applied_postings.contains(key) {
                return Ok(vec![]);
            }
        }

        if cmd.delta.is_zero() {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        // On-hand never goes below zero; the event keeps both deltas so an
        // over-consumption is still visible in the audit trail.
        let new_quantity = (self.stock + cmd.delta).max(Decimal::ZERO);

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            item_id: cmd.item_id,
            requested_delta: cmd.delta,
            applied_delta: new_quantity - self.stock,
            new_quantity,
            attribution: cmd.attribution.clone(),
            posting_key: cmd.posting_key.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_count(&self, cmd: &RecordCount) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.counted < Decimal::ZERO {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }

        // Delta is taken against the stock at commit time, inside the same
        // versioned append, so consumption racing the count is not lost.
        Ok(vec![InventoryEvent::StockCounted(StockCounted {
            item_id: cmd.item_id,
            session_id: cmd.session_id,
            previous_quantity: self.stock,
            counted: cmd.counted,
            applied_delta: cmd.counted - self.stock,
            attribution: Attribution::new(
                cmd.counted_by,
                AdjustmentCause::StockTake {
                    session: cmd.session_id,
                },
            ),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_pricing(
        &self,
        cmd: &UpdatePricing,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.price < Decimal::ZERO {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if cmd.reorder_level < Decimal::ZERO || cmd.standard_stock_level < Decimal::ZERO {
            return Err(DomainError::validation("stock levels cannot be negative"));
        }

        Ok(vec![InventoryEvent::ItemPricingUpdated(ItemPricingUpdated {
            item_id: cmd.item_id,
            price: cmd.price,
            reorder_level: cmd.reorder_level,
            standard_stock_level: cmd.standard_stock_level,
            edited_by: cmd.edited_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
