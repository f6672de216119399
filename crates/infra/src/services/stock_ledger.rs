use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;

use shopfloor_core::{AggregateRoot, DomainError, EmployeeId};
use shopfloor_events::{EventBus, EventEnvelope};
use shopfloor_inventory::{
    AdjustStock, AdjustmentCause, Attribution, CatalogEntry, InventoryCommand, InventoryEvent,
    InventoryItem, InventoryItemId, RecordCount, RegisterItem, UpdatePricing,
};
use shopfloor_stocktake::VerifiedCount;

use super::error::{ServiceError, ServiceResult};
use super::Catalog;
use crate::aggregate_types;
use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::EventStore;
use crate::saga::{ActionExecutor, LedgerPosting};

/// One stock movement in an item's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub sequence_number: u64,
    pub occurred_at: DateTime<Utc>,
    pub requested_delta: Decimal,
    pub applied_delta: Decimal,
    pub quantity_after: Decimal,
    pub attribution: Attribution,
}

/// The single write path for on-hand quantities.
///
/// Every mutation is one versioned append on the item's stream; the catalog
/// read model is brought up to date before the call returns.
pub struct StockLedger<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    catalog: Arc<Catalog>,
}

impl<S, B> Clone for StockLedger<S, B> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<S, B> StockLedger<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, catalog: Arc<Catalog>) -> Self {
        Self {
            dispatcher,
            catalog,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Register a new ledger row. Item codes are unique.
    pub fn register_item(&self, cmd: RegisterItem) -> ServiceResult<CatalogEntry> {
        let code = cmd.item_code.trim();
        if let Some(existing) = self.catalog.by_code(code) {
            return Err(DomainError::conflict(format!(
                "item code {code} is already used by {}",
                existing.item_id
            ))
            .into());
        }

        let item_id = cmd.item_id;
        let item = self.execute(item_id, InventoryCommand::RegisterItem(cmd))?;
        info!(
            item_id = %item_id,
            item_code = item.item_code(),
            opening_stock = %item.stock(),
            "inventory item registered"
        );
        Ok(item.to_catalog_entry())
    }

    /// Apply a signed delta and return the new on-hand quantity. Stock is
    /// clamped at zero; the event records both the requested and the applied
    /// delta.
    pub fn adjust(
        &self,
        item_id: InventoryItemId,
        delta: Decimal,
        attribution: Attribution,
        at: DateTime<Utc>,
    ) -> ServiceResult<Decimal> {
        let cause = attribution.cause.label();
        let item = self.execute(
            item_id,
            InventoryCommand::AdjustStock(AdjustStock {
                item_id,
                delta,
                attribution,
                posting_key: None,
                occurred_at: at,
            }),
        )?;
        info!(
            item_id = %item_id,
            item_code = item.item_code(),
            %delta,
            new_quantity = %item.stock(),
            cause,
            "stock adjusted"
        );
        Ok(item.stock())
    }

    /// Apply a keyed posting at most once. Returns `false` when the item has
    /// already applied that key.
    pub fn post(&self, posting: &LedgerPosting) -> ServiceResult<bool> {
        let dispatched = self.dispatch(
            posting.item_id,
            InventoryCommand::AdjustStock(AdjustStock {
                item_id: posting.item_id,
                delta: posting.delta,
                attribution: posting.attribution.clone(),
                posting_key: Some(posting.key.clone()),
                occurred_at: posting.occurred_at,
            }),
        )?;
        if dispatched.is_noop() {
            return Ok(false);
        }
        let item = dispatched.state;
        info!(
            item_id = %posting.item_id,
            item_code = item.item_code(),
            delta = %posting.delta,
            new_quantity = %item.stock(),
            cause = posting.attribution.cause.label(),
            key = %posting.key,
            "stock posted"
        );
        Ok(true)
    }

    /// Manual edit of price and reorder thresholds.
    pub fn update_pricing(
        &self,
        item_id: InventoryItemId,
        price: Decimal,
        reorder_level: Decimal,
        standard_stock_level: Decimal,
        edited_by: EmployeeId,
        at: DateTime<Utc>,
    ) -> ServiceResult<CatalogEntry> {
        let item = self.execute(
            item_id,
            InventoryCommand::UpdatePricing(UpdatePricing {
                item_id,
                price,
                reorder_level,
                standard_stock_level,
                edited_by,
                occurred_at: at,
            }),
        )?;
        info!(item_id = %item_id, %price, %reorder_level, "item pricing updated");
        Ok(item.to_catalog_entry())
    }

    /// Commit a verified physical count. The count replaces on-hand stock:
    /// its delta is taken against the quantity at commit time, inside the
    /// versioned append, so any movement between scan and commit is
    /// superseded by the count. That movement stays in the audit trail and the
    /// recorded delta is the correction against the state actually replaced.
    pub fn record_count(
        &self,
        verified: &VerifiedCount,
        counted_by: EmployeeId,
        at: DateTime<Utc>,
    ) -> ServiceResult<CatalogEntry> {
        let item_id = verified.item_id();
        let item = self.execute(
            item_id,
            InventoryCommand::RecordCount(RecordCount {
                item_id,
                session_id: verified.session_id().0,
                counted: verified.counted(),
                counted_by,
                occurred_at: at,
            }),
        )?;
        info!(
            item_id = %item_id,
            item_code = verified.item_code(),
            session_id = %verified.session_id(),
            counted = %verified.counted(),
            "stock count committed"
        );
        Ok(item.to_catalog_entry())
    }

    pub fn item(&self, item_id: &InventoryItemId) -> ServiceResult<CatalogEntry> {
        self.catalog
            .get(item_id)
            .ok_or_else(|| DomainError::not_found(format!("inventory item {item_id}")).into())
    }

    pub fn item_by_code(&self, item_code: &str) -> ServiceResult<CatalogEntry> {
        self.catalog
            .by_code(item_code)
            .ok_or_else(|| DomainError::not_found(format!("item code {item_code}")).into())
    }

    pub fn needs_reorder(&self, item_id: &InventoryItemId) -> ServiceResult<bool> {
        Ok(self.item(item_id)?.needs_reorder())
    }

    pub fn low_stock(&self) -> Vec<CatalogEntry> {
        self.catalog.low_stock()
    }

    /// Attributed stock movements for one item, oldest first, read straight
    /// from its event stream. The opening balance is the first entry.
    pub fn history(&self, item_id: &InventoryItemId) -> ServiceResult<Vec<LedgerEntry>> {
        let stream = self
            .dispatcher
            .store()
            .load_stream(item_id.0)
            .map_err(|e| ServiceError::Dispatch(DispatchError::Store(e)))?;
        if stream.is_empty() {
            return Err(DomainError::not_found(format!("inventory item {item_id}")).into());
        }

        let mut entries = Vec::with_capacity(stream.len());
        for stored in stream {
            let event: InventoryEvent = serde_json::from_value(stored.payload)
                .map_err(|e| ServiceError::Dispatch(DispatchError::Deserialize(e.to_string())))?;
            let entry = match event {
                InventoryEvent::ItemRegistered(e) => LedgerEntry {
                    sequence_number: stored.sequence_number,
                    occurred_at: e.occurred_at,
                    requested_delta: e.opening_stock,
                    applied_delta: e.opening_stock,
                    quantity_after: e.opening_stock,
                    attribution: Attribution::new(e.registered_by, AdjustmentCause::Receipt)
                        .with_note("opening balance"),
                },
                InventoryEvent::StockAdjusted(e) => LedgerEntry {
                    sequence_number: stored.sequence_number,
                    occurred_at: e.occurred_at,
                    requested_delta: e.requested_delta,
                    applied_delta: e.applied_delta,
                    quantity_after: e.new_quantity,
                    attribution: e.attribution,
                },
                InventoryEvent::StockCounted(e) => LedgerEntry {
                    sequence_number: stored.sequence_number,
                    occurred_at: e.occurred_at,
                    requested_delta: e.applied_delta,
                    applied_delta: e.applied_delta,
                    quantity_after: e.counted,
                    attribution: e.attribution,
                },
                InventoryEvent::ItemPricingUpdated(_) => continue,
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    fn execute(&self, item_id: InventoryItemId, command: InventoryCommand) -> ServiceResult<InventoryItem> {
        Ok(self.dispatch(item_id, command)?.state)
    }

    fn dispatch(
        &self,
        item_id: InventoryItemId,
        command: InventoryCommand,
    ) -> ServiceResult<Dispatched<InventoryItem>> {
        let dispatched = self.dispatcher.dispatch(
            item_id.0,
            aggregate_types::INVENTORY_ITEM,
            command,
            |id| InventoryItem::empty(InventoryItemId::new(id)),
        )?;
        let item = &dispatched.state;
        self.catalog.observe(item.to_catalog_entry(), item.version())?;
        Ok(dispatched)
    }
}

impl<S, B> ActionExecutor<LedgerPosting> for StockLedger<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    type Error = ServiceError;

    fn execute(&self, posting: &LedgerPosting) -> ServiceResult<bool> {
        self.post(posting)
    }
}
