use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use shopfloor_core::AggregateId;
use shopfloor_events::EventEnvelope;
use shopfloor_inventory::{CatalogEntry, InventoryEvent, InventoryItemId};
use shopfloor_recipes::MaterialCatalog;

use super::{Projection, ProjectionError, gate};
use crate::aggregate_types;
use crate::read_model::KeyedStore;

#[derive(Debug, Default)]
struct CatalogState {
    cursors: HashMap<AggregateId, u64>,
    by_code: HashMap<String, InventoryItemId>,
}

/// Inventory catalog: one `CatalogEntry` per ledger row, plus an item-code
/// index for scan lookups.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: KeyedStore<InventoryItemId, CatalogEntry>,
{
    store: S,
    state: RwLock<CatalogState>,
}

impl<S> CatalogProjection<S>
where
    S: KeyedStore<InventoryItemId, CatalogEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: RwLock::new(CatalogState::default()),
        }
    }

    pub fn get(&self, item_id: &InventoryItemId) -> Option<CatalogEntry> {
        self.store.get(item_id)
    }

    /// Exact, case-sensitive item-code lookup.
    pub fn by_code(&self, item_code: &str) -> Option<CatalogEntry> {
        let item_id = {
            let state = self.state.read().ok()?;
            *state.by_code.get(item_code)?
        };
        self.store.get(&item_id)
    }

    /// All items ordered by item code.
    pub fn list(&self) -> Vec<CatalogEntry> {
        let mut entries = self.store.list();
        entries.sort_by(|a, b| a.item_code.cmp(&b.item_code));
        entries
    }

    /// Items at or below their reorder level, ordered by item code.
    pub fn low_stock(&self) -> Vec<CatalogEntry> {
        self.list().into_iter().filter(CatalogEntry::needs_reorder).collect()
    }

    /// Stream version the read model has seen for `item_id`.
    pub fn version_of(&self, item_id: &InventoryItemId) -> u64 {
        self.state
            .read()
            .ok()
            .and_then(|s| s.cursors.get(&item_id.0).copied())
            .unwrap_or(0)
    }

    /// Record post-command state. Ignored unless `version` is newer than what
    /// the read model already holds.
    pub fn observe(&self, entry: CatalogEntry, version: u64) -> Result<(), ProjectionError> {
        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        let last = state.cursors.get(&entry.item_id.0).copied().unwrap_or(0);
        if version <= last {
            return Ok(());
        }
        state.by_code.insert(entry.item_code.clone(), entry.item_id);
        state.cursors.insert(entry.item_id.0, version);
        self.store.upsert(entry.item_id, entry);
        Ok(())
    }
}

impl<S> Projection for CatalogProjection<S>
where
    S: KeyedStore<InventoryItemId, CatalogEntry>,
{
    fn aggregate_type(&self) -> &'static str {
        aggregate_types::INVENTORY_ITEM
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::INVENTORY_ITEM {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        if !gate(&state.cursors, aggregate_id, seq)? {
            return Ok(());
        }

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let item_id = event.item_id();
        if item_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event item_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            InventoryEvent::ItemRegistered(e) => {
                state.by_code.insert(e.item_code.clone(), e.item_id);
                self.store.upsert(
                    e.item_id,
                    CatalogEntry {
                        item_id: e.item_id,
                        item_code: e.item_code,
                        name: e.name,
                        unit: e.unit,
                        category: e.category,
                        price: e.price,
                        current_stock: e.opening_stock,
                        reorder_level: e.reorder_level,
                        standard_stock_level: e.standard_stock_level,
                        stock_take_method: e.stock_take_method,
                        tare_weight: e.tare_weight,
                        unit_weight: e.unit_weight,
                        material_class: e.material_class,
                        last_counted_in_session: None,
                    },
                );
            }
            InventoryEvent::StockAdjusted(e) => {
                let mut entry = self.existing(&e.item_id)?;
                entry.current_stock = e.new_quantity;
                self.store.upsert(e.item_id, entry);
            }
            InventoryEvent::StockCounted(e) => {
                let mut entry = self.existing(&e.item_id)?;
                entry.current_stock = e.counted;
                entry.last_counted_in_session = Some(e.session_id);
                self.store.upsert(e.item_id, entry);
            }
            InventoryEvent::ItemPricingUpdated(e) => {
                let mut entry = self.existing(&e.item_id)?;
                entry.price = e.price;
                entry.reorder_level = e.reorder_level;
                entry.standard_stock_level = e.standard_stock_level;
                self.store.upsert(e.item_id, entry);
            }
        }

        state.cursors.insert(aggregate_id, seq);
        tracing::debug!(item_id = %item_id, seq, "catalog projection applied");
        Ok(())
    }

    fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            state.cursors.clear();
            state.by_code.clear();
        }
        self.store.clear();
    }
}

impl<S> CatalogProjection<S>
where
    S: KeyedStore<InventoryItemId, CatalogEntry>,
{
    fn existing(&self, item_id: &InventoryItemId) -> Result<CatalogEntry, ProjectionError> {
        self.store.get(item_id).ok_or_else(|| {
            ProjectionError::StreamMismatch(format!("item {item_id} changed before it was registered"))
        })
    }
}

impl<S> MaterialCatalog for CatalogProjection<S>
where
    S: KeyedStore<InventoryItemId, CatalogEntry>,
{
    fn material(&self, item_id: &InventoryItemId) -> Option<CatalogEntry> {
        self.get(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use shopfloor_core::EmployeeId;
    use shopfloor_inventory::{
        AdjustmentCause, Attribution, ItemRegistered, MaterialClass, StockAdjusted, StockTakeMethod,
    };
    use uuid::Uuid;

    use crate::read_model::InMemoryKeyedStore;

    type Catalog = CatalogProjection<InMemoryKeyedStore<InventoryItemId, CatalogEntry>>;

    fn envelope(event: &InventoryEvent, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            event.item_id().0,
            aggregate_types::INVENTORY_ITEM,
            "inventory.item.test",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn registered(item_id: InventoryItemId) -> InventoryEvent {
        InventoryEvent::ItemRegistered(ItemRegistered {
            item_id,
            item_code: "CSM-450".to_string(),
            name: "Chopped strand mat 450".to_string(),
            unit: "m2".to_string(),
            category: "reinforcement".to_string(),
            price: dec!(3.10),
            opening_stock: dec!(100),
            reorder_level: dec!(20),
            standard_stock_level: dec!(150),
            stock_take_method: StockTakeMethod::Count,
            tare_weight: dec!(0),
            unit_weight: dec!(0),
            material_class: MaterialClass::Standard,
            registered_by: EmployeeId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn adjusted(item_id: InventoryItemId, new_quantity: rust_decimal::Decimal) -> InventoryEvent {
        InventoryEvent::StockAdjusted(StockAdjusted {
            item_id,
            requested_delta: dec!(-1),
            applied_delta: dec!(-1),
            new_quantity,
            attribution: Attribution::new(EmployeeId::new(), AdjustmentCause::ManualEdit),
            posting_key: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn envelopes_build_entry_and_code_index() {
        let catalog: Catalog = CatalogProjection::new(InMemoryKeyedStore::new());
        let item_id = InventoryItemId::new(AggregateId::new());

        catalog.apply_envelope(&envelope(&registered(item_id), 1)).unwrap();
        catalog.apply_envelope(&envelope(&adjusted(item_id, dec!(15)), 2)).unwrap();

        let entry = catalog.by_code("CSM-450").unwrap();
        assert_eq!(entry.current_stock, dec!(15));
        assert_eq!(catalog.low_stock().len(), 1);
        assert!(catalog.by_code("csm-450").is_none());
    }

    #[test]
    fn duplicates_are_ignored_and_gaps_rejected() {
        let catalog: Catalog = CatalogProjection::new(InMemoryKeyedStore::new());
        let item_id = InventoryItemId::new(AggregateId::new());
        let first = envelope(&registered(item_id), 1);

        catalog.apply_envelope(&first).unwrap();
        catalog.apply_envelope(&first).unwrap();
        let err = catalog
            .apply_envelope(&envelope(&adjusted(item_id, dec!(1)), 3))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3 }));
    }

    #[test]
    fn observe_only_moves_forward() {
        let catalog: Catalog = CatalogProjection::new(InMemoryKeyedStore::new());
        let item_id = InventoryItemId::new(AggregateId::new());
        catalog.apply_envelope(&envelope(&registered(item_id), 1)).unwrap();

        let mut newer = catalog.get(&item_id).unwrap();
        newer.current_stock = dec!(80);
        catalog.observe(newer.clone(), 3).unwrap();

        let mut older = newer.clone();
        older.current_stock = dec!(90);
        catalog.observe(older, 2).unwrap();

        assert_eq!(catalog.get(&item_id).unwrap().current_stock, dec!(80));
        assert_eq!(catalog.version_of(&item_id), 3);
    }
}
