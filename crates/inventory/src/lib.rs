//! Inventory domain module (event-sourced).
//!
//! Each `InventoryItem` stream is one row of the stock ledger: the only place
//! on-hand quantity changes, always through an attributed adjustment. Pure
//! domain logic (no IO, no storage).

pub mod attribution;
pub mod item;

pub use attribution::{AdjustmentCause, Attribution};
pub use item::{
    AdjustStock, CatalogEntry, InventoryCommand, InventoryEvent, InventoryItem, InventoryItemId,
    ItemPricingUpdated, ItemRegistered, MaterialClass, RecordCount, RegisterItem, StockAdjusted,
    StockCounted, StockTakeMethod, UpdatePricing,
};
