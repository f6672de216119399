//! Infrastructure layer: event store, command dispatch, read models and the
//! services that tie the shop-floor aggregates together.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod recipe_store;
pub mod saga;
pub mod services;
pub mod workers;

#[cfg(test)]
mod integration_tests;

/// Stream type tags recorded on every stored event.
pub mod aggregate_types {
    pub const INVENTORY_ITEM: &str = "inventory.item";
    pub const JOB_CARD: &str = "jobs.card";
    pub const JOB_NUMBER_SEQUENCE: &str = "jobs.number_sequence";
    pub const STOCK_TAKE_REGISTRY: &str = "stocktake.registry";
}
