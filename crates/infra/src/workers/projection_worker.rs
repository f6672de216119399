use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use shopfloor_events::{EventBus, EventEnvelope, Subscription};

use crate::projections::Projection;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Background loop feeding bus envelopes into a set of projections.
///
/// The subscription is taken before the thread starts, so nothing published
/// after `spawn` returns is missed. Handler failures are logged and the loop
/// carries on; a later `replay` repairs any projection that fell behind.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    pub fn spawn<B>(
        name: &'static str,
        bus: &B,
        projections: Vec<std::sync::Arc<dyn Projection>>,
    ) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>>,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &projections))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop(
    name: &'static str,
    sub: Subscription<EventEnvelope<JsonValue>>,
    shutdown_rx: mpsc::Receiver<()>,
    projections: &[std::sync::Arc<dyn Projection>],
) {
    let tick = Duration::from_millis(100);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(envelope) => {
                for projection in projections
                    .iter()
                    .filter(|p| p.aggregate_type() == envelope.aggregate_type())
                {
                    if let Err(err) = projection.apply_envelope(&envelope) {
                        warn!(
                            worker = name,
                            aggregate_id = %envelope.aggregate_id(),
                            seq = envelope.sequence_number(),
                            error = %err,
                            "projection rejected envelope"
                        );
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker = name, "projection worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use chrono::Utc;
    use rust_decimal_macros::dec;
    use shopfloor_core::{AggregateId, EmployeeId};
    use shopfloor_events::InMemoryEventBus;
    use shopfloor_inventory::{
        CatalogEntry, InventoryCommand, InventoryItem, InventoryItemId, MaterialClass, RegisterItem,
        StockTakeMethod,
    };

    use crate::aggregate_types;
    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;
    use crate::projections::CatalogProjection;
    use crate::read_model::InMemoryKeyedStore;

    #[test]
    fn worker_applies_published_envelopes() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let catalog = Arc::new(CatalogProjection::new(InMemoryKeyedStore::<
            InventoryItemId,
            CatalogEntry,
        >::new()));
        let as_projection: Arc<dyn Projection> = catalog.clone();
        let worker = ProjectionWorker::spawn("catalog-test", &bus, vec![as_projection]).unwrap();

        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new(), bus.clone());
        let item_id = InventoryItemId::new(AggregateId::new());
        dispatcher
            .dispatch(
                item_id.0,
                aggregate_types::INVENTORY_ITEM,
                InventoryCommand::RegisterItem(RegisterItem {
                    item_id,
                    item_code: "PVA-1".to_string(),
                    name: "PVA release agent".to_string(),
                    unit: "l".to_string(),
                    category: "release".to_string(),
                    price: dec!(12),
                    opening_stock: dec!(4),
                    reorder_level: dec!(1),
                    standard_stock_level: dec!(6),
                    stock_take_method: StockTakeMethod::Count,
                    tare_weight: dec!(0),
                    unit_weight: dec!(0),
                    material_class: MaterialClass::Standard,
                    registered_by: EmployeeId::new(),
                    occurred_at: Utc::now(),
                }),
                |id| InventoryItem::empty(InventoryItemId::new(id)),
            )
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while catalog.by_code("PVA-1").is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        worker.shutdown();

        assert_eq!(catalog.by_code("PVA-1").unwrap().current_stock, dec!(4));
    }
}
