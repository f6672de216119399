//! Application services: the operations the shop floor actually calls.
//!
//! Each service composes the command dispatcher with the read models it needs
//! and keeps those read models current after every successful command.

pub mod error;
pub mod job_lifecycle;
pub mod stock_ledger;
pub mod stock_take;

use std::sync::Arc;

use serde_json::Value as JsonValue;

use shopfloor_events::{EventBus, EventEnvelope};
use shopfloor_inventory::{CatalogEntry, InventoryItemId};
use shopfloor_jobs::{JobCardId, SkillRoster};

use crate::command_dispatcher::CommandDispatcher;
use crate::config::ShopfloorConfig;
use crate::event_store::EventStore;
use crate::projections::{CatalogProjection, JobBoardProjection, JobSummary};
use crate::read_model::{InMemoryKeyedStore, KeyedStore};
use crate::recipe_store::RecipeStore;

pub use error::{ServiceError, ServiceResult};
pub use job_lifecycle::{CreateJobRequest, JobLifecycleManager};
pub use stock_ledger::{LedgerEntry, StockLedger};
pub use stock_take::{SessionProgress, StockTakeService};

pub type Catalog = CatalogProjection<Arc<dyn KeyedStore<InventoryItemId, CatalogEntry>>>;
pub type JobBoard = JobBoardProjection<Arc<dyn KeyedStore<JobCardId, JobSummary>>>;

/// Every service wired to one store, one bus and one set of read models.
pub struct Shopfloor<S, B> {
    pub dispatcher: Arc<CommandDispatcher<S, B>>,
    pub catalog: Arc<Catalog>,
    pub job_board: Arc<JobBoard>,
    pub ledger: StockLedger<S, B>,
    pub jobs: JobLifecycleManager<S, B>,
    pub stock_take: StockTakeService<S, B>,
}

impl<S, B> Shopfloor<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Wire the services with in-memory read models.
    pub fn new(
        store: S,
        bus: B,
        config: ShopfloorConfig,
        recipes: Arc<dyn RecipeStore>,
        roster: Arc<dyn SkillRoster + Send + Sync>,
    ) -> Self {
        let dispatcher = Arc::new(
            CommandDispatcher::new(store, bus).with_max_retries(config.dispatch_max_retries),
        );
        let catalog_rows: Arc<dyn KeyedStore<InventoryItemId, CatalogEntry>> =
            Arc::new(InMemoryKeyedStore::new());
        let job_rows: Arc<dyn KeyedStore<JobCardId, JobSummary>> = Arc::new(InMemoryKeyedStore::new());
        let catalog: Arc<Catalog> = Arc::new(CatalogProjection::new(catalog_rows));
        let job_board: Arc<JobBoard> = Arc::new(JobBoardProjection::new(job_rows));

        let ledger = StockLedger::new(Arc::clone(&dispatcher), Arc::clone(&catalog));
        let jobs = JobLifecycleManager::new(
            Arc::clone(&dispatcher),
            ledger.clone(),
            Arc::clone(&job_board),
            recipes,
            roster,
            config,
        );
        let stock_take = StockTakeService::new(Arc::clone(&dispatcher), ledger.clone());

        Self {
            dispatcher,
            catalog,
            job_board,
            ledger,
            jobs,
            stock_take,
        }
    }
}
