//! Drives one shift through the in-memory stack: seed a workshop, route a
//! part through two departments, then run a stock-take over the shelves.
//!
//! Configuration comes from `SHOPFLOOR_*` variables; logging from `RUST_LOG`
//! and `SHOPFLOOR_LOG_FORMAT`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::info;

use shopfloor_core::{AggregateId, DepartmentId, EmployeeId, PartId};
use shopfloor_events::{EventEnvelope, InMemoryEventBus};
use shopfloor_infra::config::ShopfloorConfig;
use shopfloor_infra::event_store::InMemoryEventStore;
use shopfloor_infra::projections::{JobBoardProjection, JobSummary, Projection};
use shopfloor_infra::read_model::InMemoryKeyedStore;
use shopfloor_infra::recipe_store::{InMemoryRecipeStore, RecipeStore};
use shopfloor_infra::services::{CreateJobRequest, Shopfloor};
use shopfloor_infra::workers::ProjectionWorker;
use shopfloor_inventory::{InventoryItemId, MaterialClass, RegisterItem, StockTakeMethod};
use shopfloor_jobs::{InMemorySkillRoster, JobCardId, RoutingStep};
use shopfloor_recipes::{ConsumableRule, Cut, Recipe, RecipeKey};
use shopfloor_stocktake::CountEntry;

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

struct Workshop {
    laminating: DepartmentId,
    finishing: DepartmentId,
    laminator: EmployeeId,
    finisher: EmployeeId,
    supervisor: EmployeeId,
    hull_panel: PartId,
    resin: InventoryItemId,
    catalyst: InventoryItemId,
}

fn main() -> anyhow::Result<()> {
    shopfloor_observability::init();

    let config = ShopfloorConfig::from_env().context("reading SHOPFLOOR_* configuration")?;
    info!(
        labor_rate_per_hour = %config.labor_rate_per_hour,
        ambient_temp_c = %config.default_ambient_temp_c,
        "starting shop floor simulation"
    );

    let laminating = DepartmentId::new();
    let finishing = DepartmentId::new();
    let laminator = EmployeeId::new();
    let finisher = EmployeeId::new();

    let mut roster = InMemorySkillRoster::new();
    roster.register(laminator, laminating, ["laminating", "gelcoat"]);
    roster.register(finisher, finishing, ["sanding"]);

    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let recipes = Arc::new(InMemoryRecipeStore::new());
    let shop = Shopfloor::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        config,
        recipes.clone(),
        Arc::new(roster),
    );

    // A supervisor display fed from the bus rather than by the services.
    let display = Arc::new(JobBoardProjection::new(InMemoryKeyedStore::<JobCardId, JobSummary>::new()));
    let display_projection: Arc<dyn Projection> = display.clone();
    let worker = ProjectionWorker::spawn("supervisor-display", &bus, vec![display_projection])
        .context("spawning projection worker")?;

    let workshop = seed(&shop, recipes.as_ref(), laminating, finishing, laminator, finisher)?;
    run_routed_job(&shop, &workshop)?;
    run_stock_take(&shop, &workshop)?;

    let recovered = shop.jobs.recover_postings().context("replaying ledger postings")?;
    info!(recovered, "ledger postings reconciled");

    wait_for_display(&display, shop.job_board.list().len(), Duration::from_secs(2));
    for job in display.list() {
        info!(
            job_number = %job.job_number,
            status = job.status.label(),
            material_cost = %job.material_cost,
            labor_cost = %job.labor_cost,
            "supervisor display"
        );
    }
    worker.shutdown();

    info!(events = store.len(), "simulation finished");
    Ok(())
}

fn seed(
    shop: &Shopfloor<Store, Bus>,
    recipes: &InMemoryRecipeStore,
    laminating: DepartmentId,
    finishing: DepartmentId,
    laminator: EmployeeId,
    finisher: EmployeeId,
) -> anyhow::Result<Workshop> {
    let supervisor = EmployeeId::new();
    let item = |code: &str, name: &str, unit: &str, price: Decimal, stock: Decimal, class: MaterialClass| {
        RegisterItem {
            item_id: InventoryItemId::new(AggregateId::new()),
            item_code: code.to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            category: "laminating".to_string(),
            price,
            opening_stock: stock,
            reorder_level: Decimal::from(5),
            standard_stock_level: stock,
            stock_take_method: StockTakeMethod::Count,
            tare_weight: Decimal::ZERO,
            unit_weight: Decimal::ZERO,
            material_class: class,
            registered_by: supervisor,
            occurred_at: Utc::now(),
        }
    };

    let resin = shop
        .ledger
        .register_item(item("RES-PE", "Polyester resin", "kg", Decimal::new(650, 2), Decimal::from(120), MaterialClass::Standard))?
        .item_id;
    let catalyst = shop
        .ledger
        .register_item(item("MEKP-1", "MEKP catalyst", "kg", Decimal::new(1800, 2), Decimal::from(8), MaterialClass::Catalyst))?
        .item_id;
    let csm = shop
        .ledger
        .register_item(item(
            "CSM-450",
            "Chopped strand mat 450g",
            "sheet",
            Decimal::new(2400, 2),
            Decimal::from(30),
            MaterialClass::Sheet {
                length_cm: Decimal::from(200),
                width_cm: Decimal::from(100),
            },
        ))?
        .item_id;

    let mut weighed = item("PIG-WHT", "White pigment", "tin", Decimal::new(900, 2), Decimal::from(40), MaterialClass::Standard);
    weighed.stock_take_method = StockTakeMethod::Weight;
    weighed.tare_weight = Decimal::from(50);
    weighed.unit_weight = Decimal::from(5);
    shop.ledger.register_item(weighed)?;

    let hull_panel = PartId::new();

    let mut lay_up = Recipe::new(RecipeKey::new(hull_panel, laminating))
        .with_rule(ConsumableRule::Fixed {
            item_id: resin,
            quantity: Decimal::from(4),
        })
        .with_rule(ConsumableRule::Fixed {
            item_id: catalyst,
            quantity: Decimal::new(8, 2),
        })
        .with_rule(ConsumableRule::Dimensional {
            item_id: csm,
            cuts: vec![
                Cut::new(Decimal::from(200), Decimal::from(100)).with_notes("outer skin"),
                Cut::new(Decimal::from(100), Decimal::from(100)).with_notes("keel strip"),
            ],
        });
    lay_up.steps = vec!["wax mould".into(), "spray gelcoat".into(), "lay up two plies".into()];
    lay_up.tools = vec!["roller".into(), "brush".into()];
    lay_up.estimated_time_minutes = 90;
    lay_up.required_skills = vec!["laminating".into()];
    recipes.put(lay_up)?;

    let mut trim = Recipe::new(RecipeKey::new(hull_panel, finishing));
    trim.steps = vec!["trim flange".into(), "sand edges".into()];
    trim.estimated_time_minutes = 30;
    recipes.put(trim)?;

    info!(items = shop.ledger.catalog().list().len(), "workshop seeded");
    Ok(Workshop {
        laminating,
        finishing,
        laminator,
        finisher,
        supervisor,
        hull_panel,
        resin,
        catalyst,
    })
}

fn run_routed_job(shop: &Shopfloor<Store, Bus>, w: &Workshop) -> anyhow::Result<()> {
    let t0 = Utc::now();
    let parent = shop.jobs.create(
        CreateJobRequest::new(w.hull_panel, w.laminating)
            .assigned_to(w.supervisor)
            .with_priority(1)
            .at_temperature(Decimal::from(14)),
        t0,
    )?;

    let stages = shop.jobs.route(
        parent.id_typed(),
        &[
            RoutingStep::new(w.finishing, 2).with_skills(["sanding"]),
            RoutingStep::new(w.laminating, 1).with_skills(["laminating"]),
        ],
        None,
        t0,
    )?;

    let Some(first) = stages.first() else {
        bail!("routing produced no stages");
    };

    for (i, stage) in stages.iter().enumerate() {
        let id = stage.id_typed();
        let start = t0 + ChronoDuration::minutes(60 * i as i64);
        shop.jobs.start(id, start)?;
        shop.jobs.pause(id, start + ChronoDuration::minutes(20))?;
        shop.jobs.resume(id, start + ChronoDuration::minutes(25))?;
        shop.jobs.complete(id, start + ChronoDuration::minutes(55))?;
        if i == 0 {
            // The laminator went back for an extra coat on the keel.
            shop.jobs.adjust(
                id,
                15,
                &[(w.resin, Decimal::new(5, 1))],
                "extra coat on keel strip",
                w.laminator,
                start + ChronoDuration::minutes(56),
            )?;
        }
        shop.jobs.pass_qc(id, w.supervisor, start + ChronoDuration::minutes(58))?;
    }

    let sheet = shop.jobs.job_sheet(first.id_typed(), Utc::now())?;
    info!(sheet = %serde_json::to_string(&sheet)?, "job sheet");
    info!(
        parent = parent.job_number(),
        finisher = %w.finisher,
        next_stage = ?shop.jobs.next_stage(parent.id_typed()).map(|s| s.job_number),
        "routing finished"
    );
    Ok(())
}

fn run_stock_take(shop: &Shopfloor<Store, Bus>, w: &Workshop) -> anyhow::Result<()> {
    let session = shop.stock_take.start(w.supervisor, Utc::now())?;

    let mut count = shop.stock_take.begin_count(session.id)?;
    shop.stock_take.scan(&mut count, "PIG-WHT")?;
    count.enter_count(CountEntry::Gross(Decimal::new(2475, 1)))?;
    count.confirm_scan("PIG-WHT")?;
    shop.stock_take.commit(&mut count, w.supervisor, Utc::now())?;

    shop.stock_take.scan(&mut count, "MEKP-1")?;
    count.enter_count(CountEntry::Units(7))?;
    count.confirm_scan("MEKP-1")?;
    shop.stock_take.commit(&mut count, w.supervisor, Utc::now())?;

    let progress = shop.stock_take.progress(session.id)?;
    info!(
        counted = progress.counted.len(),
        remaining = progress.remaining.len(),
        "stock-take progress"
    );
    shop.stock_take.finish(session.id, w.supervisor, Utc::now())?;

    let catalyst = shop.ledger.item(&w.catalyst)?;
    info!(
        item_code = %catalyst.item_code,
        current_stock = %catalyst.current_stock,
        history = shop.ledger.history(&w.catalyst)?.len(),
        "catalyst after count"
    );
    for low in shop.ledger.low_stock() {
        info!(item_code = %low.item_code, current_stock = %low.current_stock, "below reorder level");
    }
    Ok(())
}

fn wait_for_display(display: &JobBoardProjection<InMemoryKeyedStore<JobCardId, JobSummary>>, expected: usize, limit: Duration) {
    let deadline = Instant::now() + limit;
    while display.list().len() < expected && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
}
