//! Integration tests for the full pipeline.
//!
//! Tests: Service → Dispatcher → EventStore → EventBus / Projection → ReadModel
//!
//! Verifies:
//! - A recipe resolves into a frozen job snapshot and later corrections only
//!   ever land in the adjustment log
//! - Ledger writes are attributed and survive contention
//! - Starting a stock-take touches no item stream
//! - Read models rebuilt from the store match the live ones

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration, Utc};
    use rust_decimal_macros::dec;

    use shopfloor_core::{DepartmentId, EmployeeId, PartId};
    use shopfloor_events::{EventBus, InMemoryEventBus};
    use shopfloor_inventory::{
        AdjustmentCause, Attribution, CatalogEntry, InventoryItemId, MaterialClass,
    };
    use shopfloor_jobs::{InMemorySkillRoster, JobCardId, JobStatus, RoutingStep};
    use shopfloor_recipes::{ConsumableRule, Cut, Recipe, RecipeKey};
    use shopfloor_stocktake::CountEntry;

    use crate::aggregate_types;
    use crate::config::ShopfloorConfig;
    use crate::event_store::{EventStore, InMemoryEventStore};
    use crate::projections::{CatalogProjection, JobBoardProjection, JobSummary, replay};
    use crate::read_model::InMemoryKeyedStore;
    use crate::recipe_store::{InMemoryRecipeStore, RecipeStore};
    use crate::services::Shopfloor;
    use crate::services::testing::{Bus, Store, harness, register_cmd};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T07:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn recipe_to_job_to_adjustment() {
        let h = harness();
        let bus_feed = h.dispatcher.bus().subscribe();
        let part = PartId::new();
        let dept = DepartmentId::new();
        let worker = EmployeeId::new();

        let mut x = register_cmd("RES-X", dec!(50), MaterialClass::Standard);
        x.price = dec!(10);
        let item_x = h.ledger.register_item(x).unwrap().item_id;
        let mut ply = register_cmd(
            "PLY-120",
            dec!(6),
            MaterialClass::Sheet {
                length_cm: dec!(120),
                width_cm: dec!(80),
            },
        );
        ply.price = dec!(45);
        let sheet = h.ledger.register_item(ply).unwrap().item_id;

        let mut recipe = Recipe::new(RecipeKey::new(part, dept))
            .with_rule(ConsumableRule::Fixed {
                item_id: item_x,
                quantity: dec!(2),
            })
            .with_rule(ConsumableRule::Dimensional {
                item_id: sheet,
                cuts: vec![Cut::new(dec!(120), dec!(80)).with_notes("deck panel")],
            });
        recipe.steps = vec!["cut panel".to_string(), "bond".to_string()];
        h.recipes.put(recipe).unwrap();

        let job = h
            .jobs
            .create(
                crate::services::CreateJobRequest::new(part, dept).assigned_to(worker),
                t0(),
            )
            .unwrap();
        let id = job.id_typed();

        let snapshot = job.processed_consumables().to_vec();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].item_id, item_x);
        assert_eq!(snapshot[0].quantity, dec!(2));
        assert_eq!(snapshot[0].cost, dec!(20));
        assert_eq!(snapshot[1].item_id, sheet);
        assert_eq!(snapshot[1].quantity, dec!(1));
        assert_eq!(job.material_cost(), dec!(65));

        // Nothing leaves the shelf until the job completes.
        assert_eq!(h.ledger.item(&item_x).unwrap().current_stock, dec!(50));

        h.jobs.start(id, t0()).unwrap();
        h.jobs.complete(id, t0() + Duration::minutes(45)).unwrap();
        assert_eq!(h.ledger.item(&item_x).unwrap().current_stock, dec!(48));
        assert_eq!(h.ledger.item(&sheet).unwrap().current_stock, dec!(5));

        let adjusted = h
            .jobs
            .adjust(
                id,
                0,
                &[(item_x, dec!(1))],
                "resin starved corner redone",
                worker,
                t0() + Duration::minutes(50),
            )
            .unwrap();

        assert_eq!(adjusted.processed_consumables(), snapshot.as_slice());
        assert_eq!(adjusted.adjustments().len(), 1);
        assert_eq!(adjusted.adjustments()[0].consumable_deltas[0].quantity_delta, dec!(1));
        assert_eq!(adjusted.effective_quantity(&item_x), dec!(3));
        assert_eq!(adjusted.material_cost(), dec!(75));
        assert_eq!(h.ledger.item(&item_x).unwrap().current_stock, dec!(47));

        let causes: Vec<_> = h
            .ledger
            .history(&item_x)
            .unwrap()
            .into_iter()
            .map(|e| e.attribution.cause.label())
            .collect();
        assert_eq!(causes, vec!["receipt", "job_consumption", "job_adjustment"]);

        let sheet_view = h.jobs.job_sheet(id, t0() + Duration::minutes(60)).unwrap();
        assert_eq!(sheet_view.status, JobStatus::AwaitingQc);
        assert_eq!(sheet_view.materials[1].cuts.as_ref().map(Vec::len), Some(1));
        assert_eq!(sheet_view.adjustments.len(), 1);
        assert_eq!(sheet_view.elapsed_minutes, 45);

        // Every committed event went out on the bus, job and ledger alike.
        let published = bus_feed.drain();
        assert!(published.iter().any(|e| e.aggregate_type() == aggregate_types::JOB_CARD));
        assert_eq!(
            published
                .iter()
                .filter(|e| e.aggregate_type() == aggregate_types::INVENTORY_ITEM)
                .count(),
            h.store.load_by_type(aggregate_types::INVENTORY_ITEM).unwrap().len()
        );
    }

    #[test]
    fn starting_a_session_writes_no_item_events() {
        let h = harness();
        for code in ["A", "B", "C", "D"] {
            h.ledger
                .register_item(register_cmd(code, dec!(3), MaterialClass::Standard))
                .unwrap();
        }
        let item_events = h.store.load_by_type(aggregate_types::INVENTORY_ITEM).unwrap().len();
        let total = h.store.len();

        let session = h.stock_take.start(EmployeeId::new(), t0()).unwrap();

        assert_eq!(h.store.len(), total + 1);
        assert_eq!(
            h.store.load_by_type(aggregate_types::INVENTORY_ITEM).unwrap().len(),
            item_events
        );
        let progress = h.stock_take.progress(session.id).unwrap();
        assert!(progress.counted.is_empty());
        assert_eq!(progress.remaining.len(), 4);
    }

    #[test]
    fn concurrent_session_starts_admit_exactly_one() {
        let h = harness();
        let started = AtomicUsize::new(0);
        let conflicts = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| match h.stock_take.start(EmployeeId::new(), Utc::now()) {
                    Ok(_) => {
                        started.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        assert!(e.is_conflict());
                        conflicts.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(conflicts.load(Ordering::SeqCst), 3);
        assert_eq!(h.stock_take.sessions().unwrap().len(), 1);
    }

    #[test]
    fn contended_adjusts_never_lose_an_update() {
        let h = harness();
        let item = h
            .ledger
            .register_item(register_cmd("CSM-450", dec!(1000), MaterialClass::Standard))
            .unwrap()
            .item_id;
        let applied = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let actor = EmployeeId::new();
                    for _ in 0..25 {
                        let result = h.ledger.adjust(
                            item,
                            dec!(-1),
                            Attribution::new(actor, AdjustmentCause::ManualEdit),
                            Utc::now(),
                        );
                        match result {
                            Ok(_) => {
                                applied.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(e) => assert!(e.is_conflict()),
                        }
                    }
                });
            }
        });

        let applied = applied.load(Ordering::SeqCst);
        let expected = dec!(1000) - rust_decimal::Decimal::from(applied as u64);
        assert_eq!(h.ledger.item(&item).unwrap().current_stock, expected);
        // Opening balance plus one entry per successful adjust.
        assert_eq!(h.ledger.history(&item).unwrap().len(), applied + 1);
    }

    #[test]
    fn job_numbers_stay_unique_across_managers() {
        let store: Store = Arc::new(InMemoryEventStore::new());
        let recipes = Arc::new(InMemoryRecipeStore::new());
        let shop = |store: &Store| -> Shopfloor<Store, Bus> {
            Shopfloor::new(
                Arc::clone(store),
                Arc::new(InMemoryEventBus::new()),
                ShopfloorConfig::default(),
                recipes.clone(),
                Arc::new(InMemorySkillRoster::new()),
            )
        };
        let (a, b) = (shop(&store), shop(&store));
        let (part, dept) = (PartId::new(), DepartmentId::new());
        recipes.put(Recipe::new(RecipeKey::new(part, dept))).unwrap();
        let create = |s: &Shopfloor<Store, Bus>| {
            s.jobs.create(crate::services::CreateJobRequest::new(part, dept), t0())
        };

        // Each manager has its own job board; the numbers still interleave.
        assert_eq!(create(&a).unwrap().job_number(), "JC-20260302-0001");
        assert_eq!(create(&b).unwrap().job_number(), "JC-20260302-0002");
        assert_eq!(create(&a).unwrap().job_number(), "JC-20260302-0003");

        let numbers = std::sync::Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for s in [&a, &b] {
                let numbers = &numbers;
                scope.spawn(move || {
                    for _ in 0..10 {
                        match create(s) {
                            Ok(job) => numbers.lock().unwrap().push(job.job_number().to_string()),
                            Err(e) => assert!(e.is_conflict()),
                        }
                    }
                });
            }
        });

        let mut numbers = numbers.into_inner().unwrap();
        let issued = numbers.len();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), issued);
        assert!(!numbers.iter().any(|n| n.as_str() <= "JC-20260302-0003"));
    }

    #[test]
    fn routing_follows_explicit_order_and_is_all_or_nothing() {
        let part = PartId::new();
        let assembly = DepartmentId::new();
        let laminating = DepartmentId::new();
        let finishing = DepartmentId::new();
        let laminator = EmployeeId::new();

        let mut roster = InMemorySkillRoster::new();
        roster.register(laminator, laminating, ["laminating"]);
        let store: Store = Arc::new(InMemoryEventStore::new());
        let recipes = Arc::new(InMemoryRecipeStore::new());
        let shop: Shopfloor<Store, Bus> = Shopfloor::new(
            Arc::clone(&store),
            Arc::new(InMemoryEventBus::new()),
            ShopfloorConfig::default(),
            recipes.clone(),
            Arc::new(roster),
        );
        for dept in [assembly, laminating] {
            recipes.put(Recipe::new(RecipeKey::new(part, dept))).unwrap();
        }

        let parent = shop
            .jobs
            .create(crate::services::CreateJobRequest::new(part, assembly).with_priority(4), t0())
            .unwrap()
            .id_typed();

        // Finishing has no recipe yet: nothing may be created.
        let err = shop
            .jobs
            .route(
                parent,
                &[
                    RoutingStep::new(laminating, 1).with_skills(["laminating"]),
                    RoutingStep::new(finishing, 2),
                ],
                None,
                t0(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(shop.jobs.routing_sequence(parent).is_empty());

        // Listed out of order on purpose.
        let children = shop
            .jobs
            .route(
                parent,
                &[
                    RoutingStep::new(assembly, 2),
                    RoutingStep::new(laminating, 1).with_skills(["laminating"]),
                ],
                None,
                t0(),
            )
            .unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].department_id(), Some(laminating));
        assert_eq!(children[0].stage(), Some(1));
        assert_eq!(children[0].priority(), Some(4));
        assert_eq!(children[1].department_id(), Some(assembly));
        assert_eq!(children[1].assignee(), shopfloor_jobs::Assignee::Unassigned);

        let sequence: Vec<JobCardId> = shop
            .jobs
            .routing_sequence(parent)
            .into_iter()
            .map(|s| s.job_id)
            .collect();
        assert_eq!(sequence, vec![children[0].id_typed(), children[1].id_typed()]);
        assert_eq!(
            shop.jobs.next_stage(parent).map(|s| s.job_id),
            Some(children[0].id_typed())
        );

        let first = children[0].id_typed();
        shop.jobs.start(first, t0()).unwrap();
        shop.jobs.complete(first, t0() + Duration::minutes(20)).unwrap();
        shop.jobs.pass_qc(first, EmployeeId::new(), t0() + Duration::minutes(25)).unwrap();
        assert_eq!(
            shop.jobs.next_stage(parent).map(|s| s.job_id),
            Some(children[1].id_typed())
        );

        assert!(shop.jobs.route(parent, &[RoutingStep::new(laminating, 1)], None, t0()).unwrap_err().is_conflict());
    }

    #[test]
    fn replayed_read_models_match_live_ones() {
        let h = harness();
        let part = PartId::new();
        let dept = DepartmentId::new();
        let resin = h
            .ledger
            .register_item(register_cmd("RES-9", dec!(20), MaterialClass::Standard))
            .unwrap()
            .item_id;
        h.recipes
            .put(Recipe::new(RecipeKey::new(part, dept)).with_rule(ConsumableRule::Fixed {
                item_id: resin,
                quantity: dec!(1.5),
            }))
            .unwrap();

        let job = h
            .jobs
            .create(
                crate::services::CreateJobRequest::new(part, dept).assigned_to(EmployeeId::new()),
                t0(),
            )
            .unwrap()
            .id_typed();
        h.jobs.start(job, t0()).unwrap();
        h.jobs.complete(job, t0() + Duration::minutes(30)).unwrap();

        let session = h.stock_take.start(EmployeeId::new(), t0()).unwrap();
        let mut count = h.stock_take.begin_count(session.id).unwrap();
        h.stock_take.scan(&mut count, "RES-9").unwrap();
        count.enter_count(CountEntry::Units(17)).unwrap();
        count.confirm_scan("RES-9").unwrap();
        h.stock_take.commit(&mut count, EmployeeId::new(), t0()).unwrap();

        let catalog = CatalogProjection::new(InMemoryKeyedStore::<InventoryItemId, CatalogEntry>::new());
        replay(h.store.as_ref(), &catalog).unwrap();
        assert_eq!(catalog.list(), h.catalog.list());
        assert_eq!(catalog.get(&resin).unwrap().current_stock, dec!(17));

        let board = JobBoardProjection::new(InMemoryKeyedStore::<JobCardId, JobSummary>::new());
        replay(h.store.as_ref(), &board).unwrap();
        assert_eq!(board.list(), h.job_board.list());
        assert_eq!(board.get(&job).unwrap().status, JobStatus::AwaitingQc);
    }
}
