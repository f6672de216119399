//! Recipe → priced material list.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use shopfloor_core::{DomainError, DomainResult, ValueObject};
use shopfloor_inventory::{CatalogEntry, InventoryItemId};

use crate::cure::CurePolicy;
use crate::recipe::{ConsumableRule, Dimensions};

/// Read access to the inventory catalog (price, unit, material class).
pub trait MaterialCatalog {
    fn material(&self, item_id: &InventoryItemId) -> Option<CatalogEntry>;
}

impl MaterialCatalog for HashMap<InventoryItemId, CatalogEntry> {
    fn material(&self, item_id: &InventoryItemId) -> Option<CatalogEntry> {
        self.get(item_id).cloned()
    }
}

impl MaterialCatalog for [CatalogEntry] {
    fn material(&self, item_id: &InventoryItemId) -> Option<CatalogEntry> {
        self.iter().find(|e| &e.item_id == item_id).cloned()
    }
}

impl<C> MaterialCatalog for &C
where
    C: MaterialCatalog + ?Sized,
{
    fn material(&self, item_id: &InventoryItemId) -> Option<CatalogEntry> {
        (**self).material(item_id)
    }
}

/// Per-cut breakdown kept on a dimensional consumable for audit and printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCut {
    pub dimensions: Dimensions,
    pub notes: Option<String>,
    /// Fraction of one canonical sheet this cut uses.
    pub quantity: Decimal,
}

impl ValueObject for ResolvedCut {}

/// One concrete, priced line of a resolved bill of materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConsumable {
    pub item_id: InventoryItemId,
    pub item_code: String,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub cost: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuts: Option<Vec<ResolvedCut>>,
    /// Cure factor applied, for catalyst-class materials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_factor: Option<Decimal>,
}

impl ValueObject for ResolvedConsumable {}

impl ResolvedConsumable {
    fn priced(material: &CatalogEntry, quantity: Decimal) -> Self {
        Self {
            item_id: material.item_id,
            item_code: material.item_code.clone(),
            name: material.name.clone(),
            unit: material.unit.clone(),
            quantity,
            unit_price: material.price,
            cost: quantity * material.price,
            cuts: None,
            temperature_factor: None,
        }
    }

    fn absorb_cuts(&mut self, cuts: Vec<ResolvedCut>) {
        let all = self.cuts.get_or_insert_with(Vec::new);
        all.extend(cuts);
        self.quantity = all.iter().map(|c| c.quantity).sum();
        self.cost = self.quantity * self.unit_price;
    }
}

/// Output of resolution: the material list a job *would* consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBom {
    pub ambient_temp_c: Decimal,
    pub consumables: Vec<ResolvedConsumable>,
}

impl ResolvedBom {
    pub fn material_cost(&self) -> Decimal {
        self.consumables.iter().map(|c| c.cost).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.consumables.is_empty()
    }

    pub fn line_for(&self, item_id: &InventoryItemId) -> Option<&ResolvedConsumable> {
        self.consumables.iter().find(|c| &c.item_id == item_id)
    }
}

/// Resolve consumable rules against a catalog snapshot.
///
/// Any unknown item or malformed rule aborts the whole resolution; there is no
/// partial BOM. Dimensional rules collapse to one line per material.
pub fn resolve<C>(
    rules: &[ConsumableRule],
    catalog: &C,
    ambient_temp_c: Decimal,
    cure: &CurePolicy,
) -> DomainResult<ResolvedBom>
where
    C: MaterialCatalog + ?Sized,
{
    let mut consumables: Vec<ResolvedConsumable> = Vec::with_capacity(rules.len());
    let mut sheet_lines: HashMap<InventoryItemId, usize> = HashMap::new();

    for rule in rules {
        rule.validate()?;

        let item_id = rule.item_id();
        let material = catalog
            .material(&item_id)
            .ok_or_else(|| DomainError::not_found(format!("inventory item {item_id}")))?;

        match rule {
            ConsumableRule::Fixed { quantity, .. } => {
                let line = if material.material_class.is_catalyst() {
                    let mut line =
                        ResolvedConsumable::priced(&material, cure.compensate(*quantity, ambient_temp_c));
                    line.temperature_factor = Some(cure.factor(ambient_temp_c));
                    line
                } else {
                    ResolvedConsumable::priced(&material, *quantity)
                };
                consumables.push(line);
            }
            ConsumableRule::Dimensional { cuts, .. } => {
                let unit_area = material
                    .material_class
                    .unit_area_cm2()
                    .filter(|a| *a > Decimal::ZERO)
                    .ok_or_else(|| {
                        DomainError::validation(format!(
                            "item {} ({}) has no canonical sheet size for dimensional use",
                            material.item_code, item_id
                        ))
                    })?;

                let resolved: Vec<ResolvedCut> = cuts
                    .iter()
                    .map(|cut| ResolvedCut {
                        dimensions: cut.dimensions,
                        notes: cut.notes.clone(),
                        // Rounded up so a positive cut never consumes nothing.
                        quantity: (cut.dimensions.area_cm2() / unit_area)
                            .round_dp_with_strategy(4, RoundingStrategy::ToPositiveInfinity),
                    })
                    .collect();

                match sheet_lines.get(&item_id) {
                    Some(&idx) => consumables[idx].absorb_cuts(resolved),
                    None => {
                        let mut line = ResolvedConsumable::priced(&material, Decimal::ZERO);
                        line.absorb_cuts(resolved);
                        sheet_lines.insert(item_id, consumables.len());
                        consumables.push(line);
                    }
                }
            }
        }
    }

    Ok(ResolvedBom {
        ambient_temp_c,
        consumables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Cut;
    use rust_decimal_macros::dec;
    use shopfloor_core::AggregateId;
    use shopfloor_inventory::{MaterialClass, StockTakeMethod};

    fn entry(code: &str, price: Decimal, class: MaterialClass) -> CatalogEntry {
        CatalogEntry {
            item_id: InventoryItemId::new(AggregateId::new()),
            item_code: code.to_string(),
            name: format!("{code} material"),
            unit: "pcs".to_string(),
            category: "test".to_string(),
            price,
            current_stock: dec!(100),
            reorder_level: dec!(10),
            standard_stock_level: dec!(100),
            stock_take_method: StockTakeMethod::Count,
            tare_weight: Decimal::ZERO,
            unit_weight: Decimal::ZERO,
            material_class: class,
            last_counted_in_session: None,
        }
    }

    fn sheet(code: &str, price: Decimal) -> CatalogEntry {
        entry(
            code,
            price,
            MaterialClass::Sheet {
                length_cm: dec!(120),
                width_cm: dec!(80),
            },
        )
    }

    fn catalog(entries: &[CatalogEntry]) -> HashMap<InventoryItemId, CatalogEntry> {
        entries.iter().map(|e| (e.item_id, e.clone())).collect()
    }

    #[test]
    fn fixed_plus_dimensional_resolves_to_two_lines() {
        let x = entry("ITEM-X", dec!(10), MaterialClass::Standard);
        let mat = sheet("MAT-1", dec!(45));
        let rules = vec![
            ConsumableRule::Fixed {
                item_id: x.item_id,
                quantity: dec!(2),
            },
            ConsumableRule::Dimensional {
                item_id: mat.item_id,
                cuts: vec![Cut::new(dec!(120), dec!(80)).with_notes("hull side")],
            },
        ];

        let bom = resolve(&rules, &catalog(&[x.clone(), mat.clone()]), dec!(20), &CurePolicy::default())
            .unwrap();

        assert_eq!(bom.consumables.len(), 2);
        let fixed = bom.line_for(&x.item_id).unwrap();
        assert_eq!(fixed.quantity, dec!(2));
        assert_eq!(fixed.cost, dec!(20));
        assert!(fixed.cuts.is_none());

        let dim = bom.line_for(&mat.item_id).unwrap();
        assert_eq!(dim.quantity, dec!(1));
        assert_eq!(dim.cost, dec!(45));
        let cuts = dim.cuts.as_ref().unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].notes.as_deref(), Some("hull side"));
        assert_eq!(bom.material_cost(), dec!(65));
    }

    #[test]
    fn unknown_item_aborts_whole_resolution() {
        let x = entry("ITEM-X", dec!(10), MaterialClass::Standard);
        let rules = vec![
            ConsumableRule::Fixed {
                item_id: x.item_id,
                quantity: dec!(1),
            },
            ConsumableRule::Fixed {
                item_id: InventoryItemId::new(AggregateId::new()),
                quantity: dec!(1),
            },
        ];
        let err = resolve(&rules, &catalog(&[x]), dec!(20), &CurePolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn empty_cut_list_never_resolves_to_zero() {
        let mat = sheet("MAT-1", dec!(45));
        let rules = vec![ConsumableRule::Dimensional {
            item_id: mat.item_id,
            cuts: vec![],
        }];
        let err = resolve(&rules, &catalog(&[mat]), dec!(20), &CurePolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn non_positive_cut_is_rejected() {
        let mat = sheet("MAT-1", dec!(45));
        let rules = vec![ConsumableRule::Dimensional {
            item_id: mat.item_id,
            cuts: vec![Cut::new(dec!(50), dec!(-1))],
        }];
        let err = resolve(&rules, &catalog(&[mat]), dec!(20), &CurePolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn tiny_cuts_round_up_to_the_smallest_fraction() {
        let mat = sheet("MAT-1", dec!(45));
        let rules = vec![ConsumableRule::Dimensional {
            item_id: mat.item_id,
            cuts: vec![Cut::new(dec!(0.1), dec!(0.1)), Cut::new(dec!(1), dec!(0.5))],
        }];
        let bom = resolve(&rules, &catalog(&[mat]), dec!(20), &CurePolicy::default()).unwrap();
        let line = &bom.consumables[0];
        let cuts = line.cuts.as_ref().unwrap();
        assert_eq!(cuts[0].quantity, dec!(0.0001));
        assert_eq!(cuts[1].quantity, dec!(0.0001));
        assert_eq!(line.quantity, dec!(0.0002));
        assert!(line.cost > Decimal::ZERO);
    }

    #[test]
    fn dimensional_rule_needs_a_sheet_material() {
        let x = entry("ITEM-X", dec!(10), MaterialClass::Standard);
        let rules = vec![ConsumableRule::Dimensional {
            item_id: x.item_id,
            cuts: vec![Cut::new(dec!(10), dec!(10))],
        }];
        let err = resolve(&rules, &catalog(&[x]), dec!(20), &CurePolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn dimensional_rules_for_one_material_collapse() {
        let mat = sheet("MAT-1", dec!(48));
        let rules = vec![
            ConsumableRule::Dimensional {
                item_id: mat.item_id,
                cuts: vec![Cut::new(dec!(60), dec!(80))],
            },
            ConsumableRule::Dimensional {
                item_id: mat.item_id,
                cuts: vec![Cut::new(dec!(30), dec!(80)), Cut::new(dec!(30), dec!(80))],
            },
        ];
        let bom = resolve(&rules, &catalog(&[mat.clone()]), dec!(20), &CurePolicy::default()).unwrap();
        assert_eq!(bom.consumables.len(), 1);
        let line = &bom.consumables[0];
        assert_eq!(line.quantity, dec!(1));
        assert_eq!(line.cost, dec!(48));
        assert_eq!(line.cuts.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn catalyst_is_scaled_and_factor_recorded() {
        let hardener = entry("MEKP", dec!(30), MaterialClass::Catalyst);
        let rules = vec![ConsumableRule::Fixed {
            item_id: hardener.item_id,
            quantity: dec!(0.2),
        }];
        let bom = resolve(&rules, &catalog(&[hardener]), dec!(10), &CurePolicy::default()).unwrap();
        let line = &bom.consumables[0];
        assert_eq!(line.quantity, dec!(0.26));
        assert_eq!(line.temperature_factor, Some(dec!(1.3)));
        assert_eq!(line.cost, line.quantity * line.unit_price);
    }

    #[test]
    fn identical_inputs_resolve_identically() {
        let hardener = entry("MEKP", dec!(30), MaterialClass::Catalyst);
        let mat = sheet("MAT-1", dec!(45));
        let cat = catalog(&[hardener.clone(), mat.clone()]);
        let rules = vec![
            ConsumableRule::Fixed {
                item_id: hardener.item_id,
                quantity: dec!(0.35),
            },
            ConsumableRule::Dimensional {
                item_id: mat.item_id,
                cuts: vec![Cut::new(dec!(33.3), dec!(21.7))],
            },
        ];
        let a = resolve(&rules, &cat, dec!(14.5), &CurePolicy::default()).unwrap();
        let b = resolve(&rules, &cat, dec!(14.5), &CurePolicy::default()).unwrap();
        assert_eq!(a, b);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn money() -> impl Strategy<Value = Decimal> {
            (0i64..10_000_000, 0u32..4).prop_map(|(m, s)| Decimal::new(m, s))
        }

        fn qty() -> impl Strategy<Value = Decimal> {
            (1i64..1_000_000, 0u32..4).prop_map(|(m, s)| Decimal::new(m, s))
        }

        fn cut_dims() -> impl Strategy<Value = (Decimal, Decimal)> {
            ((1i64..3000, 0u32..2), (1i64..3000, 0u32..2))
                .prop_map(|((l, ls), (w, ws))| (Decimal::new(l, ls), Decimal::new(w, ws)))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: fixed cost is exactly quantity × price.
            #[test]
            fn fixed_cost_is_exact(price in money(), quantity in qty()) {
                let x = entry("X", price, MaterialClass::Standard);
                let rules = vec![ConsumableRule::Fixed { item_id: x.item_id, quantity }];
                let bom = resolve(&rules, &catalog(&[x]), dec!(20), &CurePolicy::default()).unwrap();
                prop_assert_eq!(bom.consumables[0].cost, quantity * price);
            }

            /// Property: adding a cut never lowers the resolved quantity.
            #[test]
            fn dimensional_is_monotonic_in_cut_count(
                cuts in proptest::collection::vec(cut_dims(), 1..12),
                extra in cut_dims()
            ) {
                let mat = sheet("MAT", dec!(10));
                let cat = catalog(&[mat.clone()]);
                let base: Vec<Cut> = cuts.iter().map(|(l, w)| Cut::new(*l, *w)).collect();
                let mut more = base.clone();
                more.push(Cut::new(extra.0, extra.1));

                let q = |cuts: Vec<Cut>| {
                    let rules = vec![ConsumableRule::Dimensional { item_id: mat.item_id, cuts }];
                    resolve(&rules, &cat, dec!(20), &CurePolicy::default()).unwrap().consumables[0].quantity
                };
                prop_assert!(q(more) >= q(base));
            }

            /// Property: growing a cut never lowers the resolved quantity.
            #[test]
            fn dimensional_is_monotonic_in_cut_size(
                (l, w) in cut_dims(),
                grow_l in 0i64..500,
                grow_w in 0i64..500
            ) {
                let mat = sheet("MAT", dec!(10));
                let cat = catalog(&[mat.clone()]);
                let q = |l: Decimal, w: Decimal| {
                    let rules = vec![ConsumableRule::Dimensional {
                        item_id: mat.item_id,
                        cuts: vec![Cut::new(l, w)],
                    }];
                    resolve(&rules, &cat, dec!(20), &CurePolicy::default()).unwrap().consumables[0].quantity
                };
                prop_assert!(q(l + Decimal::from(grow_l), w + Decimal::from(grow_w)) >= q(l, w));
            }

            /// Property: catalyst quantity is non-increasing in temperature and
            /// never below base × floor.
            #[test]
            fn catalyst_is_monotonic_and_floored(
                base in qty(),
                t1 in -300i64..600,
                dt in 0i64..400
            ) {
                let hardener = entry("H", dec!(5), MaterialClass::Catalyst);
                let cat = catalog(&[hardener.clone()]);
                let policy = CurePolicy::default();
                let rules = vec![ConsumableRule::Fixed { item_id: hardener.item_id, quantity: base }];
                let cold_t = Decimal::new(t1, 1);
                let warm_t = cold_t + Decimal::new(dt, 1);

                let cold = resolve(&rules, &cat, cold_t, &policy).unwrap().consumables[0].quantity;
                let warm = resolve(&rules, &cat, warm_t, &policy).unwrap().consumables[0].quantity;

                prop_assert!(cold >= warm);
                prop_assert!(warm >= base * policy.floor());
            }
        }
    }
}
