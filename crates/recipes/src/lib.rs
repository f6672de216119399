//! Recipes and bill-of-materials resolution.
//!
//! A `Recipe` says how one part is produced in one department. `resolve` turns
//! its consumable rules into a concrete, priced material list against a catalog
//! snapshot. Resolution is pure: it never touches the ledger.

pub mod cure;
pub mod recipe;
pub mod resolver;

pub use cure::CurePolicy;
pub use recipe::{ConsumableRule, Cut, Dimensions, Recipe, RecipeKey};
pub use resolver::{MaterialCatalog, ResolvedBom, ResolvedConsumable, ResolvedCut, resolve};
