//! Recipe storage keyed by (part, department).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use shopfloor_core::DomainResult;
use shopfloor_recipes::{Recipe, RecipeKey};

pub trait RecipeStore: Send + Sync {
    fn get(&self, key: &RecipeKey) -> DomainResult<Option<Recipe>>;

    /// Validate and store, replacing any recipe with the same key.
    fn put(&self, recipe: Recipe) -> DomainResult<()>;
}

impl<R> RecipeStore for Arc<R>
where
    R: RecipeStore + ?Sized,
{
    fn get(&self, key: &RecipeKey) -> DomainResult<Option<Recipe>> {
        (**self).get(key)
    }

    fn put(&self, recipe: Recipe) -> DomainResult<()> {
        (**self).put(recipe)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRecipeStore {
    recipes: RwLock<HashMap<RecipeKey, Recipe>>,
}

impl InMemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecipeStore for InMemoryRecipeStore {
    fn get(&self, key: &RecipeKey) -> DomainResult<Option<Recipe>> {
        let recipes = self.recipes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(recipes.get(key).cloned())
    }

    fn put(&self, recipe: Recipe) -> DomainResult<()> {
        recipe.validate()?;
        let mut recipes = self.recipes.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(recipe = %recipe.key, rules = recipe.consumables.len(), "recipe stored");
        recipes.insert(recipe.key, recipe);
        Ok(())
    }
}
