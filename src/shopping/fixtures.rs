use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use super::store::ShoppingListStore;
use crate::{
    error::{Error, QueryError},
    schema::{CartPart, Uuid},
};

/// In-memory snapshot of carts and recipe ingredients.
#[derive(Default)]
pub struct MemoryStore {
    carts: HashMap<Uuid, BTreeSet<Uuid>>,
    recipes: HashMap<Uuid, Vec<CartPart>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipe(mut self, recipe_id: Uuid, parts: &[(&str, &str, i32)]) -> Self {
        let parts = parts
            .iter()
            .map(|(name, unit, amount)| CartPart::new(name, unit, *amount))
            .collect();
        self.recipes.insert(recipe_id, parts);
        self
    }

    pub fn with_cart(mut self, user_id: Uuid, recipe_ids: &[Uuid]) -> Self {
        self.carts
            .entry(user_id)
            .or_default()
            .extend(recipe_ids.iter().copied());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self) -> Result<(), Error> {
        if self.unavailable {
            return Err(QueryError::new(String::from("Pool timed out")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ShoppingListStore for MemoryStore {
    async fn cart_recipe_ids(&self, user_id: Uuid) -> Result<BTreeSet<Uuid>, Error> {
        self.check()?;
        Ok(self.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn cart_parts(&self, recipe_ids: &BTreeSet<Uuid>) -> Result<Vec<CartPart>, Error> {
        self.check()?;
        Ok(recipe_ids
            .iter()
            .filter_map(|id| self.recipes.get(id))
            .flatten()
            .cloned()
            .collect())
    }
}

/// Cart with recipe A (Flour 200 g, Sugar 50 g) and recipe B (Flour 100 g, Egg 2 pcs).
pub fn baking_store(user_id: Uuid) -> MemoryStore {
    MemoryStore::new()
        .with_recipe(1, &[("Flour", "g", 200), ("Sugar", "g", 50)])
        .with_recipe(2, &[("Flour", "g", 100), ("Egg", "pcs", 2)])
        .with_cart(user_id, &[1, 2])
}
