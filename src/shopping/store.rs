use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{CartPart, Uuid},
};

/// Read-only queries the shopping-list export needs from persistence.
///
/// Both queries are executed eagerly and return materialized rows. A recipe id
/// that no longer exists contributes nothing rather than failing the export.
#[async_trait]
pub trait ShoppingListStore: Send + Sync {
    /// Recipe ids currently in the user's shopping cart.
    async fn cart_recipe_ids(&self, user_id: Uuid) -> Result<BTreeSet<Uuid>, Error>;

    /// Every (ingredient name, measurement unit, amount) attached to the given recipes.
    async fn cart_parts(&self, recipe_ids: &BTreeSet<Uuid>) -> Result<Vec<CartPart>, Error>;
}

#[async_trait]
impl ShoppingListStore for Pool<Postgres> {
    async fn cart_recipe_ids(&self, user_id: Uuid) -> Result<BTreeSet<Uuid>, Error> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT recipe_id FROM shopping_carts WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(self)
                .await
                .map_err(QueryError::from)?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn cart_parts(&self, recipe_ids: &BTreeSet<Uuid>) -> Result<Vec<CartPart>, Error> {
        let recipe_ids: Vec<Uuid> = recipe_ids.iter().copied().collect();

        let rows: Vec<CartPart> = sqlx::query_as(
            "
            SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
        ",
        )
        .bind(recipe_ids)
        .fetch_all(self)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }
}
