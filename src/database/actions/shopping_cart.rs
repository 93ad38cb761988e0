use sqlx::{Pool, Postgres};

use super::recipes::require_recipe;
use crate::{
    authentication::permissions::ActionType,
    error::{Error, HtmlError, QueryError},
    jwt::SessionData,
    schema::{RecipeShort, Uuid},
};

pub async fn is_in_shopping_cart(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "SELECT recipe_id FROM shopping_carts WHERE recipe_id = $1 AND user_id = $2",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn add_to_shopping_cart(
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;
    let recipe = require_recipe(recipe_id, pool).await?;

    let result = sqlx::query(
        "INSERT INTO shopping_carts (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is already in shopping cart"));
    }

    log::debug!("> User {} added recipe {recipe_id} to cart", session.user_id);
    Ok(RecipeShort {
        id: recipe.id,
        name: recipe.name,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_from_shopping_cart(
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;
    require_recipe(recipe_id, pool).await?;

    let result = sqlx::query("DELETE FROM shopping_carts WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is not in shopping cart"));
    }

    Ok(())
}
