use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::{Error, HtmlError, QueryError},
    form::RecipeForm,
    jwt::SessionData,
    pagination::{check_offset, PageContext},
    schema::{Recipe, RecipeFilter, RecipeIngredient, RecipeRow, Tag, Uuid},
};

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    offset: i64,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    check_offset(offset)?;
    let viewer_id = viewer.map(|session| session.user_id);

    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.*,
            EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query.push_bind(viewer_id);
    query.push(
        ") AS is_favorited,
            EXISTS (SELECT 1 FROM shopping_carts s WHERE s.recipe_id = r.id AND s.user_id = ",
    );
    query.push_bind(viewer_id);
    query.push(
        ") AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM recipes r
        WHERE TRUE",
    );

    if !filter.tags.is_empty() {
        query.push(
            " AND EXISTS (
                SELECT 1 FROM recipe_tags rt
                INNER JOIN tags t ON t.id = rt.tag_id
                WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query.push_bind(filter.tags.clone());
        query.push("))");
    }

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }

    // Viewer-relative filters are ignored for anonymous callers
    if let Some(viewer_id) = viewer_id {
        if filter.is_favorited {
            query.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
            query.push_bind(viewer_id);
            query.push(")");
        }
        if filter.is_in_shopping_cart {
            query.push(" AND EXISTS (SELECT 1 FROM shopping_carts s WHERE s.recipe_id = r.id AND s.user_id = ");
            query.push_bind(viewer_id);
            query.push(")");
        }
    }

    query.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ");
    query.push_bind(RECIPE_COUNT_PER_PAGE);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub(super) async fn require_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Recipe, Error> {
    get_recipe(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.new("Recipe not found"))
}

/// Loads a recipe the session is allowed to modify: its own, or any for admins.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    let recipe = require_recipe(id, pool).await?;

    if !session.can_manage(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    ) {
        return Err(HtmlError::Forbidden.default());
    }

    Ok(recipe)
}

pub async fn list_recipe_ingredients(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredient>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn list_recipe_tags(recipe_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Creates the recipe row, its ingredient amounts and tag links in one transaction.
pub async fn create_recipe(
    form: &RecipeForm,
    author: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    author.authenticate(ActionType::CreateRecipes)?;
    form.validate()?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    ",
    )
    .bind(author.user_id)
    .bind(&form.name)
    .bind(&form.text)
    .bind(form.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_links(id.0, form, &mut tx).await?;
    tx.commit().await.map_err(QueryError::from)?;

    log::debug!("> User {} created recipe {}", author.user_id, id.0);
    Ok(id.0)
}

/// Replaces the recipe's fields, ingredient amounts and tags.
pub async fn update_recipe(
    id: Uuid,
    form: &RecipeForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    get_recipe_mut(id, session, pool).await?;
    form.validate()?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query("UPDATE recipes SET name = $1, text = $2, cooking_time = $3 WHERE id = $4")
        .bind(&form.name)
        .bind(&form.text)
        .bind(form.cooking_time)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    insert_recipe_links(id, form, &mut tx).await?;
    tx.commit().await.map_err(QueryError::from)?;

    Ok(())
}

/// Deletes a recipe. Cart, favorite and link rows go with it.
pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_recipe_links(
    recipe_id: Uuid,
    form: &RecipeForm,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    let ingredient_ids: Vec<Uuid> = form.ingredients.iter().map(|i| i.id).collect();
    let known: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
        .bind(&ingredient_ids)
        .fetch_one(&mut **tx)
        .await
        .map_err(QueryError::from)?;
    if known.0 != ingredient_ids.len() as i64 {
        return Err(HtmlError::InvalidRequest.new("ingredients: Ingredient does not exist"));
    }

    let known: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(&form.tags)
        .fetch_one(&mut **tx)
        .await
        .map_err(QueryError::from)?;
    if known.0 != form.tags.len() as i64 {
        return Err(HtmlError::InvalidRequest.new("tags: Tag does not exist"));
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query.push_values(&form.ingredients, |mut row, ingredient| {
        row.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });
    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query.push_values(&form.tags, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    #[tokio::test]
    async fn negative_offset_is_rejected_before_querying() {
        // Lazy pool, nothing listens on this address.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://foodgram@127.0.0.1:1/foodgram")
            .unwrap();

        let error = fetch_recipes(&RecipeFilter::default(), -10, None, &pool)
            .await
            .unwrap_err();
        assert_eq!(error.code(), 400);
    }
}
