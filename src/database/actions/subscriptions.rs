use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use super::users::get_user_by_id;
use crate::{
    authentication::permissions::ActionType,
    constants::{SUBSCRIPTION_COUNT_PER_PAGE, SUBSCRIPTION_RECIPES_LIMIT},
    error::{Error, HtmlError, QueryError},
    jwt::SessionData,
    pagination::{check_offset, PageContext},
    schema::{RecipeShort, Subscription, SubscriptionRow, Uuid},
};

pub async fn is_subscribed(
    author_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> =
        sqlx::query_as("SELECT author_id FROM subscriptions WHERE author_id = $1 AND user_id = $2")
            .bind(author_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn subscribe(
    author_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if author_id == session.user_id {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself"));
    }
    if get_user_by_id(author_id, pool).await?.is_none() {
        return Err(HtmlError::NotFound.new("User not found"));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this author"));
    }

    let rows = fetch_subscription_rows(session.user_id, Some(author_id), 1, 0, pool).await?;
    let mut subscriptions = attach_recipes(rows, SUBSCRIPTION_RECIPES_LIMIT, pool).await?;

    subscriptions
        .pop()
        .ok_or_else(|| HtmlError::NotFound.new("User not found"))
}

pub async fn unsubscribe(
    author_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Author is not in subscriptions"));
    }

    Ok(())
}

/// Authors the session follows, newest subscription first, each with up to
/// `recipes_limit` of their latest recipes.
pub async fn fetch_subscriptions(
    session: &SessionData,
    offset: i64,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Subscription>, Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    check_offset(offset)?;

    let recipes_limit = recipes_limit.unwrap_or(SUBSCRIPTION_RECIPES_LIMIT);
    if recipes_limit < 0 {
        return Err(HtmlError::InvalidRequest
            .new("recipes_limit: Ensure this value is greater than or equal to 0"));
    }

    let rows = fetch_subscription_rows(
        session.user_id,
        None,
        SUBSCRIPTION_COUNT_PER_PAGE,
        offset,
        pool,
    )
    .await?;
    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let subscriptions = attach_recipes(rows, recipes_limit, pool).await?;

    Ok(PageContext::from_rows(
        subscriptions,
        total_count,
        SUBSCRIPTION_COUNT_PER_PAGE,
        offset,
    ))
}

async fn fetch_subscription_rows(
    user_id: Uuid,
    author_id: Option<Uuid>,
    limit: i64,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionRow>, Error> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1 AND ($2::INTEGER IS NULL OR s.author_id = $2)
        ORDER BY s.created DESC, u.id
        LIMIT $3 OFFSET $4
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

async fn attach_recipes(
    rows: Vec<SubscriptionRow>,
    recipes_limit: i64,
    pool: &Pool<Postgres>,
) -> Result<Vec<Subscription>, Error> {
    let author_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

    let recipes: Vec<(Uuid, Uuid, String, i32)> = sqlx::query_as(
        "
        SELECT author_id, id, name, cooking_time FROM (
            SELECT r.author_id, r.id, r.name, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS n
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) latest
        WHERE n <= $2
        ORDER BY author_id, n
    ",
    )
    .bind(&author_ids)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut by_author: HashMap<Uuid, Vec<RecipeShort>> = HashMap::new();
    for (author_id, id, name, cooking_time) in recipes {
        by_author.entry(author_id).or_default().push(RecipeShort {
            id,
            name,
            cooking_time,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let recipes = by_author.remove(&row.id).unwrap_or_default();
            Subscription::from_row(row, recipes)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::schema::UserRole;

    fn session() -> SessionData {
        SessionData {
            user_id: 7,
            username: String::from("cook"),
            role: UserRole::User,
            is_admin: false,
        }
    }

    fn lazy_pool() -> Pool<Postgres> {
        PgPoolOptions::new()
            .connect_lazy("postgres://foodgram@127.0.0.1:1/foodgram")
            .unwrap()
    }

    #[tokio::test]
    async fn negative_offset_is_rejected_before_querying() {
        let error = fetch_subscriptions(&session(), -3, None, &lazy_pool())
            .await
            .unwrap_err();
        assert_eq!(error.code(), 400);
    }

    #[tokio::test]
    async fn negative_recipes_limit_is_rejected_before_querying() {
        let error = fetch_subscriptions(&session(), 0, Some(-1), &lazy_pool())
            .await
            .unwrap_err();
        assert_eq!(error.code(), 400);
    }
}
