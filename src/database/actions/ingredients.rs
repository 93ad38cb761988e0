use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::permissions::ActionType,
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    constants::INGREDIENT_SEARCH_LIMIT,
    error::{Error, HtmlError, QueryError},
    jwt::SessionData,
    schema::{Ingredient, IngredientRecord, Uuid},
};

// Two binds per row, well under the postgres bind limit
const IMPORT_CHUNK_SIZE: usize = 1000;

/// Ingredients whose name starts with `prefix`, case-insensitively, ordered by name.
pub async fn search_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as(
        "
        SELECT * FROM ingredients
        WHERE LOWER(name) LIKE LOWER($1)
        ORDER BY name, measurement_unit
        LIMIT $2
    ",
    )
    .bind(like_prefix(prefix))
    .bind(INGREDIENT_SEARCH_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn search_ingredients_cached(
    prefix: &str,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Ingredient>, Error> {
    let key = CacheKeyType::IngredientSearch.new(prefix.trim().to_lowercase());
    let rows = RedisValue::get_or(key, cache, || search_ingredients(prefix.trim(), pool)).await?;

    Ok(rows.value)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Inserts every record not already present and returns how many were added.
/// Cached ingredient searches are invalidated afterwards.
pub async fn import_ingredients(
    records: &[IngredientRecord],
    session: &SessionData,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<u64, Error> {
    session.authenticate(ActionType::ManageIngredients)?;

    let mut inserted = 0;
    for chunk in records.chunks(IMPORT_CHUNK_SIZE) {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        query.push_values(chunk, |mut row, record| {
            row.push_bind(&record.name)
                .push_bind(&record.measurement_unit);
        });
        query.push(" ON CONFLICT (name, measurement_unit) DO NOTHING");

        let result = query
            .build()
            .execute(pool)
            .await
            .map_err(QueryError::from)?;
        inserted += result.rows_affected();
    }

    CacheLifetime::BindIngredientCache.rotate(cache).await?;
    log::info!("Imported {inserted} of {} ingredients", records.len());

    Ok(inserted)
}

/// Reads ingredient records from a JSON array of `{name, measurement_unit}`
/// objects, or from `name,unit` lines.
pub fn parse_ingredient_records(input: &str) -> Result<Vec<IngredientRecord>, Error> {
    let input = input.trim_start_matches('\u{feff}').trim();

    if input.starts_with('[') {
        return serde_json::from_str(input).map_err(|e| {
            HtmlError::InvalidRequest.new(&format!("Invalid ingredient list: {e}"))
        });
    }

    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            // Names may contain commas, units never do
            let (name, unit) = line.rsplit_once(',').ok_or_else(|| {
                HtmlError::InvalidRequest
                    .new(&format!("Line {}: expected name,measurement_unit", index + 1))
            })?;

            let (name, unit) = (name.trim(), unit.trim());
            if name.is_empty() || unit.is_empty() {
                return Err(HtmlError::InvalidRequest
                    .new(&format!("Line {}: empty name or unit", index + 1)));
            }

            Ok(IngredientRecord {
                name: name.to_string(),
                measurement_unit: unit.to_string(),
            })
        })
        .collect()
}

fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, unit: &str) -> IngredientRecord {
        IngredientRecord {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        }
    }

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("Mi"), "Mi%");
        assert_eq!(like_prefix(" 100%_"), "100\\%\\_%");
        assert_eq!(like_prefix(""), "%");
    }

    #[test]
    fn parses_json_records() {
        let records = parse_ingredient_records(
            r#"[{"name": "Flour", "measurement_unit": "g"}, {"name": "Egg", "measurement_unit": "pcs"}]"#,
        )
        .unwrap();

        assert_eq!(records, vec![record("Flour", "g"), record("Egg", "pcs")]);
    }

    #[test]
    fn parses_csv_lines() {
        let records = parse_ingredient_records("Flour,g\n\nSalt, pinch\nSweet, sour sauce,ml\n").unwrap();

        assert_eq!(
            records,
            vec![
                record("Flour", "g"),
                record("Salt", "pinch"),
                record("Sweet, sour sauce", "ml"),
            ]
        );
    }

    #[test]
    fn rejects_line_without_unit() {
        let error = parse_ingredient_records("Flour,g\nSugar\n").unwrap_err();
        assert_eq!(error.code(), 400);
        assert_eq!(error.public_info(), "Line 2: expected name,measurement_unit");
    }

    #[test]
    fn rejects_malformed_json() {
        let error = parse_ingredient_records(r#"[{"name": "Flour"}]"#).unwrap_err();
        assert_eq!(error.code(), 400);
    }
}
