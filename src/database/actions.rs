mod favorites;
mod ingredients;
mod recipes;
mod shopping_cart;
mod subscriptions;
mod tags;
mod users;

pub use favorites::*;
pub use ingredients::*;
pub use recipes::*;
pub use shopping_cart::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;

use sqlx::{Pool, Postgres};

use crate::error::{Error, QueryError};

pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| QueryError::new(format!("Migration failed: {e}")))?;

    log::info!("Database migrations applied");
    Ok(())
}
