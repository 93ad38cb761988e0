use log::info;

use super::{
    aggregator::aggregate,
    renderer::{render, ExportFormat, ShoppingListDocument},
    resolver::resolve_cart,
    store::ShoppingListStore,
};
use crate::{config::ExportSettings, error::Error, schema::Uuid};

/// Builds the downloadable shopping list for a user's current cart.
pub async fn export_shopping_list<S>(
    store: &S,
    user_id: Uuid,
    format: ExportFormat,
    settings: &ExportSettings,
) -> Result<ShoppingListDocument, Error>
where
    S: ShoppingListStore + ?Sized,
{
    let recipe_ids = resolve_cart(store, user_id).await?;
    let rows = aggregate(store, &recipe_ids).await?;
    let document = render(&rows, format, &settings.font)?;

    info!(
        "Exported shopping list for user {user_id}: {} rows as {format}",
        rows.len()
    );
    Ok(document)
}
