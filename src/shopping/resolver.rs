use std::collections::BTreeSet;

use super::store::ShoppingListStore;
use crate::{error::Error, schema::Uuid};

/// Recipe ids in the user's shopping cart; empty when the cart is empty.
pub async fn resolve_cart<S>(store: &S, user_id: Uuid) -> Result<BTreeSet<Uuid>, Error>
where
    S: ShoppingListStore + ?Sized,
{
    let recipe_ids = store.cart_recipe_ids(user_id).await?;
    log::debug!("> User {user_id} has {} recipes in cart", recipe_ids.len());

    Ok(recipe_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{baking_store, MemoryStore};

    #[tokio::test]
    async fn resolves_recipes_in_cart() {
        let store = baking_store(7);
        let recipe_ids = resolve_cart(&store, 7).await.unwrap();
        assert_eq!(recipe_ids, BTreeSet::from([1, 2]));
    }

    #[tokio::test]
    async fn empty_cart_resolves_to_empty_set() {
        let store = baking_store(7);
        assert!(resolve_cart(&store, 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let store = MemoryStore::new().unavailable();
        let error = resolve_cart(&store, 1).await.unwrap_err();
        assert!(matches!(error, Error::StorageUnavailable(_)));
    }
}
