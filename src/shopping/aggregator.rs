use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use log::warn;
use serde::Serialize;

use super::store::ShoppingListStore;
use crate::{
    error::Error,
    schema::{CartPart, Uuid},
};

/// One line of the shopping list: the summed amount of an ingredient in a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: u64,
}

/// Collects every ingredient of the given recipes and sums the amounts per
/// (name, measurement unit). An empty set never reaches the store.
pub async fn aggregate<S>(
    store: &S,
    recipe_ids: &BTreeSet<Uuid>,
) -> Result<Vec<ShoppingListRow>, Error>
where
    S: ShoppingListStore + ?Sized,
{
    if recipe_ids.is_empty() {
        return Ok(Vec::new());
    }

    let parts = store.cart_parts(recipe_ids).await?;
    log::debug!(
        "> Aggregating {} parts from {} recipes",
        parts.len(),
        recipe_ids.len()
    );

    aggregate_parts(parts)
}

/// Sums amounts per exact (name, measurement unit) pair.
///
/// Rows come back ordered by name, then by unit. Names and units are compared
/// byte for byte, so "Flour"/"g" and "Flour"/"kg" stay separate rows.
/// Non-positive amounts are dropped.
pub fn aggregate_parts<I>(parts: I) -> Result<Vec<ShoppingListRow>, Error>
where
    I: IntoIterator<Item = CartPart>,
{
    let mut totals: BTreeMap<(String, String), u64> = BTreeMap::new();

    for part in parts {
        let amount = match u64::try_from(part.amount) {
            Ok(amount) if amount > 0 => amount,
            _ => {
                warn!(
                    "> Skipping non-positive amount {} for {} ({})",
                    part.amount, part.name, part.measurement_unit
                );
                continue;
            }
        };

        match totals.entry((part.name, part.measurement_unit)) {
            Entry::Vacant(entry) => {
                entry.insert(amount);
            }
            Entry::Occupied(mut entry) => {
                let (name, measurement_unit) = entry.key();
                let total =
                    entry
                        .get()
                        .checked_add(amount)
                        .ok_or_else(|| Error::AmountOverflow {
                            name: name.to_owned(),
                            measurement_unit: measurement_unit.to_owned(),
                        })?;
                *entry.get_mut() = total;
            }
        }
    }

    Ok(totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListRow {
            name,
            measurement_unit,
            amount,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::fixtures::{baking_store, MemoryStore};

    fn row(name: &str, unit: &str, amount: u64) -> ShoppingListRow {
        ShoppingListRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn sums_shared_ingredients_across_recipes() {
        let store = baking_store(1);
        let rows = aggregate(&store, &BTreeSet::from([1, 2])).await.unwrap();

        assert_eq!(
            rows,
            vec![
                row("Egg", "pcs", 2),
                row("Flour", "g", 300),
                row("Sugar", "g", 50),
            ]
        );
    }

    #[tokio::test]
    async fn empty_cart_skips_the_store() {
        let store = MemoryStore::new().unavailable();
        let rows = aggregate(&store, &BTreeSet::new()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn vanished_recipes_contribute_nothing() {
        let store = baking_store(1);
        let rows = aggregate(&store, &BTreeSet::from([2, 99])).await.unwrap();
        assert_eq!(rows, vec![row("Egg", "pcs", 2), row("Flour", "g", 100)]);
    }

    #[tokio::test]
    async fn recipe_without_ingredients_yields_nothing() {
        let store = MemoryStore::new().with_recipe(3, &[]);
        let rows = aggregate(&store, &BTreeSet::from([3])).await.unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn units_are_not_converted() {
        let rows = aggregate_parts(vec![
            CartPart::new("Flour", "g", 500),
            CartPart::new("Flour", "kg", 1),
        ])
        .unwrap();

        assert_eq!(rows, vec![row("Flour", "g", 500), row("Flour", "kg", 1)]);
    }

    #[test]
    fn names_are_case_sensitive() {
        let rows = aggregate_parts(vec![
            CartPart::new("flour", "g", 1),
            CartPart::new("Flour", "g", 2),
        ])
        .unwrap();

        assert_eq!(rows, vec![row("Flour", "g", 2), row("flour", "g", 1)]);
    }

    #[test]
    fn non_positive_amounts_are_skipped() {
        let rows = aggregate_parts(vec![
            CartPart::new("Salt", "g", 0),
            CartPart::new("Salt", "g", -4),
            CartPart::new("Salt", "g", 3),
        ])
        .unwrap();

        assert_eq!(rows, vec![row("Salt", "g", 3)]);
    }

    #[test]
    fn large_amounts_do_not_wrap() {
        let rows = aggregate_parts(vec![
            CartPart::new("Water", "ml", i32::MAX),
            CartPart::new("Water", "ml", i32::MAX),
        ])
        .unwrap();

        assert_eq!(rows, vec![row("Water", "ml", 2 * i32::MAX as u64)]);
    }

    fn part_strategy() -> impl Strategy<Value = CartPart> {
        (
            prop::sample::select(vec!["Flour", "Sugar", "Egg", "Milk"]),
            prop::sample::select(vec!["g", "kg", "pcs"]),
            1..1_000i32,
        )
            .prop_map(|(name, unit, amount)| CartPart::new(name, unit, amount))
    }

    proptest! {
        #[test]
        fn totals_are_preserved(parts in prop::collection::vec(part_strategy(), 0..40)) {
            let expected: u64 = parts.iter().map(|p| p.amount as u64).sum();
            let rows = aggregate_parts(parts).unwrap();
            let total: u64 = rows.iter().map(|r| r.amount).sum();
            prop_assert_eq!(total, expected);
        }

        #[test]
        fn rows_are_unique_and_ordered(parts in prop::collection::vec(part_strategy(), 0..40)) {
            let rows = aggregate_parts(parts).unwrap();
            for pair in rows.windows(2) {
                let a = (&pair[0].name, &pair[0].measurement_unit);
                let b = (&pair[1].name, &pair[1].measurement_unit);
                prop_assert!(a < b);
            }
        }

        #[test]
        fn input_order_does_not_matter(parts in prop::collection::vec(part_strategy(), 0..40)) {
            let mut reversed = parts.clone();
            reversed.reverse();
            prop_assert_eq!(aggregate_parts(parts).unwrap(), aggregate_parts(reversed).unwrap());
        }
    }
}
