use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::{
    error::{Error, HtmlError},
    schema::Uuid,
};
use crate::constants::MAX_NAME_LENGTH;

pub type FormData = HashMap<String, Value>;

pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        match self.inner.get(key) {
            Some(value) => serde_json::from_value(value.to_owned())
                .map_err(|_e| invalid_field(key, "Invalid type conversion")),
            None => Err(invalid_field(key, "This field is required")),
        }
    }

    /// Accepts both JSON numbers and numeric strings.
    pub fn get_number<T>(&self, key: &str) -> Result<T, Error>
    where
        T: FromStr,
    {
        let value = match self.inner.get(key) {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => return Err(invalid_field(key, "A valid integer is required")),
            None => return Err(invalid_field(key, "This field is required")),
        };

        value
            .parse()
            .map_err(|_e| invalid_field(key, "A valid integer is required"))
    }

    pub fn get_str(&self, key: &str) -> Result<String, Error> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(invalid_field(key, "Not a valid string")),
            },
            None => Err(invalid_field(key, "This field is required")),
        }
    }
}

fn invalid_field(key: &str, info: &str) -> Error {
    HtmlError::InvalidRequest.new(&format!("{key}: {info}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAmountForm {
    pub id: Uuid,
    pub amount: i32,
}

/// Validated payload for creating or replacing a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientAmountForm>,
    pub tags: Vec<Uuid>,
}

impl TryFrom<Form> for RecipeForm {
    type Error = Error;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let recipe = Self {
            name: form.get_str("name")?.trim().to_string(),
            text: form.get_str("text")?,
            cooking_time: form.get_number("cooking_time")?,
            ingredients: form.get_value("ingredients")?,
            tags: form.get_value("tags")?,
        };
        recipe.validate()?;

        Ok(recipe)
    }
}

impl RecipeForm {
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(invalid_field("name", "This field may not be blank"));
        }
        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(invalid_field(
                "name",
                &format!("Ensure this field has no more than {MAX_NAME_LENGTH} characters"),
            ));
        }

        if self.ingredients.is_empty() {
            return Err(invalid_field("ingredients", "At least one ingredient is required"));
        }
        let mut seen_ingredients = HashSet::new();
        for ingredient in &self.ingredients {
            if !seen_ingredients.insert(ingredient.id) {
                return Err(invalid_field("ingredients", "Only unique ingredients"));
            }
            if ingredient.amount <= 0 {
                return Err(invalid_field("amount", "Amount must be greater than 0"));
            }
        }

        if self.tags.is_empty() {
            return Err(invalid_field("tags", "At least one tag is required"));
        }
        let mut seen_tags = HashSet::new();
        if !self.tags.iter().all(|tag| seen_tags.insert(*tag)) {
            return Err(invalid_field("tags", "Tags must be unique"));
        }

        if self.cooking_time <= 0 {
            return Err(invalid_field("cooking_time", "Cooking time must be greater than 0"));
        }

        Ok(())
    }
}
