//! Per-type field recipes for id computation

use crate::error::{ProcessorError, Result};
use ingest_types::fields;
use std::collections::{BTreeMap, HashMap};

/// Ordered field names whose values identify an event of one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    fields: Vec<String>,
}

impl Recipe {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Immutable mapping from event type to [`Recipe`]
#[derive(Debug, Clone, Default)]
pub struct RecipeTable {
    recipes: HashMap<String, Recipe>,
}

impl RecipeTable {
    /// Empty table; every lookup misses
    pub fn new() -> Self {
        Self::default()
    }

    /// The recipes for the standard event types
    pub fn standard() -> Self {
        let by_device = [fields::TYPE, fields::DEVICE_ID, fields::TS];
        let by_sub_type = [fields::TYPE, fields::SUB_TYPE, fields::TS];

        let mut table = Self::new();
        table.insert(
            "basal",
            Recipe::new([fields::TYPE, fields::DELIVERY_TYPE, fields::DEVICE_ID, fields::TS]),
        );
        table.insert(
            "bolus",
            Recipe::new([fields::TYPE, fields::SUB_TYPE, fields::DEVICE_ID, fields::TS]),
        );
        for event_type in ["cbg", "smbg", "settings"] {
            table.insert(event_type, Recipe::new(by_device));
        }
        for event_type in ["deviceMeta", "wizard"] {
            table.insert(event_type, Recipe::new(by_sub_type));
        }
        table
    }

    /// Add or replace recipes, rejecting any with no fields
    pub fn with_extra(mut self, extra: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        for (event_type, field_names) in extra {
            if field_names.is_empty() {
                return Err(ProcessorError::configuration(format!(
                    "recipe for type '{event_type}' has no fields"
                )));
            }
            self.insert(event_type.clone(), Recipe::new(field_names.iter().cloned()));
        }
        Ok(self)
    }

    pub fn insert(&mut self, event_type: impl Into<String>, recipe: Recipe) {
        self.recipes.insert(event_type.into(), recipe);
    }

    pub fn get(&self, event_type: &str) -> Option<&Recipe> {
        self.recipes.get(event_type)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let table = RecipeTable::standard();
        assert_eq!(table.len(), 7);
        assert_eq!(
            table.get("basal").unwrap().fields(),
            &["type", "deliveryType", "deviceId", "ts"]
        );
        assert_eq!(table.get("wizard").unwrap().fields(), &["type", "subType", "ts"]);
        assert!(table.get("food").is_none());
    }

    #[test]
    fn test_extra_recipe_replaces_standard() {
        let mut extra = BTreeMap::new();
        extra.insert("smbg".to_string(), vec!["type".to_string(), "ts".to_string()]);
        extra.insert("food".to_string(), vec!["type".to_string(), "ts".to_string()]);

        let table = RecipeTable::standard().with_extra(&extra).unwrap();
        assert_eq!(table.len(), 8);
        assert_eq!(table.get("smbg").unwrap().fields(), &["type", "ts"]);
    }

    #[test]
    fn test_empty_recipe_rejected() {
        let mut extra = BTreeMap::new();
        extra.insert("food".to_string(), Vec::new());
        let result = RecipeTable::standard().with_extra(&extra);
        assert!(matches!(result, Err(ProcessorError::Configuration { .. })));
    }
}
