//! Search-index field mappings.
//!
//! Only the facts the compiler branches on are kept: which fields are
//! nested (and whether they are copied into the parent document), which carry
//! `keyword` or four-digit subfields, and which are `long` or `date` typed.

use crate::error::{read_to_string, LoadError};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

pub const KEYWORD: &str = "keyword";
pub const FOUR_DIGITS_SHORT: &str = "four_digits_short";
pub const FOUR_DIGITS_KEYWORD: &str = "four_digits_keyword";
const NUMERIC_EXTRACTOR: &str = "numeric_extractor";

pub trait FieldMappings: Send + Sync {
    fn is_nested_field(&self, field: &str) -> bool;

    fn nested_fields(&self) -> Vec<&str>;

    /// Nested, and not copied into the parent document.
    fn is_nested_not_in_parent_field(&self, field: &str) -> bool;

    fn has_keyword_subfield(&self, field: &str) -> bool;

    fn has_four_digits_short_field(&self, field: &str) -> bool;

    fn has_four_digits_keyword_field(&self, field: &str) -> bool;

    fn is_long_field(&self, field: &str) -> bool;

    fn is_date_field(&self, field: &str) -> bool;

    /// The innermost nested field that is `field` or one of its dotted prefixes.
    fn nested_stem(&self, field: &str) -> Option<String> {
        if self.is_nested_field(field) {
            return Some(field.to_string());
        }
        self.nested_fields()
            .into_iter()
            .filter(|stem| {
                field
                    .strip_prefix(stem)
                    .is_some_and(|rest| rest.starts_with('.'))
            })
            .max_by_key(|stem| stem.len())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EsMappings {
    keyword_fields: BTreeSet<String>,
    date_fields: BTreeSet<String>,
    long_fields: BTreeSet<String>,
    nested_fields: BTreeSet<String>,
    nested_in_parent_fields: BTreeSet<String>,
    four_digits_short_fields: BTreeSet<String>,
    four_digits_keyword_fields: BTreeSet<String>,
}

impl EsMappings {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::from_json_str(&read_to_string(path.as_ref())?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Accepts either the engine's `{"mappings": {"properties": ...}}` response
    /// or a bare `{"properties": ...}` object.
    pub fn from_value(value: &Value) -> Result<Self, LoadError> {
        let root = value.get("mappings").unwrap_or(value);
        let Some(properties) = root.get("properties").and_then(Value::as_object) else {
            return Err(LoadError::Invalid("mapping has no 'properties' object".to_string()));
        };

        let mut mappings = EsMappings::default();
        mappings.visit(properties, "");
        debug!(
            nested = mappings.nested_fields.len(),
            keyword = mappings.keyword_fields.len(),
            "field mappings loaded"
        );
        Ok(mappings)
    }

    fn visit(&mut self, properties: &serde_json::Map<String, Value>, prefix: &str) {
        for (name, def) in properties {
            let field = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };

            match def.get("type").and_then(Value::as_str) {
                Some("nested") => {
                    self.nested_fields.insert(field.clone());
                    if def.get("include_in_parent").and_then(Value::as_bool) == Some(true) {
                        self.nested_in_parent_fields.insert(field.clone());
                    }
                }
                Some("date") => {
                    self.date_fields.insert(field.clone());
                }
                Some("long") => {
                    self.long_fields.insert(field.clone());
                }
                _ => {}
            }

            if let Some(subfields) = def.get("fields").and_then(Value::as_object) {
                if subfields.contains_key(KEYWORD) {
                    self.keyword_fields.insert(field.clone());
                }
                if subfields.contains_key(FOUR_DIGITS_KEYWORD) {
                    self.four_digits_keyword_fields.insert(field.clone());
                }
                let numeric_extractor = subfields.values().any(|sub| {
                    sub.get("analyzer").and_then(Value::as_str) == Some(NUMERIC_EXTRACTOR)
                });
                if subfields.contains_key(FOUR_DIGITS_SHORT) || numeric_extractor {
                    self.four_digits_short_fields.insert(field.clone());
                }
            }

            if let Some(children) = def.get("properties").and_then(Value::as_object) {
                self.visit(children, &field);
            }
        }
    }
}

impl FieldMappings for EsMappings {
    fn is_nested_field(&self, field: &str) -> bool {
        self.nested_fields.contains(field)
    }

    fn nested_fields(&self) -> Vec<&str> {
        self.nested_fields.iter().map(String::as_str).collect()
    }

    fn is_nested_not_in_parent_field(&self, field: &str) -> bool {
        self.nested_fields.contains(field) && !self.nested_in_parent_fields.contains(field)
    }

    fn has_keyword_subfield(&self, field: &str) -> bool {
        self.keyword_fields.contains(field)
    }

    fn has_four_digits_short_field(&self, field: &str) -> bool {
        self.four_digits_short_fields.contains(field)
    }

    fn has_four_digits_keyword_field(&self, field: &str) -> bool {
        self.four_digits_keyword_fields.contains(field)
    }

    fn is_long_field(&self, field: &str) -> bool {
        self.long_fields.contains(field)
    }

    fn is_date_field(&self, field: &str) -> bool {
        self.date_fields.contains(field)
    }
}
