//! Pipeline configuration.
//!
//! Everything is optional in the JSON form; missing fields take the defaults
//! below, so `{}` is a valid settings document.

use catql_dsl::Connective;
use catql_vocab::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Keep unresolvable keys and values in the tree instead of rejecting the query.
    #[serde(default)]
    pub lenient: bool,

    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Subject types assumed when a query establishes none.
    #[serde(default)]
    pub default_subject_types: Vec<String>,

    /// Class whose properties live on the record rather than the described thing.
    #[serde(default = "default_record_type")]
    pub record_type: String,

    /// Document key the record is indexed under.
    #[serde(default = "default_record_key")]
    pub record_key: String,

    /// Extra integral relations tried for a property, beyond those the vocabulary marks.
    #[serde(default = "default_integral_relation_bridges")]
    pub integral_relation_bridges: BTreeMap<String, Vec<String>>,

    /// Placeholder years never matched against four-digit keyword fields.
    #[serde(default = "default_four_digit_sentinels")]
    pub four_digit_sentinels: Vec<String>,

    #[serde(default)]
    pub boost: BoostSettings,

    #[serde(default)]
    pub facets: Vec<FacetConfig>,

    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
}

fn default_max_query_length() -> usize {
    2000
}

fn default_max_depth() -> usize {
    32
}

fn default_record_type() -> String {
    "Record".to_string()
}

fn default_record_key() -> String {
    "meta".to_string()
}

fn default_integral_relation_bridges() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([("bibliography".to_string(), vec!["hasInstance".to_string()])])
}

fn default_four_digit_sentinels() -> Vec<String> {
    vec!["0000".to_string(), "9999".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lenient: false,
            max_query_length: default_max_query_length(),
            max_depth: default_max_depth(),
            default_subject_types: Vec::new(),
            record_type: default_record_type(),
            record_key: default_record_key(),
            integral_relation_bridges: default_integral_relation_bridges(),
            four_digit_sentinels: default_four_digit_sentinels(),
            boost: BoostSettings::default(),
            facets: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| LoadError::read(path, e))?;
        Self::from_json_str(&json)
    }

    pub fn facet(&self, property: &str) -> Option<&FacetConfig> {
        self.facets.iter().find(|f| f.property == property)
    }
}

// ============================================================================
// Boosting
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoostSettings {
    #[serde(default)]
    pub field_boost: FieldBoost,
    #[serde(default)]
    pub function_score: FunctionScore,
    #[serde(default)]
    pub constant_score: Vec<ConstantScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBoost {
    #[serde(default = "default_boost_fields")]
    pub fields: BTreeMap<String, BoostedField>,
    /// Boost for a field queried on its own (`title:hamlet`).
    #[serde(default = "default_boost_factor")]
    pub default_boost_factor: u32,
    /// Phrase clause boosts are the field boosts divided by this.
    #[serde(default = "default_phrase_boost_divisor")]
    pub phrase_boost_divisor: u32,
    /// `multi_match` type of the optional phrase clause; no clause when unset.
    #[serde(default)]
    pub multi_match_type: Option<String>,
    #[serde(default = "default_true")]
    pub analyze_wildcard: bool,
    /// Add a clause querying `_str.exact` alongside `_str`.
    #[serde(default)]
    pub include_exact_fields: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedField {
    pub boost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_score: Option<ScriptScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptScore {
    pub function: String,
    pub apply_if: String,
}

fn default_boost_fields() -> BTreeMap<String, BoostedField> {
    BTreeMap::from([(
        "_str".to_string(),
        BoostedField {
            boost: 100,
            script_score: None,
        },
    )])
}

fn default_boost_factor() -> u32 {
    1
}

fn default_phrase_boost_divisor() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for FieldBoost {
    fn default() -> Self {
        Self {
            fields: default_boost_fields(),
            default_boost_factor: default_boost_factor(),
            phrase_boost_divisor: default_phrase_boost_divisor(),
            multi_match_type: None,
            analyze_wildcard: true,
            include_exact_fields: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionScore {
    #[serde(default)]
    pub functions: Vec<ScoreFunction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreFunction {
    FieldValueFactor {
        field: String,
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default = "default_modifier")]
        modifier: String,
        #[serde(default)]
        missing: f64,
        #[serde(default = "default_factor")]
        weight: f64,
    },
    /// Adds `boost` to documents whose `field` equals `value`.
    MatchingFieldValue { field: String, value: String, boost: f64 },
}

fn default_factor() -> f64 {
    1.0
}

fn default_modifier() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantScore {
    pub field: String,
    pub value: String,
    pub score: u32,
}

// ============================================================================
// Facets and filters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetConfig {
    /// Property key the facet slices on.
    pub property: String,
    /// `Or` makes the facet multi-select.
    #[serde(default = "default_connective")]
    pub connective: Connective,
    /// Exactly one value selectable at a time.
    #[serde(default)]
    pub radio: bool,
    /// Range facets also treat range conditions as selections.
    #[serde(default)]
    pub range: bool,
}

fn default_connective() -> Connective {
    Connective::And
}

/// A named, pre-defined query fragment usable as a bare word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDefinition {
    pub alias: String,
    pub raw: String,
    #[serde(default)]
    pub pref_label_by_lang: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_defaults() {
        let settings = Settings::from_json_str("{}").expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.four_digit_sentinels, vec!["0000", "9999"]);
        assert_eq!(settings.boost.field_boost.fields["_str"].boost, 100);
        assert_eq!(
            settings.integral_relation_bridges.get("bibliography"),
            Some(&vec!["hasInstance".to_string()])
        );
    }

    #[test]
    fn boost_and_facets_parse() {
        let settings = Settings::from_json_str(
            r#"{
                "boost": {
                    "field_boost": {
                        "fields": { "title": { "boost": 50, "script_score": { "function": "_score * 2", "apply_if": "true" } } },
                        "multi_match_type": "phrase",
                        "phrase_boost_divisor": 5
                    },
                    "function_score": { "functions": [
                        { "type": "field_value_factor", "field": "reverseLinks.totalItems", "modifier": "log1p" },
                        { "type": "matching_field_value", "field": "language.@id", "value": "swe", "boost": 10 }
                    ] }
                },
                "facets": [ { "property": "language", "connective": "or" } ],
                "filters": [ { "alias": "onlineOnly", "raw": "carrierType:Online", "prefLabelByLang": { "sv": "Online" } } ]
            }"#,
        )
        .expect("settings");
        assert_eq!(settings.boost.field_boost.phrase_boost_divisor, 5);
        assert_eq!(settings.boost.function_score.functions.len(), 2);
        assert_eq!(settings.facet("language").map(|f| f.connective), Some(Connective::Or));
        assert_eq!(settings.filters[0].pref_label_by_lang["sv"], "Online");
    }
}
