//! Builders for the engine's JSON query clauses.

use serde_json::{json, Value as Json};

/// The field no document has; matches nothing.
pub const NONSENSE_FIELD: &str = "nonsense.field";

pub fn must(clauses: Vec<Json>) -> Json {
    json!({ "bool": { "must": clauses } })
}

pub fn should(clauses: Vec<Json>) -> Json {
    json!({ "bool": { "should": clauses } })
}

pub fn must_not(clause: Json) -> Json {
    json!({ "bool": { "must_not": clause } })
}

pub fn filter(clause: Json) -> Json {
    json!({ "bool": { "filter": clause } })
}

pub fn nested(path: &str, query: Json) -> Json {
    json!({ "nested": { "path": path, "query": query } })
}

pub fn term(field: &str, value: impl Into<Json>) -> Json {
    filter(json!({ "term": { field: value.into() } }))
}

/// `bounds` maps `gte`/`gt`/`lte`/`lt` to values.
pub fn range(field: &str, bounds: Json) -> Json {
    filter(json!({ "range": { field: bounds } }))
}

pub fn exists(field: &str) -> Json {
    json!({ "exists": { "field": field } })
}

pub fn nonsense_filter() -> Json {
    exists(NONSENSE_FIELD)
}

pub fn match_all() -> Json {
    json!({ "match_all": {} })
}
