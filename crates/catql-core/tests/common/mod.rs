#![allow(dead_code)]

use catql_core::{QueryContext, QueryTree, Settings};
use catql_vocab::{EsMappings, JsonVocab};
use proptest::prelude::*;
use std::sync::Arc;

pub const VOCAB: &str = include_str!("../../testdata/vocab.json");
pub const MAPPINGS: &str = include_str!("../../testdata/mappings.json");
pub const SETTINGS: &str = include_str!("../../testdata/settings.json");

pub fn context() -> QueryContext {
    let vocab = JsonVocab::from_json_str(VOCAB).expect("fixture vocab");
    let mappings = EsMappings::from_json_str(MAPPINGS).expect("fixture mappings");
    let settings = Settings::from_json_str(SETTINGS).expect("fixture settings");
    QueryContext::new(Arc::new(vocab), Arc::new(mappings), settings)
}

pub fn tree(query: &str, ctx: &QueryContext) -> QueryTree {
    QueryTree::parse(query, ctx).unwrap_or_else(|e| panic!("{query}: {e}"))
}

/// Conditions the fixture vocabulary resolves.
const CONDITIONS: &[&str] = &[
    "title:hamlet",
    "titel:ophelia",
    "lang:eng",
    "lang:engelska",
    "språk:swe",
    "type:Print",
    "type:Instance",
    "year:2020",
    "year>=1990",
    "year<2000",
    "year:1990-2000",
    "subject:\"sao:Fiction\"",
    "subject:fiction",
    "created:2020-01",
    "isbn:9789100123456",
    "contributor:shakespeare",
    "creator:x",
    "carrierType:Online",
    "identifiedBy.value:123",
];

const WORDS: &[&str] = &["hamlet", "prince", "denmark", "tragedy", "\"to be\""];

fn condition() -> impl Strategy<Value = String> {
    proptest::sample::select(CONDITIONS).prop_map(String::from)
}

fn word() -> impl Strategy<Value = String> {
    proptest::sample::select(WORDS).prop_map(String::from)
}

/// One top-level conjunct.
fn conjunct() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => condition(),
        2 => word(),
        1 => condition().prop_map(|c| format!("NOT {c}")),
        1 => (condition(), condition()).prop_map(|(a, b)| format!("({a} OR {b})")),
        1 => proptest::sample::select(vec!["onlineOnly", "NOT onlineOnly", "excludeEplikt"]).prop_map(String::from),
    ]
}

/// Queries every stage of the pipeline accepts.
pub fn query() -> impl Strategy<Value = String> {
    proptest::collection::vec(conjunct(), 0..5).prop_map(|parts| parts.join(" "))
}
