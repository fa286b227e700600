//! Case-insensitive alias tables.
//!
//! Every term is reachable under its key, its IRI, its prefixed IRI, its
//! labels and its code. An alias claimed by more than one term stays in the
//! table with all claimants; resolution decides what to do with them.

use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of looking a user string up in the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", content = "keys", rename_all = "snake_case")]
pub enum Mapping {
    Resolved(String),
    Ambiguous(Vec<String>),
    Unrecognized,
}

impl Mapping {
    pub fn resolved(&self) -> Option<&str> {
        match self {
            Mapping::Resolved(key) => Some(key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    by_alias: AHashMap<String, BTreeSet<String>>,
}

impl AliasTable {
    pub fn add(&mut self, alias: &str, key: &str) {
        let alias = alias.trim();
        if alias.is_empty() {
            return;
        }
        self.by_alias
            .entry(alias.to_lowercase())
            .or_default()
            .insert(key.to_string());
    }

    pub fn candidates(&self, alias: &str) -> Option<&BTreeSet<String>> {
        self.by_alias.get(&alias.trim().to_lowercase())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.by_alias.keys().map(String::as_str)
    }

    /// Resolve `input`, narrowing candidates with `admissible` first.
    ///
    /// Ties are broken by a candidate key equal to the trimmed input
    /// (case-sensitive), then by the single candidate `preferred` accepts.
    pub fn resolve(
        &self,
        input: &str,
        admissible: impl Fn(&str) -> bool,
        preferred: impl Fn(&str) -> bool,
    ) -> Mapping {
        let Some(candidates) = self.candidates(input) else {
            return Mapping::Unrecognized;
        };
        let candidates: Vec<&String> = candidates.iter().filter(|k| admissible(k.as_str())).collect();

        match candidates.as_slice() {
            [] => Mapping::Unrecognized,
            [only] => Mapping::Resolved((*only).clone()),
            many => {
                let exact: Vec<&&String> = many.iter().filter(|k| k.as_str() == input.trim()).collect();
                if let [only] = exact.as_slice() {
                    return Mapping::Resolved((**only).clone());
                }
                let preferred: Vec<&&String> = many.iter().filter(|k| preferred(k.as_str())).collect();
                if let [only] = preferred.as_slice() {
                    return Mapping::Resolved((**only).clone());
                }
                Mapping::Ambiguous(many.iter().map(|k| (*k).clone()).collect())
            }
        }
    }
}
