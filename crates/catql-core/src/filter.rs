//! Named filters: pre-defined query fragments usable as a bare word.

use crate::context::QueryContext;
use crate::node::Node;
use crate::settings::FilterDefinition;
use crate::tree::QueryTree;
use ahash::AHashMap;
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FilterAlias {
    pub alias: String,
    pub raw: String,
    pub pref_label_by_lang: BTreeMap<String, String>,
    /// `raw`, parsed once when the registry is loaded.
    pub parsed: Node,
}

impl PartialEq for FilterAlias {
    fn eq(&self, other: &Self) -> bool {
        self.alias == other.alias
    }
}

impl FilterAlias {
    pub fn description(&self) -> Json {
        json!({
            "@type": "Resource",
            "alias": self.alias,
            "raw": self.raw,
            "prefLabelByLang": self.pref_label_by_lang,
            "parsedFilter": self.parsed.to_query_string(true),
        })
    }
}

/// Filters by alias; lookups ignore case.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    by_alias: AHashMap<String, Arc<FilterAlias>>,
}

impl FilterRegistry {
    /// Parse every definition against `ctx`. Definitions that fail to parse
    /// are dropped.
    pub fn load(definitions: &[FilterDefinition], ctx: &QueryContext) -> FilterRegistry {
        let mut by_alias = AHashMap::new();
        for def in definitions {
            match QueryTree::parse(&def.raw, ctx) {
                Ok(tree) => {
                    let filter = FilterAlias {
                        alias: def.alias.clone(),
                        raw: def.raw.clone(),
                        pref_label_by_lang: def.pref_label_by_lang.clone(),
                        parsed: tree.root().clone(),
                    };
                    by_alias.insert(def.alias.to_lowercase(), Arc::new(filter));
                }
                Err(e) => warn!(alias = %def.alias, raw = %def.raw, error = %e, "dropping filter"),
            }
        }
        debug!(filters = by_alias.len(), "filters loaded");
        FilterRegistry { by_alias }
    }

    pub fn get(&self, alias: &str) -> Option<&Arc<FilterAlias>> {
        self.by_alias.get(&alias.to_lowercase())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.by_alias.contains_key(&alias.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }
}
