use crate::filter::FilterRegistry;
use crate::settings::Settings;
use catql_vocab::{FieldMappings, Vocabulary};
use std::sync::Arc;

/// Everything a query is interpreted against. Immutable once built.
#[derive(Clone)]
pub struct QueryContext {
    pub vocab: Arc<dyn Vocabulary>,
    pub mappings: Arc<dyn FieldMappings>,
    pub filters: FilterRegistry,
    pub settings: Settings,
}

impl QueryContext {
    /// Filters are parsed against the context without any filters, so a
    /// filter cannot refer to another.
    pub fn new(
        vocab: Arc<dyn Vocabulary>,
        mappings: Arc<dyn FieldMappings>,
        settings: Settings,
    ) -> QueryContext {
        let mut ctx = QueryContext {
            vocab,
            mappings,
            filters: FilterRegistry::default(),
            settings,
        };
        ctx.filters = FilterRegistry::load(&ctx.settings.filters, &ctx);
        ctx
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("filters", &self.filters)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
