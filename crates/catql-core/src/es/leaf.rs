//! One expanded leaf → one engine clause.

use super::dsl;
use super::freetext::{text_query, Target};
use crate::context::QueryContext;
use crate::node::{Condition, FreeText, Node};
use crate::selector::Selector;
use crate::value::{QueryDate, Value};
use catql_dsl::{Connective, Operator};
use catql_vocab::mappings::{FOUR_DIGITS_KEYWORD, FOUR_DIGITS_SHORT, KEYWORD};
use serde_json::{json, Value as Json};
use tracing::warn;

/// Clause for a leaf outside any nested group. A condition on a nested field
/// that is not copied into its parent is wrapped in `nested` on its own.
pub(crate) fn leaf_query(node: &Node, ctx: &QueryContext) -> Json {
    match node {
        Node::Condition(c) => {
            let stem = ctx
                .mappings
                .nested_stem(&c.selector.es_field())
                .filter(|stem| ctx.mappings.is_nested_not_in_parent_field(stem));
            match stem {
                Some(stem) if c.operator == Operator::NotEquals => {
                    dsl::must_not(dsl::nested(&stem, core_query(&c.with_operator(Operator::Equals), ctx)))
                }
                Some(stem) => dsl::nested(&stem, core_query(c, ctx)),
                None => condition_query(c, ctx),
            }
        }
        Node::FreeText(ft) => free_text_query(ft, ctx),
        Node::Any(_) => dsl::match_all(),
        other => {
            // Groups, negations and filters are gone by the time leaves are compiled.
            warn!(node = %other.to_query_string(false), "unexpected leaf, matching nothing");
            dsl::nonsense_filter()
        }
    }
}

/// `NOT_EQUALS` is the negation of the `EQUALS` clause.
pub(crate) fn condition_query(c: &Condition, ctx: &QueryContext) -> Json {
    if c.operator == Operator::NotEquals {
        dsl::must_not(core_query(&c.with_operator(Operator::Equals), ctx))
    } else {
        core_query(c, ctx)
    }
}

pub(crate) fn free_text_query(ft: &FreeText, ctx: &QueryContext) -> Json {
    let boost = &ctx.settings.boost.field_boost;
    match &ft.property {
        Some(p) => {
            let field = Selector::Property(p.clone()).es_field();
            text_query(&ft.terms(), ft.connective, ft.negated, Target::Field(&field), boost)
        }
        None => text_query(&ft.terms(), ft.connective, ft.negated, Target::Boosted, boost),
    }
}

/// Clause for a condition, without nested wrapping. `NOT_EQUALS` is handled
/// by the callers.
pub(crate) fn core_query(c: &Condition, ctx: &QueryContext) -> Json {
    let field = c.selector.es_field();
    let op = c.operator;

    if !c.selector.is_valid() {
        warn!(key = %c.selector.query_key(), "unrecognized key, matching nothing");
        return dsl::nonsense_filter();
    }
    if op.is_range() && !c.value.is_range_compatible() {
        warn!(condition = %Node::Condition(c.clone()).to_query_string(false), "range against a non-range value, matching nothing");
        return dsl::nonsense_filter();
    }

    let emitter = Emitter { ctx, field: &field, op };
    match &c.value {
        Value::Wildcard => dsl::exists(&field),
        Value::Link { iri, .. } => dsl::term(&field, iri.as_str()),
        Value::VocabTerm { key, .. } => dsl::term(&field, key.as_str()),
        Value::Numeric { value, token } => emitter.numeric(*value, &token.value),
        Value::DateTime { date, token } => emitter.date(date, &token.value),
        Value::YearRange { min, max, token } => emitter.year_range(*min, *max, &token.value),
        Value::Literal(_) | Value::FreeText { .. } => {
            let (terms, connective) = c.value.text_terms();
            emitter.text(&terms, connective)
        }
        Value::Invalid { token, .. } => {
            warn!(field = %field, value = %token.value, "invalid value, matching nothing");
            dsl::nonsense_filter()
        }
    }
}

struct Emitter<'a> {
    ctx: &'a QueryContext,
    field: &'a str,
    op: Operator,
}

impl Emitter<'_> {
    fn text(&self, terms: &[String], connective: Connective) -> Json {
        let boost = &self.ctx.settings.boost.field_boost;
        text_query(terms, connective, false, Target::Field(self.field), boost)
    }

    /// `term` for equality, `range` otherwise.
    fn term_or_range(&self, field: &str, value: Json) -> Json {
        match self.op.range_key() {
            Some(bound) => dsl::range(field, json!({ bound: value })),
            None => dsl::term(field, value),
        }
    }

    fn numeric(&self, value: i64, raw: &str) -> Json {
        let mappings = &self.ctx.mappings;
        let field = self.field;

        if self.op.is_range() && mappings.has_four_digits_short_field(field) {
            return self.term_or_range(&format!("{field}.{FOUR_DIGITS_SHORT}"), json!(value));
        }
        if !self.op.is_range() {
            let sentinel = self.ctx.settings.four_digit_sentinels.iter().any(|s| s == raw);
            if mappings.has_four_digits_keyword_field(field) && raw.chars().count() == 4 && !sentinel {
                return dsl::term(&format!("{field}.{FOUR_DIGITS_KEYWORD}"), raw);
            }
            if mappings.has_keyword_subfield(field) {
                return dsl::term(&format!("{field}.{KEYWORD}"), raw);
            }
        }
        if mappings.is_long_field(field) {
            return self.term_or_range(field, json!(value));
        }
        self.text(&[raw.to_string()], Connective::And)
    }

    /// Equality covers the whole period the date names (`2020` is all of 2020).
    fn date(&self, date: &QueryDate, raw: &str) -> Json {
        if !self.ctx.mappings.is_date_field(self.field) {
            return self.text(&[raw.to_string()], Connective::And);
        }
        let rounded = date.date_math();
        match self.op.range_key() {
            Some(bound) => dsl::range(self.field, json!({ bound: rounded })),
            None => dsl::range(self.field, json!({ "gte": rounded, "lte": rounded })),
        }
    }

    fn year_range(&self, min: Option<u16>, max: Option<u16>, raw: &str) -> Json {
        let mappings = &self.ctx.mappings;
        let field = self.field;

        let bounds = |f: &dyn Fn(u16) -> Json| {
            let mut bounds = serde_json::Map::new();
            if let Some(min) = min {
                bounds.insert("gte".to_string(), f(min));
            }
            if let Some(max) = max {
                bounds.insert("lte".to_string(), f(max));
            }
            Json::Object(bounds)
        };

        if mappings.has_four_digits_short_field(field) {
            return dsl::range(&format!("{field}.{FOUR_DIGITS_SHORT}"), bounds(&|y| json!(y)));
        }
        if mappings.is_date_field(field) {
            return dsl::range(field, bounds(&|y| json!(format!("{y:04}||/y"))));
        }
        self.text(&[raw.to_string()], Connective::And)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::test_support::{context, tree};

    /// Clause for the single leaf `q` expands to.
    fn compiled(q: &str) -> Json {
        let ctx = context();
        let expanded = expand(&tree(q), &ctx);
        leaf_query(expanded.root(), &ctx)
    }

    #[test]
    fn links_and_terms() {
        assert_eq!(
            compiled("subject:\"sao:Fiction\""),
            json!({ "bool": { "filter": { "term": { "subject.@id": "https://id.kb.se/term/sao/Fiction" } } } })
        );
        assert_eq!(
            compiled("type:Print"),
            json!({ "bool": { "filter": { "term": { "@type": "Print" } } } })
        );
    }

    #[test]
    fn wildcards_test_existence() {
        assert_eq!(compiled("title:*"), json!({ "exists": { "field": "title" } }));
        assert_eq!(
            compiled("NOT title:*"),
            json!({ "bool": { "must_not": { "exists": { "field": "title" } } } })
        );
    }

    #[test]
    fn years_use_four_digit_subfields() {
        assert_eq!(
            compiled("year:2020"),
            json!({ "bool": { "filter": { "term": { "year.four_digits_keyword": "2020" } } } })
        );
        assert_eq!(
            compiled("year>=2000"),
            json!({ "bool": { "filter": { "range": { "year.four_digits_short": { "gte": 2000 } } } } })
        );
        assert_eq!(
            compiled("year:1990-2000"),
            json!({ "bool": { "filter": { "range": { "year.four_digits_short": { "gte": 1990, "lte": 2000 } } } } })
        );
        // Sentinels are not years.
        assert!(compiled("year:9999")["simple_query_string"].is_object());
    }

    #[test]
    fn dates_round_to_their_granularity() {
        assert_eq!(
            compiled("created:2020-01"),
            json!({ "bool": { "filter": { "range": { "meta.created": { "gte": "2020-01||/M", "lte": "2020-01||/M" } } } } })
        );
        assert_eq!(
            compiled("created<2020"),
            json!({ "bool": { "filter": { "range": { "meta.created": { "lt": "2020||/y" } } } } })
        );
    }

    #[test]
    fn long_fields_take_numeric_terms() {
        assert_eq!(
            compiled("reverseLinks.totalItems>5"),
            json!({ "bool": { "filter": { "range": { "reverseLinks.totalItems": { "gt": 5 } } } } })
        );
    }

    #[test]
    fn void_clauses_match_nothing() {
        assert_eq!(compiled("lang>eng"), dsl::nonsense_filter());
    }

    #[test]
    fn lone_nested_conditions_are_wrapped() {
        let q = compiled("identifiedBy.value:123");
        assert_eq!(q["nested"]["path"], "identifiedBy");
        assert_eq!(
            q["nested"]["query"],
            json!({ "bool": { "filter": { "term": { "identifiedBy.value.keyword": "123" } } } })
        );
        let q = compiled("identifiedBy.value!=123");
        assert_eq!(q["bool"]["must_not"]["nested"]["path"], "identifiedBy");
    }
}
