//! Search mapping: a JSON description of a query tree node for rendering the
//! current query, where every node carries an `up` link to the same search
//! without it.

use crate::context::QueryContext;
use crate::expand::ExpandedQueryTree;
use crate::node::{Node, NodePath};
use crate::selector::Selector;
use crate::tree::QueryTree;
use crate::util::find_url;
use catql_dsl::Operator;
use catql_vocab::model::ID_KEY;
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;

/// Non-query request parameters carried over into up links.
pub type LinkParams = BTreeMap<String, String>;

pub struct SearchMapping;

impl SearchMapping {
    /// Description of the node at `path`; `null` when there is none.
    pub fn describe(tree: &QueryTree, path: &[usize], params: &LinkParams, ctx: &QueryContext) -> Json {
        let up = |p: &[usize]| up_link(tree, p, params);
        Describer { ctx, up: &up }.describe(tree.root(), path.to_vec())
    }

    /// Description of an expanded node. Up links remove the original node it
    /// came from.
    pub fn describe_expanded(
        expanded: &ExpandedQueryTree,
        path: &[usize],
        params: &LinkParams,
        ctx: &QueryContext,
    ) -> Json {
        let up = |p: &[usize]| match expanded.original_path(p) {
            Some(original) => up_link(&expanded.original, &original, params),
            None => json!({ ID_KEY: find_url(&expanded.original.to_query_string(), params) }),
        };
        Describer { ctx, up: &up }.describe(expanded.root(), path.to_vec())
    }
}

fn up_link(tree: &QueryTree, path: &[usize], params: &LinkParams) -> Json {
    let reduced = tree.exclude(path);
    json!({ ID_KEY: find_url(&reduced.tree.to_query_string(), params) })
}

struct Describer<'a> {
    ctx: &'a QueryContext,
    up: &'a dyn Fn(&[usize]) -> Json,
}

impl Describer<'_> {
    fn describe(&self, root: &Node, path: NodePath) -> Json {
        let Some(node) = root.at(&path) else {
            return Json::Null;
        };
        let up = (self.up)(&path);
        let child = |i: usize| {
            let mut p = path.clone();
            p.push(i);
            self.describe(root, p)
        };

        match node {
            Node::And(children) | Node::Or(children) => {
                let key = node.connective().map_or("and", |c| c.key());
                let described: Vec<Json> = (0..children.len()).map(child).collect();
                json!({ key: described, "up": up })
            }
            Node::Not(_) => json!({ "not": child(0), "up": up }),
            Node::Condition(c) => {
                let mut m = Map::new();
                m.insert("property".to_string(), self.selector(&c.selector));
                m.insert(c.operator.term_key().to_string(), c.value.describe());
                m.insert("up".to_string(), up);
                m.insert("_key".to_string(), json!(c.selector.query_key()));
                m.insert("_value".to_string(), json!(c.value.query_form()));
                Json::Object(m)
            }
            Node::FreeText(ft) => {
                let property = match &ft.property {
                    Some(p) => self.selector(&Selector::Property(p.clone())),
                    None => self.free_text_definition(),
                };
                let operator = if ft.negated { Operator::NotEquals } else { Operator::Equals };
                let mut m = Map::new();
                m.insert("property".to_string(), property);
                m.insert(operator.term_key().to_string(), json!(ft.text()));
                m.insert("up".to_string(), up);
                Json::Object(m)
            }
            Node::ActiveFilter(filter) => json!({
                "object": filter.description(),
                "value": filter.alias,
                "up": up,
            }),
            Node::InactiveFilter(filter) => json!({
                "not": { "object": filter.description(), "value": filter.alias },
                "up": up,
            }),
            Node::Any(kind) => json!({ "any": kind.as_str(), "up": up }),
        }
    }

    fn selector(&self, selector: &Selector) -> Json {
        match selector {
            Selector::Key(key) => json!({ ID_KEY: key.name() }),
            Selector::Property(p) => {
                let description = self.ctx.vocab.term_description(p.key());
                if p.reversed {
                    json!({ "inverseOf": description })
                } else {
                    description
                }
            }
            Selector::Path(elements) => {
                let chain: Vec<Json> = elements.iter().map(|e| self.selector(e)).collect();
                json!({ "propertyChainAxiom": [{ "@list": chain }] })
            }
        }
    }

    fn free_text_definition(&self) -> Json {
        json!({
            ID_KEY: format!("{}textQuery", self.ctx.vocab.base()),
            "@type": "DatatypeProperty",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::test_support::{context, tree};

    fn params() -> LinkParams {
        BTreeMap::from([("_limit".to_string(), "20".to_string())])
    }

    #[test]
    fn up_links_drop_the_described_node() {
        let ctx = context();
        let t = tree("title:Hamlet AND lang:eng");
        let lang = SearchMapping::describe(&t, &[1], &params(), &ctx);
        assert_eq!(lang["up"]["@id"], "/find?_q=title:Hamlet&_limit=20");
        assert_eq!(lang["property"]["@id"], "https://id.kb.se/vocab/language");
        assert_eq!(lang["equals"]["@id"], "https://id.kb.se/vocab/eng");
        assert_eq!(lang["_key"], "lang");
        assert_eq!(lang["_value"], "eng");

        let root = SearchMapping::describe(&t, &[], &params(), &ctx);
        assert_eq!(root["and"].as_array().map(Vec::len), Some(2));
        assert_eq!(root["up"]["@id"], "/find?_q=*&_limit=20");
        assert_eq!(SearchMapping::describe(&t, &[7], &params(), &ctx), Json::Null);
    }

    #[test]
    fn negations_filters_and_free_text() {
        let ctx = context();
        let t = tree("hamlet NOT title:x NOT onlineOnly");
        let free = SearchMapping::describe(&t, &[0], &params(), &ctx);
        assert_eq!(free["equals"], "hamlet");
        assert_eq!(free["property"]["@id"], "https://id.kb.se/vocab/textQuery");

        let not = SearchMapping::describe(&t, &[1], &params(), &ctx);
        assert_eq!(not["not"]["_key"], "title");
        assert_eq!(not["up"]["@id"], "/find?_q=hamlet+NOT+onlineOnly&_limit=20");

        let filter = SearchMapping::describe(&t, &[2], &params(), &ctx);
        assert_eq!(filter["not"]["value"], "onlineOnly");
        assert_eq!(filter["not"]["object"]["parsedFilter"], "carrierType:Online");
    }

    #[test]
    fn expanded_nodes_link_up_through_their_original() {
        let ctx = context();
        let t = tree("title:x NOT type:Instance");
        let expanded = expand(&t, &ctx);
        // One of the three negated types the negation became.
        let described = SearchMapping::describe_expanded(&expanded, &[2], &params(), &ctx);
        assert_eq!(described["notEquals"]["@id"], "https://id.kb.se/vocab/Instance");
        assert_eq!(described["up"]["@id"], "/find?_q=title:x&_limit=20");
    }

    #[test]
    fn paths_describe_as_property_chains() {
        let ctx = context();
        let t = tree("@reverse.instanceOf.title:x");
        let described = SearchMapping::describe(&t, &[], &params(), &ctx);
        let chain = &described["property"]["propertyChainAxiom"][0]["@list"];
        assert_eq!(chain[0]["inverseOf"]["@id"], "https://id.kb.se/vocab/instanceOf");
        assert_eq!(chain[1]["@id"], "https://id.kb.se/vocab/title");
    }
}
