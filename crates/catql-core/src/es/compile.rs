use super::boost;
use super::dsl;
use super::leaf::{condition_query, core_query, leaf_query};
use crate::context::QueryContext;
use crate::expand::ExpandedQueryTree;
use crate::facets::SelectedFacets;
use crate::node::{Node, NodePath};
use catql_dsl::{Connective, Operator};
use catql_vocab::FieldMappings;
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;
use tracing::debug;

/// The expanded tree regrouped the way the engine is queried.
#[derive(Debug, Clone, PartialEq)]
pub enum EsNode {
    And(Vec<EsNode>),
    Or(Vec<EsNode>),
    Not(Box<EsNode>),
    /// Conditions matched together within one nested document.
    Nested { stem: String, children: Vec<EsNode> },
    /// An expanded leaf and its path in the expanded tree.
    Leaf { node: Node, path: NodePath },
}

impl EsNode {
    fn build(node: &Node, path: NodePath, mappings: &dyn FieldMappings) -> EsNode {
        let children = |children: &[Node]| -> Vec<EsNode> {
            children
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let mut child = path.clone();
                    child.push(i);
                    EsNode::build(c, child, mappings)
                })
                .collect()
        };
        match node {
            Node::And(c) => collapse(group_nested(children(c), mappings)),
            Node::Or(c) => EsNode::Or(children(c)),
            Node::Not(inner) => {
                let mut child = path.clone();
                child.push(0);
                EsNode::Not(Box::new(EsNode::build(inner, child, mappings)))
            }
            leaf => EsNode::Leaf {
                node: leaf.clone(),
                path,
            },
        }
    }

    /// Paths of every leaf below, in order.
    pub fn leaf_paths(&self) -> Vec<&NodePath> {
        match self {
            EsNode::And(children) | EsNode::Or(children) | EsNode::Nested { children, .. } => {
                children.iter().flat_map(EsNode::leaf_paths).collect()
            }
            EsNode::Not(inner) => inner.leaf_paths(),
            EsNode::Leaf { path, .. } => vec![path],
        }
    }

    fn to_json(&self, ctx: &QueryContext) -> Json {
        match self {
            EsNode::And(children) => dsl::must(children.iter().map(|c| c.to_json(ctx)).collect()),
            EsNode::Or(children) => dsl::should(children.iter().map(|c| c.to_json(ctx)).collect()),
            EsNode::Not(inner) => dsl::must_not(inner.to_json(ctx)),
            EsNode::Nested { stem, children } => dsl::nested(stem, nested_bool(children, ctx)),
            EsNode::Leaf { node, .. } => leaf_query(node, ctx),
        }
    }

    /// Inside a nested query: conditions are not wrapped again.
    fn to_nested_json(&self, ctx: &QueryContext) -> Json {
        match self {
            EsNode::And(children) => dsl::must(children.iter().map(|c| c.to_nested_json(ctx)).collect()),
            EsNode::Or(children) => dsl::should(children.iter().map(|c| c.to_nested_json(ctx)).collect()),
            EsNode::Not(inner) => dsl::must_not(inner.to_nested_json(ctx)),
            EsNode::Nested { stem, children } => dsl::nested(stem, nested_bool(children, ctx)),
            EsNode::Leaf {
                node: Node::Condition(c),
                ..
            } => condition_query(c, ctx),
            EsNode::Leaf { node, .. } => leaf_query(node, ctx),
        }
    }
}

fn nested_bool(children: &[EsNode], ctx: &QueryContext) -> Json {
    let mut must = Vec::new();
    let mut must_not = Vec::new();
    for child in children {
        match child {
            EsNode::Leaf {
                node: Node::Condition(c),
                ..
            } if c.operator == Operator::NotEquals => {
                must_not.push(core_query(&c.with_operator(Operator::Equals), ctx));
            }
            EsNode::Not(inner) => must_not.push(inner.to_nested_json(ctx)),
            other => must.push(other.to_nested_json(ctx)),
        }
    }
    let mut body = Map::new();
    if !must.is_empty() {
        body.insert("must".to_string(), Json::Array(must));
    }
    if !must_not.is_empty() {
        body.insert("must_not".to_string(), Json::Array(must_not));
    }
    json!({ "bool": body })
}

/// The nested field `node` lives in, if all of it lives in one.
fn stem(node: &EsNode, mappings: &dyn FieldMappings) -> Option<String> {
    match node {
        EsNode::Leaf {
            node: Node::Condition(c),
            ..
        } => mappings.nested_stem(&c.selector.es_field()),
        EsNode::Leaf { .. } => None,
        EsNode::Nested { stem, .. } => Some(stem.clone()),
        EsNode::Not(inner) => stem(inner, mappings),
        EsNode::And(children) | EsNode::Or(children) => {
            let mut stems = children.iter().map(|c| stem(c, mappings));
            let first = stems.next()??;
            stems.all(|s| s.as_deref() == Some(first.as_str())).then_some(first)
        }
    }
}

/// Gather conjuncts sharing a nested stem into one `Nested` at the position
/// of the first of them.
fn group_nested(children: Vec<EsNode>, mappings: &dyn FieldMappings) -> Vec<EsNode> {
    let stems: Vec<Option<String>> = children.iter().map(|c| stem(c, mappings)).collect();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in stems.iter().flatten() {
        *counts.entry(s.as_str()).or_default() += 1;
    }

    let mut out: Vec<EsNode> = Vec::with_capacity(children.len());
    let mut placed: BTreeMap<String, usize> = BTreeMap::new();
    for (child, stem) in children.into_iter().zip(stems.iter()) {
        let shared = stem.as_deref().filter(|s| counts.get(s).copied().unwrap_or(0) > 1);
        let Some(stem) = shared else {
            out.push(child);
            continue;
        };
        let member = match child {
            EsNode::Nested { children, .. } => children,
            other => vec![other],
        };
        match placed.get(stem) {
            Some(&i) => {
                if let EsNode::Nested { children, .. } = &mut out[i] {
                    children.extend(member);
                }
            }
            None => {
                placed.insert(stem.to_string(), out.len());
                out.push(EsNode::Nested {
                    stem: stem.to_string(),
                    children: member,
                });
            }
        }
    }
    out
}

fn collapse(mut children: Vec<EsNode>) -> EsNode {
    if children.len() == 1 {
        children.remove(0)
    } else {
        EsNode::And(children)
    }
}

/// A compiled query: the main query plus the post filter holding the
/// multi-select and radio facet selections.
#[derive(Debug, Clone, PartialEq)]
pub struct EsQueryTree {
    /// `None` matches everything.
    pub main: Option<EsNode>,
    pub post_filter: Option<EsNode>,
    es: Json,
}

impl EsQueryTree {
    pub fn compile(expanded: &ExpandedQueryTree, ctx: &QueryContext, selected: &SelectedFacets) -> EsQueryTree {
        let mappings = ctx.mappings.as_ref();
        let root = EsNode::build(expanded.root(), Vec::new(), mappings);

        // Expanded paths of each post-filtered selection, with its connective.
        let selections: Vec<(Connective, Vec<&NodePath>)> = selected
            .multi_or_radio_selected()
            .map(|(_, selection)| {
                let paths = selection
                    .paths
                    .iter()
                    .flat_map(|p| expanded.expanded_paths(p))
                    .collect();
                (selection.connective, paths)
            })
            .collect();

        let top_level = match root {
            EsNode::And(children) => children,
            other => vec![other],
        };

        let mut main = Vec::new();
        let mut by_selection: Vec<Vec<EsNode>> = vec![Vec::new(); selections.len()];
        for node in top_level {
            let selection = selections.iter().position(|(_, targets)| {
                node.leaf_paths()
                    .iter()
                    .any(|leaf| targets.iter().any(|t| leaf.starts_with(t)))
            });
            match selection {
                Some(i) => by_selection[i].push(node),
                None => main.push(node),
            }
        }

        let post_filter: Vec<EsNode> = by_selection
            .into_iter()
            .zip(selections.iter().map(|(connective, _)| *connective))
            .filter(|(nodes, _)| !nodes.is_empty())
            .map(|(mut nodes, connective)| match connective {
                _ if nodes.len() == 1 => nodes.remove(0),
                Connective::Or => EsNode::Or(nodes),
                Connective::And => EsNode::And(nodes),
            })
            .collect();
        let post_filter = (!post_filter.is_empty()).then(|| collapse(post_filter));
        let main = (!main.is_empty()).then(|| collapse(main));

        let query = match &main {
            Some(main) => main.to_json(ctx),
            None => dsl::match_all(),
        };
        let mut es = json!({ "query": boost::apply(query, &ctx.settings.boost) });
        if let (Some(pf), Some(map)) = (&post_filter, es.as_object_mut()) {
            map.insert("post_filter".to_string(), pf.to_json(ctx));
        }
        debug!(post_filtered = post_filter.is_some(), "query compiled");

        EsQueryTree { main, post_filter, es }
    }

    /// `{"query": ..., "post_filter": ...}`
    pub fn to_es(&self) -> Json {
        self.es.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::test_support::{context, tree};

    fn compiled(q: &str) -> EsQueryTree {
        let ctx = context();
        let t = tree(q);
        let selected = SelectedFacets::from_tree(&t, &ctx.settings.facets);
        EsQueryTree::compile(&expand(&t, &ctx), &ctx, &selected)
    }

    fn count_key(json: &Json, key: &str) -> usize {
        match json {
            Json::Object(map) => map
                .iter()
                .map(|(k, v)| usize::from(k == key) + count_key(v, key))
                .sum(),
            Json::Array(items) => items.iter().map(|v| count_key(v, key)).sum(),
            _ => 0,
        }
    }

    #[test]
    fn conditions_on_one_nested_field_share_a_nested_query() {
        let es = compiled("identifiedBy.value:123 identifiedBy.@type:ISBN").to_es();
        assert_eq!(count_key(&es, "nested"), 1);
        assert_eq!(es["query"]["nested"]["path"], "identifiedBy");
        assert_eq!(
            es["query"]["nested"]["query"]["bool"]["must"].as_array().map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn negated_nested_members_go_to_must_not() {
        let es = compiled("hamlet identifiedBy.value:123 NOT identifiedBy.@type:ISBN").to_es();
        assert_eq!(count_key(&es, "nested"), 1);
        let nested = &es["query"]["bool"]["must"][1]["nested"]["query"]["bool"];
        assert_eq!(nested["must"].as_array().map(Vec::len), Some(1));
        assert_eq!(
            nested["must_not"][0],
            json!({ "bool": { "filter": { "term": { "identifiedBy.@type": "ISBN" } } } })
        );
    }

    #[test]
    fn restricted_properties_compile_to_one_nested_query() {
        let es = compiled("isbn:9789100123456").to_es();
        assert_eq!(count_key(&es, "nested"), 1);
    }

    #[test]
    fn selected_multi_select_facets_move_to_the_post_filter() {
        let q = compiled("hamlet type:Print lang:eng year>2000");
        let main = q.main.as_ref().expect("main query");
        assert_eq!(main.leaf_paths(), vec![&vec![0usize], &vec![3usize]]);
        let post = q.post_filter.as_ref().expect("post filter");
        assert_eq!(post.leaf_paths(), vec![&vec![2usize], &vec![1usize]]);
        assert!(q.to_es()["post_filter"]["bool"]["must"].is_array());
    }

    #[test]
    fn an_all_facet_query_matches_everything_before_filtering() {
        let q = compiled("type:Print");
        assert!(q.main.is_none());
        assert_eq!(q.to_es()["query"], json!({ "match_all": {} }));
        assert_eq!(
            q.to_es()["post_filter"],
            json!({ "bool": { "filter": { "term": { "@type": "Print" } } } })
        );
    }

    #[test]
    fn repeated_facet_conditions_stay_a_conjunction_in_the_main_query() {
        let q = compiled("lang:eng lang:swe");
        assert!(q.post_filter.is_none());
        let es = q.to_es();
        let must = es["query"]["bool"]["must"].as_array().expect("conjunction");
        assert_eq!(must.len(), 2);
        assert!(es["query"].to_string().contains("swe"));
        assert!(es["query"]["bool"]["should"].is_null());
    }

    #[test]
    fn one_or_group_of_facet_values_is_post_filtered() {
        let q = compiled("hamlet (lang:eng OR lang:swe)");
        let post = q.to_es()["post_filter"].clone();
        assert_eq!(post["bool"]["should"].as_array().map(Vec::len), Some(2));
        assert_eq!(q.main.as_ref().map(|m| m.leaf_paths().len()), Some(1));
    }

    #[test]
    fn or_runs_of_free_text_compile_to_a_disjunction() {
        let es = compiled("foo OR qux").to_es();
        let text = &es["query"]["bool"]["should"][0]["simple_query_string"];
        assert_eq!(text["query"], "foo | qux");
        assert_eq!(text["default_operator"], "AND");

        let es = compiled("title:(foo OR qux)").to_es();
        assert!(es.to_string().contains("\"query\":\"foo | qux\""));
    }

    #[test]
    fn empty_queries_match_all() {
        let q = compiled("");
        assert_eq!(q.to_es(), json!({ "query": { "match_all": {} } }));
    }
}
