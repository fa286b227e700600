mod common;

use catql_core::{expand, EsQueryTree, NodePath, QueryTree, SelectedFacets};
use common::{context, query, tree};
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn rebuilding_the_query_string_gives_the_same_tree(q in query()) {
        let ctx = context();
        let built = tree(&q, &ctx);
        let rebuilt = QueryTree::parse(&built.to_query_string(), &ctx).expect("re-serialized query parses");
        prop_assert_eq!(rebuilt, built);
    }

    #[test]
    fn double_negation_is_identity(q in query().prop_filter("non-empty", |q| !q.trim().is_empty())) {
        let ctx = context();
        let doubled = tree(&format!("NOT (NOT ({q}))"), &ctx);
        prop_assert_eq!(doubled, tree(&q, &ctx));
    }

    #[test]
    fn main_query_and_post_filter_partition_the_leaves(q in query()) {
        let ctx = context();
        let t = tree(&q, &ctx);
        let expanded = expand(&t, &ctx);
        let selected = SelectedFacets::from_tree(&t, &ctx.settings.facets);
        let compiled = EsQueryTree::compile(&expanded, &ctx, &selected);

        let main: Vec<&NodePath> = compiled.main.as_ref().map(|n| n.leaf_paths()).unwrap_or_default();
        let post: Vec<&NodePath> = compiled.post_filter.as_ref().map(|n| n.leaf_paths()).unwrap_or_default();
        let main: BTreeSet<&NodePath> = main.into_iter().collect();
        let post: BTreeSet<&NodePath> = post.into_iter().collect();
        prop_assert!(main.is_disjoint(&post));

        let leaves: BTreeSet<NodePath> = expanded
            .root()
            .walk()
            .into_iter()
            .filter(|(_, node)| node.children().is_empty())
            .map(|(path, _)| path)
            .collect();
        let union: BTreeSet<NodePath> = main.union(&post).map(|p| (*p).clone()).collect();
        // An empty tree compiles to match_all with no leaves kept.
        if compiled.main.is_some() || compiled.post_filter.is_some() {
            prop_assert_eq!(union, leaves);
        }
    }
}

#[test]
fn filter_toggling_survives_nesting() {
    let ctx = context();
    assert_eq!(tree("NOT (NOT (onlineOnly))", &ctx), tree("onlineOnly", &ctx));
    assert_eq!(tree("NOT (NOT (NOT onlineOnly))", &ctx), tree("NOT onlineOnly", &ctx));
}
