//! Facet selections read off the top level of a query tree.

use crate::node::{Condition, Node, NodePath};
use crate::settings::FacetConfig;
use crate::tree::QueryTree;
use catql_dsl::{Connective, Operator};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub connective: Connective,
    pub radio: bool,
    /// Top-level paths of the selecting nodes, in tree order.
    pub paths: Vec<NodePath>,
}

impl Selection {
    /// Selections that narrow results without hiding sibling facet values.
    pub fn is_multi_or_radio(&self) -> bool {
        self.radio || self.connective == Connective::Or
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedFacets {
    /// Property key → selection.
    pub by_property: BTreeMap<String, Selection>,
}

impl SelectedFacets {
    /// A facet property is selected when the top level holds every condition
    /// on it: either one `Or` of equals conditions, or plain conditions that
    /// are all equals (or range, for range facets). Several plain conditions
    /// are a conjunction and stay out of the post filter.
    pub fn from_tree(tree: &QueryTree, facets: &[FacetConfig]) -> SelectedFacets {
        let mut by_property: BTreeMap<String, Selection> = BTreeMap::new();
        let top_level = tree.top_level_nodes();
        for facet in facets {
            let total = tree
                .root()
                .walk()
                .into_iter()
                .filter(|(_, n)| on_property(n, &facet.property).is_some())
                .count();
            if total == 0 {
                continue;
            }

            let selected: Vec<NodePath> = top_level
                .iter()
                .filter(|(_, n)| selects(n, facet))
                .map(|(p, _)| p.clone())
                .collect();
            let multi: Vec<(&NodePath, usize)> = top_level
                .iter()
                .filter_map(|(p, n)| match n {
                    Node::Or(children) if children.iter().all(|c| is_equals_on(c, &facet.property)) => {
                        Some((p, children.len()))
                    }
                    _ => None,
                })
                .collect();

            let selection = match (selected.len(), multi.as_slice()) {
                (0, [(path, members)]) if *members == total => Selection {
                    connective: Connective::Or,
                    radio: facet.radio,
                    paths: vec![(*path).clone()],
                },
                (n, []) if n == total => Selection {
                    connective: if n == 1 { facet.connective } else { Connective::And },
                    radio: facet.radio,
                    paths: selected,
                },
                _ => continue,
            };
            by_property.insert(facet.property.clone(), selection);
        }
        SelectedFacets { by_property }
    }

    pub fn is_empty(&self) -> bool {
        self.by_property.is_empty()
    }

    pub fn get(&self, property: &str) -> Option<&Selection> {
        self.by_property.get(property)
    }

    pub fn multi_or_radio_selected(&self) -> impl Iterator<Item = (&str, &Selection)> {
        self.by_property
            .iter()
            .filter(|(_, s)| s.is_multi_or_radio() && !s.paths.is_empty())
            .map(|(property, s)| (property.as_str(), s))
    }

    /// Every selected top-level path.
    pub fn paths(&self) -> impl Iterator<Item = &NodePath> {
        self.by_property.values().flat_map(|s| s.paths.iter())
    }
}

/// The condition in `node` on `property` alone, if any.
fn on_property<'a>(node: &'a Node, property: &str) -> Option<&'a Condition> {
    let c = node.as_condition()?;
    let p = c.selector.last_property()?;
    (c.selector.elements().len() == 1 && p.key() == property).then_some(c)
}

fn is_equals_on(node: &Node, property: &str) -> bool {
    on_property(node, property).is_some_and(|c| c.operator == Operator::Equals)
}

fn selects(node: &Node, facet: &FacetConfig) -> bool {
    on_property(node, &facet.property).is_some_and(|c| match c.operator {
        Operator::Equals => true,
        op => facet.range && op.is_range(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, tree};

    fn selected(q: &str) -> SelectedFacets {
        SelectedFacets::from_tree(&tree(q), &context().settings.facets)
    }

    #[test]
    fn conditions_on_facet_properties_are_selected() {
        let facets = selected("hamlet type:Print lang:eng");
        assert_eq!(facets.get("rdf:type").map(|s| s.paths.clone()), Some(vec![vec![1]]));
        assert_eq!(facets.get("language").map(|s| s.paths.clone()), Some(vec![vec![2]]));
        assert_eq!(facets.paths().count(), 2);
    }

    #[test]
    fn or_groups_of_one_property_are_selected() {
        let facets = selected("hamlet (lang:eng OR lang:swe)");
        assert_eq!(facets.get("language").map(|s| s.paths.clone()), Some(vec![vec![1]]));

        let facets = selected("hamlet (lang:eng OR type:Print)");
        assert!(facets.is_empty());
    }

    #[test]
    fn range_conditions_select_range_facets() {
        assert!(selected("hamlet year>2000").get("year").is_some());
        assert!(selected("hamlet lang>eng").get("language").is_none());
    }

    #[test]
    fn negated_and_path_conditions_are_not_selections() {
        assert!(selected("hamlet NOT lang:eng").is_empty());
        assert!(selected("instanceOf.lang:eng").is_empty());
    }

    #[test]
    fn radio_and_or_facets_are_reported_together() {
        let facets = selected("type:Print carrierType:Online year>2000");
        let reported: Vec<&str> = facets.multi_or_radio_selected().map(|(p, _)| p).collect();
        assert_eq!(reported, vec!["carrierType", "rdf:type"]);
    }

    #[test]
    fn repeated_conditions_on_one_property_are_a_conjunction() {
        let facets = selected("lang:eng lang:swe");
        let language = facets.get("language").expect("selected");
        assert_eq!(language.connective, Connective::And);
        assert_eq!(language.paths, vec![vec![0], vec![1]]);
        assert_eq!(facets.multi_or_radio_selected().count(), 0);
    }

    #[test]
    fn properties_also_used_elsewhere_are_not_selected() {
        assert!(selected("(lang:eng OR lang:swe) lang:eng").get("language").is_none());
        assert!(selected("lang:eng NOT lang:swe").get("language").is_none());
        assert!(selected("(lang:eng OR lang:swe) (lang:eng OR type:Print)").get("language").is_none());
    }
}
