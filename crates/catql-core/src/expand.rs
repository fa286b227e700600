//! Canonical tree → expanded tree.
//!
//! Expansion rewrites each condition into what the index can answer:
//! - alternate selectors through integral relations (`instanceOf.language`)
//!   and the record prefix for record-only properties;
//! - shorthand, composite, inverse and restricted properties substituted by
//!   what they stand for, and plain properties broadened to their
//!   sub-properties;
//! - `@id`/`_str` suffixes on object properties;
//! - types broadened to their subclasses.
//!
//! Every original node path maps to the expanded path(s) it became.

use crate::context::QueryContext;
use crate::node::{AnyKind, Condition, Node, NodePath};
use crate::selector::{Key, Property, Selector};
use crate::tree::QueryTree;
use crate::value::Value;
use catql_dsl::{Connective, Operator, Token};
use catql_vocab::model::{PropertyDef, PropertyKind, Restriction, ID_KEY, SEARCH_KEY};
use catql_vocab::{is_iri, Mapping};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedQueryTree {
    pub tree: QueryTree,
    pub original: QueryTree,
    /// Original node path → expanded node paths.
    pub node_map: BTreeMap<NodePath, Vec<NodePath>>,
}

impl ExpandedQueryTree {
    pub fn root(&self) -> &Node {
        self.tree.root()
    }

    pub fn expanded_paths(&self, original: &[usize]) -> &[NodePath] {
        self.node_map.get(original).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The original node an expanded node came from: the most specific
    /// original path mapped to `expanded` or, failing that, to its nearest
    /// mapped ancestor.
    pub fn original_path(&self, expanded: &[usize]) -> Option<NodePath> {
        (0..=expanded.len()).rev().find_map(|len| {
            let prefix = &expanded[..len];
            self.node_map
                .iter()
                .filter(|(_, targets)| targets.iter().any(|t| t.as_slice() == prefix))
                .map(|(original, _)| original)
                .max_by_key(|original| original.len())
                .cloned()
        })
    }
}

pub fn expand(tree: &QueryTree, ctx: &QueryContext) -> ExpandedQueryTree {
    let expander = Expander { ctx, track: true };
    let root_types = ctx.settings.default_subject_types.clone();
    let draft = expander
        .expand_node(tree.root(), Vec::new(), &root_types)
        .unwrap_or_else(|| Draft::leaf(Node::Any(AnyKind::EmptyString)));

    let mut node_map = BTreeMap::new();
    let root = draft.finalize(Vec::new(), &mut node_map);
    let expanded = QueryTree::new(root);
    debug!(expanded = %expanded.to_query_string(), "query tree expanded");

    ExpandedQueryTree {
        tree: expanded,
        original: tree.clone(),
        node_map,
    }
}

// ============================================================================
// Drafts: expanded nodes that still know where they came from
// ============================================================================

#[derive(Debug)]
enum Shape {
    Group(Connective, Vec<Draft>),
    Not(Box<Draft>),
    Leaf(Node),
}

#[derive(Debug)]
struct Draft {
    shape: Shape,
    origins: Vec<NodePath>,
}

impl Draft {
    fn leaf(node: Node) -> Draft {
        Draft {
            shape: Shape::Leaf(node),
            origins: Vec::new(),
        }
    }

    /// Open up groups and negations of an already expanded node.
    fn from_node(node: Node) -> Draft {
        let shape = match node {
            Node::And(children) => Shape::Group(Connective::And, children.into_iter().map(Draft::from_node).collect()),
            Node::Or(children) => Shape::Group(Connective::Or, children.into_iter().map(Draft::from_node).collect()),
            Node::Not(inner) => Shape::Not(Box::new(Draft::from_node(*inner))),
            other => Shape::Leaf(other),
        };
        Draft {
            shape,
            origins: Vec::new(),
        }
    }

    fn with_origins(mut self, origins: impl IntoIterator<Item = NodePath>) -> Draft {
        self.origins.extend(origins);
        self
    }

    /// Splice same-connective children, collapse trivial groups, and keep
    /// every origin on some surviving draft.
    fn group(connective: Connective, children: Vec<Draft>, origins: Vec<NodePath>) -> Option<Draft> {
        let mut spliced = Vec::with_capacity(children.len());
        for Draft { shape, origins: child_origins } in children {
            match shape {
                Shape::Group(c, grandchildren) if c == connective => {
                    for grandchild in grandchildren {
                        spliced.push(grandchild.with_origins(child_origins.iter().cloned()));
                    }
                }
                shape => spliced.push(Draft {
                    shape,
                    origins: child_origins,
                }),
            }
        }
        match spliced.len() {
            0 => None,
            1 => spliced.pop().map(|only| only.with_origins(origins)),
            _ => Some(Draft {
                shape: Shape::Group(connective, spliced),
                origins,
            }),
        }
    }

    fn finalize(self, path: NodePath, map: &mut BTreeMap<NodePath, Vec<NodePath>>) -> Node {
        for origin in self.origins {
            map.entry(origin).or_default().push(path.clone());
        }
        match self.shape {
            Shape::Group(connective, children) => {
                let children = children
                    .into_iter()
                    .enumerate()
                    .map(|(i, child)| child.finalize(child_path(&path, i), map))
                    .collect();
                match connective {
                    Connective::And => Node::And(children),
                    Connective::Or => Node::Or(children),
                }
            }
            Shape::Not(inner) => Node::Not(Box::new(inner.finalize(child_path(&path, 0), map))),
            Shape::Leaf(node) => node,
        }
    }
}

fn child_path(path: &[usize], i: usize) -> NodePath {
    let mut child = path.to_vec();
    child.push(i);
    child
}

// ============================================================================
// Expander
// ============================================================================

struct Expander<'a> {
    ctx: &'a QueryContext,
    /// Off inside filters: their nodes have no original path of their own.
    track: bool,
}

impl Expander<'_> {
    fn origins(&self, paths: &[&NodePath]) -> Vec<NodePath> {
        if self.track {
            paths.iter().map(|p| (*p).clone()).collect()
        } else {
            Vec::new()
        }
    }

    fn expand_node(&self, node: &Node, path: NodePath, types: &[String]) -> Option<Draft> {
        match node {
            Node::And(children) => {
                let local = context_types(children);
                let types = if local.is_empty() { types.to_vec() } else { local };
                let drafts = children
                    .iter()
                    .enumerate()
                    .filter_map(|(i, c)| self.expand_node(c, child_path(&path, i), &types))
                    .collect();
                Draft::group(Connective::And, drafts, self.origins(&[&path]))
            }
            Node::Or(children) => {
                let drafts = children
                    .iter()
                    .enumerate()
                    .filter_map(|(i, c)| self.expand_node(c, child_path(&path, i), types))
                    .collect();
                Draft::group(Connective::Or, drafts, self.origins(&[&path]))
            }
            Node::Condition(c) => {
                let expanded = self.expand_condition(c, false, types);
                Some(Draft::from_node(expanded).with_origins(self.origins(&[&path])))
            }
            Node::Not(inner) => match inner.as_ref() {
                Node::Condition(c) => {
                    let expanded = self.expand_condition(c, true, types);
                    let inner_path = child_path(&path, 0);
                    Some(Draft::from_node(expanded).with_origins(self.origins(&[&path, &inner_path])))
                }
                Node::ActiveFilter(_) | Node::InactiveFilter(_) => None,
                other => {
                    let inner = self.expand_node(other, child_path(&path, 0), types)?;
                    Some(Draft {
                        shape: Shape::Not(Box::new(inner)),
                        origins: self.origins(&[&path]),
                    })
                }
            },
            Node::ActiveFilter(filter) => {
                let untracked = Expander {
                    ctx: self.ctx,
                    track: false,
                };
                let inner = untracked.expand_node(&filter.parsed, Vec::new(), types)?;
                Some(inner.with_origins(self.origins(&[&path])))
            }
            Node::InactiveFilter(_) => None,
            Node::FreeText(_) | Node::Any(_) => {
                Some(Draft::leaf(node.clone()).with_origins(self.origins(&[&path])))
            }
        }
    }

    fn expand_condition(&self, condition: &Condition, negated: bool, types: &[String]) -> Node {
        let mut alternatives = Vec::new();
        for selector in self.alternate_selectors(&condition.selector, types) {
            for (elements, prefilled) in self.substitute(&selector) {
                let elements = self.with_suffix(elements, &condition.value);
                let main = self.broaden_type(Condition::new(
                    Selector::from_elements(elements),
                    condition.operator,
                    condition.value.clone(),
                ));
                let mut conjuncts = vec![main];
                conjuncts.extend(prefilled.into_iter().map(Node::Condition));
                let alternative = Node::group(Connective::And, conjuncts);
                if !alternatives.contains(&alternative) {
                    alternatives.push(alternative);
                }
            }
        }
        let expanded = Node::group(Connective::Or, alternatives);
        if negated {
            negate(expanded)
        } else {
            expanded
        }
    }

    // ------------------------------------------------------------------------
    // Alternate selectors
    // ------------------------------------------------------------------------

    fn alternate_selectors(&self, selector: &Selector, types: &[String]) -> Vec<Selector> {
        let Some(first) = selector.first_property() else {
            return vec![selector.clone()];
        };
        if first.def.is_type() || first.reversed {
            return vec![selector.clone()];
        }
        let vocab = &self.ctx.vocab;
        let settings = &self.ctx.settings;
        let domain = &first.def.domain;

        if !domain.is_empty() && domain.iter().all(|d| vocab.is_sub_class_of(d, &settings.record_type)) {
            return vec![prepend(
                Selector::Key(Key::recognized(settings.record_key.as_str())),
                selector,
            )];
        }
        if domain.is_empty() || types.is_empty() {
            return vec![selector.clone()];
        }

        let may_appear_on = |class: &str| {
            domain
                .iter()
                .any(|d| vocab.is_sub_class_of(d, class) || vocab.is_sub_class_of(class, d))
        };

        let mut alternatives = Vec::new();
        if types.iter().any(|t| may_appear_on(t)) {
            alternatives.push(selector.clone());
        }

        let mut relations: BTreeSet<String> = types
            .iter()
            .flat_map(|t| vocab.integral_relations_for_type(t))
            .collect();
        if let Some(bridges) = settings.integral_relation_bridges.get(first.key()) {
            relations.extend(bridges.iter().cloned());
        }
        for relation in relations {
            let Some(def) = vocab.property(&relation) else {
                continue;
            };
            if def.key != first.key() && def.range.iter().any(|r| may_appear_on(r)) {
                alternatives.push(prepend(Selector::Property(Property::new(def)), selector));
            }
        }

        if alternatives.is_empty() {
            alternatives.push(selector.clone());
        }
        alternatives
    }

    // ------------------------------------------------------------------------
    // Substitution
    // ------------------------------------------------------------------------

    /// Every concrete path `selector` stands for, with the conditions its
    /// restricted properties imply.
    fn substitute(&self, selector: &Selector) -> Vec<(Vec<Selector>, Vec<Condition>)> {
        let mut combos: Vec<(Vec<Selector>, Vec<Condition>)> = vec![(Vec::new(), Vec::new())];
        for element in selector.elements() {
            let options = self.element_options(element);
            let mut next = Vec::with_capacity(combos.len() * options.len());
            for (prefix, prefilled) in &combos {
                for (replacement, restrictions) in &options {
                    let mut path = prefix.clone();
                    path.extend(replacement.iter().cloned());
                    let mut conditions = prefilled.clone();
                    conditions.extend(restrictions.iter().filter_map(|r| self.prefilled(&path, r)));
                    next.push((path, conditions));
                }
            }
            combos = next;
        }
        combos
            .into_iter()
            .map(|(path, prefilled)| (cancel_reverse_pairs(path), prefilled))
            .collect()
    }

    fn element_options(&self, element: &Selector) -> Vec<(Vec<Selector>, Vec<Restriction>)> {
        let Selector::Property(property) = element else {
            return vec![(vec![element.clone()], Vec::new())];
        };
        let vocab = &self.ctx.vocab;

        if let Some(inverse) = property.def.inverse_of.as_ref().and_then(|k| vocab.property(k)) {
            let inverted = Property {
                def: inverse,
                token: property.token.clone(),
                reversed: !property.reversed,
            };
            return self.kind_options(&inverted);
        }
        self.kind_options(property)
    }

    fn kind_options(&self, property: &Property) -> Vec<(Vec<Selector>, Vec<Restriction>)> {
        let related = |key: &str| -> Option<Selector> {
            self.ctx.vocab.property(key).map(|def| {
                Selector::Property(Property {
                    def,
                    token: property.token.clone(),
                    reversed: property.reversed,
                })
            })
        };

        match &property.def.kind {
            PropertyKind::ShortHand { chains } => chains
                .iter()
                .map(|chain| {
                    let mut path: Vec<Selector> = chain.iter().filter_map(|k| related(k)).collect();
                    if property.reversed {
                        path.reverse();
                    }
                    (path, Vec::new())
                })
                .collect(),
            PropertyKind::Composite { components } => components
                .iter()
                .filter_map(|k| related(k))
                .map(|s| (vec![s], Vec::new()))
                .collect(),
            PropertyKind::Restricted {
                base,
                restrictions,
                indexed: false,
            } => match related(base) {
                Some(base) => vec![(vec![base], restrictions.clone())],
                None => vec![(vec![Selector::Property(property.clone())], Vec::new())],
            },
            PropertyKind::Plain => {
                let mut by_key = BTreeMap::from([(property.key().to_string(), Selector::Property(property.clone()))]);
                for sub in self.ctx.vocab.sub_properties(property.key()) {
                    let plain = self.ctx.vocab.property(&sub).is_some_and(|d| d.kind == PropertyKind::Plain);
                    if let (true, Some(selector)) = (plain, related(&sub)) {
                        by_key.insert(sub, selector);
                    }
                }
                by_key.into_values().map(|s| (vec![s], Vec::new())).collect()
            }
            _ => vec![(vec![Selector::Property(property.clone())], Vec::new())],
        }
    }

    /// `<path>.<onProperty> = <hasValue>`
    fn prefilled(&self, path: &[Selector], restriction: &Restriction) -> Option<Condition> {
        let vocab = &self.ctx.vocab;
        let mut elements = path.to_vec();
        for segment in restriction.path() {
            let def = vocab
                .property(segment)
                .or_else(|| vocab.map_property(segment).resolved().and_then(|k| vocab.property(k)))?;
            elements.push(Selector::Property(Property::new(def)));
        }
        let last = match elements.last() {
            Some(Selector::Property(p)) => p.def.clone(),
            _ => return None,
        };
        let value = self.prefilled_value(&last, &restriction.has_value);
        let elements = self.with_suffix(cancel_reverse_pairs(elements), &value);
        Some(Condition::new(Selector::from_elements(elements), Operator::Equals, value))
    }

    fn prefilled_value(&self, def: &PropertyDef, has_value: &str) -> Value {
        let vocab = &self.ctx.vocab;
        let token = Token::synthetic(has_value);
        let mapping = if def.is_type() {
            vocab.map_class(has_value)
        } else if def.vocab_term {
            vocab.map_enum(has_value, def)
        } else {
            Mapping::Unrecognized
        };
        if let Mapping::Resolved(key) = mapping {
            return Value::VocabTerm {
                description: vocab.term_description(&key),
                key,
                token,
            };
        }
        let iri = if is_iri(has_value) {
            Some(has_value.to_string())
        } else {
            vocab.expand_prefixed(has_value)
        };
        match iri {
            Some(iri) if def.is_object_property() => Value::Link {
                description: json!({ ID_KEY: iri }),
                iri,
                token,
            },
            _ => Value::Literal(token),
        }
    }

    // ------------------------------------------------------------------------
    // Suffixes and type broadening
    // ------------------------------------------------------------------------

    /// Object properties are matched on `@id` for links and `_str` for text.
    fn with_suffix(&self, mut elements: Vec<Selector>, value: &Value) -> Vec<Selector> {
        let needs_suffix = match elements.last() {
            Some(Selector::Property(p)) => {
                p.def.is_object_property() && !p.def.is_type() && !p.def.has_vocab_value()
            }
            _ => false,
        };
        if !needs_suffix {
            return elements;
        }
        match value {
            Value::Wildcard | Value::Invalid { .. } => {}
            Value::Link { .. } => elements.push(Selector::Key(Key::recognized(ID_KEY))),
            _ => elements.push(Selector::Key(Key::recognized(SEARCH_KEY))),
        }
        elements
    }

    fn broaden_type(&self, condition: Condition) -> Node {
        let Value::VocabTerm { key, token, .. } = &condition.value else {
            return Node::Condition(condition);
        };
        let is_type = matches!(condition.selector.last_property(), Some(p) if p.def.is_type());
        if !is_type || condition.operator != Operator::Equals {
            return Node::Condition(condition);
        }

        let vocab = &self.ctx.vocab;
        let mut classes = vocab.sub_classes(key);
        if classes.is_empty() {
            return Node::Condition(condition);
        }
        classes.insert(key.clone());
        let alternatives = classes
            .into_iter()
            .map(|class| {
                Node::Condition(Condition::new(
                    condition.selector.clone(),
                    condition.operator,
                    Value::VocabTerm {
                        description: vocab.term_description(&class),
                        token: if &class == key { token.clone() } else { Token::synthetic(class.as_str()) },
                        key: class,
                    },
                ))
            })
            .collect();
        Node::group(Connective::Or, alternatives)
    }
}

/// Type keys established by an `And`'s direct children: type conditions, and
/// `Or`s made only of type conditions.
fn context_types(children: &[Node]) -> Vec<String> {
    let mut types = Vec::new();
    for child in children {
        match child {
            Node::Condition(c) => types.extend(c.type_key().map(str::to_string)),
            Node::Or(alternatives) => {
                let keys: Option<Vec<&str>> = alternatives
                    .iter()
                    .map(|a| a.as_condition().and_then(Condition::type_key))
                    .collect();
                types.extend(keys.into_iter().flatten().map(str::to_string));
            }
            _ => {}
        }
    }
    types
}

fn prepend(head: Selector, selector: &Selector) -> Selector {
    let mut elements = vec![head];
    elements.extend(selector.clone().into_elements());
    Selector::from_elements(elements)
}

/// `p` directly followed by `@reverse.p` (or the other way round) is a no-op.
fn cancel_reverse_pairs(elements: Vec<Selector>) -> Vec<Selector> {
    let mut out: Vec<Selector> = Vec::with_capacity(elements.len());
    for element in elements {
        if let (Some(Selector::Property(prev)), Selector::Property(next)) = (out.last(), &element) {
            if prev.key() == next.key() && prev.reversed != next.reversed {
                out.pop();
                continue;
            }
        }
        out.push(element);
    }
    out
}

/// Push a negation into an expanded condition: alternatives must all fail,
/// and a conjunction fails as a whole.
fn negate(node: Node) -> Node {
    match node {
        Node::Condition(c) => Node::Condition(c.with_operator(c.operator.inverse())),
        Node::Or(children) => Node::And(children.into_iter().map(negate).collect()),
        other => Node::Not(Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, context_with, tree};

    fn expanded(q: &str) -> ExpandedQueryTree {
        expand(&tree(q), &context())
    }

    #[test]
    fn negated_types_broaden_to_a_conjunction() {
        let e = expanded("NOT type:Instance");
        assert_eq!(
            e.tree.to_query_string(),
            "NOT type:Electronic NOT type:Instance NOT type:Print"
        );
        assert_eq!(e.expanded_paths(&[]), &[Vec::<usize>::new()]);
        assert_eq!(e.expanded_paths(&[0]), &[Vec::<usize>::new()]);
    }

    #[test]
    fn types_without_subclasses_stay_single() {
        assert_eq!(expanded("type:Print").tree.to_query_string(), "type:Print");
    }

    #[test]
    fn object_properties_get_suffixes() {
        assert_eq!(expanded("subject:fiction").tree.to_query_string(), "subject._str:fiction");
        assert_eq!(
            expanded("subject:\"sao:Fiction\"").tree.to_query_string(),
            "subject.@id:\"sao:Fiction\""
        );
        assert_eq!(expanded("subject:*").tree.to_query_string(), "subject:*");
    }

    #[test]
    fn plain_properties_broaden_to_sub_properties() {
        assert_eq!(
            expanded("contribution:x").tree.to_query_string(),
            "contribution._str:x OR primaryContribution._str:x"
        );
        assert_eq!(
            expanded("contribution!=x").tree.to_query_string(),
            "NOT contribution._str:x NOT primaryContribution._str:x"
        );
    }

    #[test]
    fn shorthands_and_composites_are_substituted() {
        assert_eq!(
            expanded("contributor:x").tree.to_query_string(),
            "contribution.agent._str:x"
        );
        assert_eq!(
            expanded("creator:x").tree.to_query_string(),
            "author._str:x OR illustrator._str:x"
        );
    }

    #[test]
    fn restricted_properties_prefill_their_restriction() {
        let e = expanded("isbn:9789100123456");
        assert_eq!(
            e.tree.to_query_string(),
            "identifiedBy._str:9789100123456 identifiedBy.type:ISBN"
        );
        let e = expanded("NOT isbn:9789100123456");
        assert!(matches!(e.root(), Node::Not(_)));
    }

    #[test]
    fn record_properties_get_the_record_prefix() {
        assert_eq!(
            expanded("created>2020").tree.to_query_string(),
            "meta.created>2020"
        );
    }

    #[test]
    fn properties_fan_out_through_integral_relations() {
        let e = expanded("type:Instance lang:eng");
        match e.root() {
            Node::And(children) => {
                assert_eq!(children[1].to_query_string(true), "instanceOf.lang:eng");
            }
            other => panic!("unexpected {other:?}"),
        }

        let e = expanded("type:Work bibliography:EPLK");
        match e.root() {
            Node::And(children) => {
                assert_eq!(
                    children[1].to_query_string(true),
                    "@reverse.instanceOf.bibliography:EPLK"
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn default_subject_types_apply_without_type_conditions() {
        let ctx = context_with(|s| s.default_subject_types = vec!["Instance".into()]);
        let e = expand(&QueryTree::parse("lang:eng", &ctx).expect("tree"), &ctx);
        assert_eq!(e.tree.to_query_string(), "instanceOf.lang:eng");
    }

    #[test]
    fn filters_expand_and_inactive_filters_vanish() {
        let e = expanded("hamlet onlineOnly");
        assert_eq!(e.tree.to_query_string(), "hamlet carrierType:Online");
        assert_eq!(e.expanded_paths(&[1]), &[vec![1]]);

        let e = expanded("hamlet NOT onlineOnly");
        assert_eq!(e.tree.to_query_string(), "hamlet");
        assert!(e.expanded_paths(&[1]).is_empty());
    }

    #[test]
    fn reverse_lookup_walks_up_to_a_mapped_ancestor() {
        let e = expanded("title:x NOT type:Instance");
        // NOT type:Instance became an And of three negated conditions, spliced into the root.
        assert_eq!(e.root().children().len(), 4);
        assert_eq!(e.original_path(&[2]), Some(vec![1, 0]));
        assert_eq!(e.original_path(&[0]), Some(vec![0]));
        assert_eq!(e.original_path(&[]), Some(vec![]));
    }

    #[test]
    fn adjacent_reverse_pairs_cancel() {
        let e = expanded("hasInstance.instanceOf.title:x");
        assert_eq!(e.tree.to_query_string(), "title:x");
    }
}
