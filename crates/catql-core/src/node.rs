//! Query tree nodes.
//!
//! One `Node` type serves both the canonical tree (as built from the user's
//! query) and the expanded tree. Nodes are immutable values: every edit
//! returns a new node, and positions are addressed by `NodePath`.

use crate::filter::FilterAlias;
use crate::selector::{Property, Selector};
use crate::util::parenthesize;
use crate::value::Value;
use catql_dsl::{Connective, Operator, Token};
use std::sync::Arc;

/// Child indices from the root. `Not` has its operand at index 0.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnyKind {
    /// `*`
    Wildcard,
    /// The empty query.
    EmptyString,
    /// `()`
    EmptyGroup,
}

impl AnyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnyKind::Wildcard => "*",
            AnyKind::EmptyString => "",
            AnyKind::EmptyGroup => "()",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub selector: Selector,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(selector: Selector, operator: Operator, value: Value) -> Condition {
        Condition {
            selector,
            operator,
            value,
        }
    }

    /// The class key of an `rdf:type` equality, if this is one.
    pub fn type_key(&self) -> Option<&str> {
        match (&self.value, self.operator) {
            (Value::VocabTerm { key, .. }, Operator::Equals) if self.selector.is_type() => Some(key),
            _ => None,
        }
    }

    pub fn with_operator(&self, operator: Operator) -> Condition {
        Condition {
            operator,
            ..self.clone()
        }
    }

    fn render(&self) -> String {
        let value = if self.value.is_multi_token() {
            parenthesize(&self.value.query_form())
        } else {
            self.value.query_form()
        };
        self.operator.format(&self.selector.formatted_key(), &value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeText {
    /// Restricts the text search to one property's field.
    pub property: Option<Property>,
    pub negated: bool,
    pub tokens: Vec<Token>,
    pub connective: Connective,
}

impl FreeText {
    pub fn new(tokens: Vec<Token>, connective: Connective) -> FreeText {
        FreeText {
            property: None,
            negated: false,
            tokens,
            connective,
        }
    }

    /// Tokens joined as typed.
    pub fn text(&self) -> String {
        self.terms().join(self.connective.delimiter())
    }

    /// Formatted tokens, for the engine's text query.
    pub fn terms(&self) -> Vec<String> {
        self.tokens.iter().map(Token::formatted).collect()
    }

    fn render(&self, parent: Parent) -> String {
        let multi = self.tokens.len() > 1;
        let needs_parens = multi
            && (self.negated
                || self.property.is_some()
                || match parent {
                    Parent::Top => false,
                    Parent::Group(c) => c != self.connective,
                    Parent::Not | Parent::Nested => true,
                });
        let text = if needs_parens {
            parenthesize(&self.text())
        } else {
            self.text()
        };
        let text = match &self.property {
            Some(p) => format!("{}:{text}", Selector::Property(p.clone()).formatted_key()),
            None => text,
        };
        if self.negated {
            format!("NOT {text}")
        } else {
            text
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Condition(Condition),
    FreeText(FreeText),
    Not(Box<Node>),
    ActiveFilter(Arc<FilterAlias>),
    InactiveFilter(Arc<FilterAlias>),
    Any(AnyKind),
}

/// Rendering position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Top,
    Group(Connective),
    Not,
    /// Embedded in some larger, unknown query.
    Nested,
}

impl Node {
    /// Group `children`, splicing same-connective child groups and collapsing
    /// trivial groups.
    pub fn group(connective: Connective, children: Vec<Node>) -> Node {
        let mut spliced = Vec::with_capacity(children.len());
        for child in children {
            match (connective, child) {
                (Connective::And, Node::And(grandchildren)) | (Connective::Or, Node::Or(grandchildren)) => {
                    spliced.extend(grandchildren)
                }
                (_, other) => spliced.push(other),
            }
        }
        match spliced.len() {
            0 => Node::Any(AnyKind::EmptyGroup),
            1 => spliced.remove(0),
            _ => match connective {
                Connective::And => Node::And(spliced),
                Connective::Or => Node::Or(spliced),
            },
        }
    }

    pub fn connective(&self) -> Option<Connective> {
        match self {
            Node::And(_) => Some(Connective::And),
            Node::Or(_) => Some(Connective::Or),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.connective().is_some()
    }

    /// Logical negation, pushed as far in as it goes without changing meaning.
    pub fn invert(self) -> Node {
        match self {
            Node::Condition(c) if c.operator != Operator::Equals => {
                Node::Condition(c.with_operator(c.operator.inverse()))
            }
            Node::FreeText(mut ft) => {
                ft.negated = !ft.negated;
                Node::FreeText(ft)
            }
            Node::Not(inner) => *inner,
            Node::ActiveFilter(f) => Node::InactiveFilter(f),
            Node::InactiveFilter(f) => Node::ActiveFilter(f),
            other => Node::Not(Box::new(other)),
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::And(children) | Node::Or(children) => children.iter().collect(),
            Node::Not(inner) => vec![inner.as_ref()],
            _ => Vec::new(),
        }
    }

    pub fn at(&self, path: &[usize]) -> Option<&Node> {
        match path.split_first() {
            None => Some(self),
            Some((&i, rest)) => self.children().get(i).and_then(|child| child.at(rest)),
        }
    }

    /// Every node with its path, parents before children.
    pub fn walk(&self) -> Vec<(NodePath, &Node)> {
        let mut out = Vec::new();
        self.walk_into(Vec::new(), &mut out);
        out
    }

    fn walk_into<'a>(&'a self, path: NodePath, out: &mut Vec<(NodePath, &'a Node)>) {
        let children = self.children();
        out.push((path.clone(), self));
        for (i, child) in children.into_iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(i);
            child.walk_into(child_path, out);
        }
    }

    /// Nesting depth; leaves are 1.
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Node::Condition(c) => Some(c),
            _ => None,
        }
    }

    /// Re-serialize. Nested groups and multi-token values are parenthesized
    /// where the grammar needs it; `top_level = false` also parenthesizes the
    /// outermost group.
    pub fn to_query_string(&self, top_level: bool) -> String {
        self.render(if top_level { Parent::Top } else { Parent::Nested })
    }

    fn render(&self, parent: Parent) -> String {
        match self {
            Node::And(children) | Node::Or(children) => {
                let connective = self.connective().unwrap_or(Connective::And);
                let inner = children
                    .iter()
                    .map(|c| c.render(Parent::Group(connective)))
                    .collect::<Vec<_>>()
                    .join(connective.delimiter());
                if parent == Parent::Top {
                    inner
                } else {
                    parenthesize(&inner)
                }
            }
            Node::Condition(c) => c.render(),
            Node::FreeText(ft) => ft.render(parent),
            Node::Not(inner) => format!("NOT {}", inner.render(Parent::Not)),
            Node::ActiveFilter(f) => f.alias.clone(),
            Node::InactiveFilter(f) => format!("NOT {}", f.alias),
            Node::Any(kind) => kind.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ft(values: &[&str], connective: Connective) -> Node {
        Node::FreeText(FreeText::new(
            values.iter().map(|v| Token::synthetic(*v)).collect(),
            connective,
        ))
    }

    fn cond(key: &str, value: &str) -> Node {
        Node::Condition(Condition::new(
            Selector::Key(crate::selector::Key::recognized(key)),
            Operator::Equals,
            Value::Literal(Token::synthetic(value)),
        ))
    }

    #[test]
    fn groups_splice_and_collapse() {
        let inner = Node::And(vec![cond("a", "1"), cond("b", "2")]);
        assert_eq!(
            Node::group(Connective::And, vec![inner, cond("c", "3")]),
            Node::And(vec![cond("a", "1"), cond("b", "2"), cond("c", "3")])
        );
        assert_eq!(Node::group(Connective::Or, vec![cond("a", "1")]), cond("a", "1"));
        assert_eq!(Node::group(Connective::Or, vec![]), Node::Any(AnyKind::EmptyGroup));
    }

    #[test]
    fn inversion_pushes_inward() {
        let range = Node::Condition(Condition::new(
            Selector::Key(crate::selector::Key::recognized("_year")),
            Operator::GreaterThan,
            Value::Literal(Token::synthetic("2000")),
        ));
        match range.clone().invert() {
            Node::Condition(c) => assert_eq!(c.operator, Operator::LessThanOrEquals),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(range.clone().invert().invert(), range);

        let eq = cond("a", "1");
        assert_eq!(eq.clone().invert(), Node::Not(Box::new(eq.clone())));
        assert_eq!(eq.clone().invert().invert(), eq);

        match ft(&["x"], Connective::And).invert() {
            Node::FreeText(f) => assert!(f.negated),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rendering_parenthesizes_only_where_needed() {
        let tree = Node::And(vec![
            ft(&["a", "b"], Connective::Or),
            Node::Or(vec![cond("x", "1"), cond("y", "2")]),
            Node::Not(Box::new(Node::And(vec![cond("z", "3"), cond("w", "4")]))),
        ]);
        assert_eq!(
            tree.to_query_string(true),
            "(a OR b) (x:1 OR y:2) NOT (z:3 w:4)"
        );
        assert_eq!(
            Node::Or(vec![ft(&["a", "b"], Connective::Or), cond("x", "1")]).to_query_string(true),
            "a OR b OR x:1"
        );
        assert_eq!(ft(&["a", "b"], Connective::And).to_query_string(false), "(a b)");
        assert_eq!(ft(&["a", "b"], Connective::And).invert().to_query_string(true), "NOT (a b)");
    }

    #[test]
    fn paths_address_children_and_negations() {
        let tree = Node::And(vec![cond("a", "1"), Node::Not(Box::new(cond("b", "2")))]);
        assert_eq!(tree.at(&[1, 0]), Some(&cond("b", "2")));
        assert_eq!(tree.at(&[2]), None);
        let paths: Vec<NodePath> = tree.walk().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec![vec![], vec![0], vec![1], vec![1, 0]]);
        assert_eq!(tree.depth(), 3);
    }
}
