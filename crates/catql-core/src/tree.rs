//! The canonical query tree and edits on it.

use crate::builder::QueryTreeBuilder;
use crate::context::QueryContext;
use crate::error::{InvalidQuery, QueryError};
use crate::node::{AnyKind, Node, NodePath};
use crate::selector::Selector;
use catql_dsl::{flatten, parse_query_with_depth, Connective, Token};
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QueryTree {
    root: Node,
    free_text: OnceLock<String>,
}

impl PartialEq for QueryTree {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl QueryTree {
    pub fn new(root: Node) -> QueryTree {
        QueryTree {
            root,
            free_text: OnceLock::new(),
        }
    }

    pub fn empty() -> QueryTree {
        QueryTree::new(Node::Any(AnyKind::EmptyString))
    }

    /// Lex, parse, flatten and build `query`.
    pub fn parse(query: &str, ctx: &QueryContext) -> Result<QueryTree, QueryError> {
        let settings = &ctx.settings;
        if query.chars().count() > settings.max_query_length {
            return Err(InvalidQuery::TooLong {
                max: settings.max_query_length,
            }
            .into());
        }
        if query.trim().is_empty() {
            return Ok(QueryTree::empty());
        }

        let ast = parse_query_with_depth(query, settings.max_depth)?;
        if ast.depth() > settings.max_depth {
            return Err(InvalidQuery::TooDeep {
                max: settings.max_depth,
            }
            .into());
        }
        let flat = flatten(&ast, &|word| ctx.filters.contains(word));
        let root = QueryTreeBuilder::new(ctx).build(&flat)?;
        let tree = QueryTree::new(root);
        debug!(query, tree = %tree.to_query_string(), "query tree built");
        Ok(tree)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root == Node::Any(AnyKind::EmptyString)
    }

    /// The query string this tree stands for; `*` when empty.
    pub fn to_query_string(&self) -> String {
        if self.is_empty() {
            "*".to_string()
        } else {
            self.root.to_query_string(true)
        }
    }

    pub fn at(&self, path: &[usize]) -> Option<&Node> {
        self.root.at(path)
    }

    /// Conjuncts of the root, or the root itself when it is not an `And`.
    pub fn top_level_nodes(&self) -> Vec<(NodePath, &Node)> {
        match &self.root {
            Node::And(children) => children.iter().enumerate().map(|(i, c)| (vec![i], c)).collect(),
            root => vec![(Vec::new(), root)],
        }
    }

    /// Text of the top-level, unscoped, non-negated free text.
    pub fn top_level_free_text(&self) -> &str {
        self.free_text.get_or_init(|| {
            self.top_level_nodes()
                .into_iter()
                .filter_map(|(_, node)| match node {
                    Node::FreeText(ft) if !ft.negated && ft.property.is_none() => Some(ft.text()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    /// The token under `cursor` (a byte offset into the original query).
    pub fn currently_edited_token(&self, cursor: usize) -> Option<&Token> {
        self.root
            .walk()
            .into_iter()
            .flat_map(|(_, node)| node_tokens(node))
            .find(|token| token.covers(cursor))
    }

    /// `self AND node`, unless `node` is already a top-level conjunct.
    pub fn add_to_top_level(&self, node: Node) -> QueryTree {
        if self.top_level_nodes().iter().any(|(_, n)| **n == node) {
            return self.clone();
        }
        if self.is_empty() {
            return QueryTree::new(node);
        }
        QueryTree::new(Node::group(Connective::And, vec![self.root.clone(), node]))
    }

    /// Drop every top-level conjunct equal to `node`.
    pub fn remove_top_level(&self, node: &Node) -> QueryTree {
        match &self.root {
            Node::And(children) => {
                let kept: Vec<Node> = children.iter().filter(|c| *c != node).cloned().collect();
                if kept.is_empty() {
                    QueryTree::empty()
                } else {
                    QueryTree::new(Node::group(Connective::And, kept))
                }
            }
            root if root == node => QueryTree::empty(),
            _ => self.clone(),
        }
    }

    /// The tree without the node at `path`.
    ///
    /// Removal only descends through groups: a path leading into a `Not`
    /// removes the whole `Not`. Groups left with one child collapse, and
    /// removing everything leaves the empty tree.
    pub fn exclude(&self, path: &[usize]) -> ReducedQueryTree {
        if self.root.at(path).is_none() {
            return ReducedQueryTree {
                tree: self.clone(),
                removed: None,
            };
        }
        let cut = removal_path(&self.root, path);
        let removed = self.root.at(&cut).cloned();
        let tree = match without(&self.root, &cut) {
            Some(root) => QueryTree::new(root),
            None => QueryTree::empty(),
        };
        ReducedQueryTree { tree, removed }
    }
}

/// A tree with a node taken out, used to build "remove this" links.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedQueryTree {
    pub tree: QueryTree,
    pub removed: Option<Node>,
}

/// `path` truncated just after the first step out of group territory.
fn removal_path(root: &Node, path: &[usize]) -> NodePath {
    let mut node = root;
    let mut cut = Vec::with_capacity(path.len());
    for &i in path {
        if !node.is_group() {
            break;
        }
        cut.push(i);
        match node.children().get(i) {
            Some(child) => node = child,
            None => break,
        }
    }
    cut
}

fn without(node: &Node, path: &[usize]) -> Option<Node> {
    let Some((&i, rest)) = path.split_first() else {
        return None;
    };
    let (connective, children) = match node {
        Node::And(children) => (Connective::And, children),
        Node::Or(children) => (Connective::Or, children),
        _ => return None,
    };
    let kept: Vec<Node> = children
        .iter()
        .enumerate()
        .filter_map(|(j, child)| if j == i { without(child, rest) } else { Some(child.clone()) })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(Node::group(connective, kept))
    }
}

fn node_tokens(node: &Node) -> Vec<&Token> {
    match node {
        Node::FreeText(ft) => ft.tokens.iter().collect(),
        Node::Condition(c) => {
            let mut tokens: Vec<&Token> = c
                .selector
                .elements()
                .into_iter()
                .filter_map(|element| match element {
                    Selector::Key(key) => Some(&key.token),
                    Selector::Property(p) => Some(&p.token),
                    Selector::Path(_) => None,
                })
                .collect();
            tokens.extend(c.value.tokens());
            tokens
        }
        _ => Vec::new(),
    }
}
