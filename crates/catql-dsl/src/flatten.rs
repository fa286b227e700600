//! Ast flattener.
//!
//! Two rewrites, applied bottom-up:
//! - associativity: a group nested directly in a group of the same connective
//!   is spliced into its parent;
//! - free-text runs: consecutive free-text leaves in a group are merged into a
//!   single leaf carrying all their tokens (order and offsets preserved).
//!
//! A group reduced to one operand collapses to that operand, so a parenthesized
//! run such as `(a OR b)` becomes one leaf with connective `Or`.
//!
//! Merge compatibility: two runs join when either is a single token, or when
//! both already use the group's connective. Two multi-token runs built under a
//! different connective stay apart (`(a OR b) AND (b OR c)` keeps both).

use crate::ast::{Ast, Connective, Operator};
use crate::token::Token;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum FlatNode {
    And { operands: Vec<FlatNode> },
    Or { operands: Vec<FlatNode> },
    Not { operand: Box<FlatNode> },
    Leaf { tokens: Vec<Token>, connective: Connective },
    Code {
        key: Token,
        operator: Operator,
        operand: Box<FlatNode>,
    },
}

/// Flatten a parse tree. `is_filter_alias` marks bare words that name a
/// registered filter; those never join a free-text run.
pub fn flatten(ast: &Ast, is_filter_alias: &dyn Fn(&str) -> bool) -> FlatNode {
    FlatNode::from(ast).normalize(is_filter_alias)
}

impl From<&Ast> for FlatNode {
    fn from(ast: &Ast) -> Self {
        match ast {
            Ast::And { operands } => FlatNode::And {
                operands: operands.iter().map(FlatNode::from).collect(),
            },
            Ast::Or { operands } => FlatNode::Or {
                operands: operands.iter().map(FlatNode::from).collect(),
            },
            Ast::Not { operand } => FlatNode::Not {
                operand: Box::new(FlatNode::from(operand.as_ref())),
            },
            Ast::Leaf { token } => FlatNode::Leaf {
                tokens: vec![token.clone()],
                connective: Connective::And,
            },
            Ast::Code { key, operator, operand } => FlatNode::Code {
                key: key.clone(),
                operator: *operator,
                operand: Box::new(FlatNode::from(operand.as_ref())),
            },
        }
    }
}

impl FlatNode {
    /// Re-apply the flattening rules. Idempotent.
    pub fn normalize(self, is_filter_alias: &dyn Fn(&str) -> bool) -> FlatNode {
        match self {
            FlatNode::And { operands } => normalize_group(Connective::And, operands, is_filter_alias),
            FlatNode::Or { operands } => normalize_group(Connective::Or, operands, is_filter_alias),
            FlatNode::Not { operand } => FlatNode::Not {
                operand: Box::new(operand.normalize(is_filter_alias)),
            },
            FlatNode::Code { key, operator, operand } => FlatNode::Code {
                key,
                operator,
                operand: Box::new(operand.normalize(is_filter_alias)),
            },
            leaf @ FlatNode::Leaf { .. } => leaf,
        }
    }

    pub fn group(connective: Connective, operands: Vec<FlatNode>) -> FlatNode {
        match connective {
            Connective::And => FlatNode::And { operands },
            Connective::Or => FlatNode::Or { operands },
        }
    }

    /// Any leaf except a bare (unquoted, single-token) filter alias.
    pub fn is_free_text(&self, is_filter_alias: &dyn Fn(&str) -> bool) -> bool {
        match self {
            FlatNode::Leaf { tokens, .. } => match tokens.as_slice() {
                [single] => single.quoted || !is_filter_alias(&single.value),
                _ => true,
            },
            _ => false,
        }
    }
}

/// Whether two free-text runs may be merged under `connective`.
pub fn runs_compatible(
    a: (&[Token], Connective),
    b: (&[Token], Connective),
    connective: Connective,
) -> bool {
    a.0.len() <= 1 || b.0.len() <= 1 || (a.1 == connective && b.1 == connective)
}

fn normalize_group(
    connective: Connective,
    operands: Vec<FlatNode>,
    is_filter_alias: &dyn Fn(&str) -> bool,
) -> FlatNode {
    let mut spliced = Vec::with_capacity(operands.len());
    for operand in operands {
        match (connective, operand.normalize(is_filter_alias)) {
            (Connective::And, FlatNode::And { operands }) | (Connective::Or, FlatNode::Or { operands }) => {
                spliced.extend(operands)
            }
            (_, other) => spliced.push(other),
        }
    }

    let mut merged: Vec<FlatNode> = Vec::with_capacity(spliced.len());
    for node in spliced {
        if node.is_free_text(is_filter_alias) {
            if let Some(last) = merged.last_mut() {
                if last.is_free_text(is_filter_alias) {
                    if let (
                        FlatNode::Leaf {
                            tokens: run,
                            connective: run_connective,
                        },
                        FlatNode::Leaf { tokens, connective: c },
                    ) = (last, &node)
                    {
                        if runs_compatible((run.as_slice(), *run_connective), (tokens.as_slice(), *c), connective) {
                            run.extend(tokens.iter().cloned());
                            *run_connective = connective;
                            continue;
                        }
                    }
                }
            }
        }
        merged.push(node);
    }

    if merged.len() == 1 {
        merged.remove(0)
    } else {
        FlatNode::group(connective, merged)
    }
}
