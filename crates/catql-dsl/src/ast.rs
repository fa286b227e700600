//! Parser output types.

use crate::token::Token;
use serde::{Deserialize, Serialize};

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThanOrEquals,
    GreaterThan,
    LessThanOrEquals,
    LessThan,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::GreaterThanOrEquals,
        Operator::GreaterThan,
        Operator::LessThanOrEquals,
        Operator::LessThan,
    ];

    /// Operator for a lexer symbol in code position (`key OP value`).
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        match symbol {
            ":" | "=" => Some(Operator::Equals),
            "!=" => Some(Operator::NotEquals),
            ">=" => Some(Operator::GreaterThanOrEquals),
            ">" => Some(Operator::GreaterThan),
            "<=" => Some(Operator::LessThanOrEquals),
            "<" => Some(Operator::LessThan),
            _ => None,
        }
    }

    /// Key used in search mappings (`{"equals": ...}`).
    pub fn term_key(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::GreaterThanOrEquals => "greaterThanOrEquals",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThanOrEquals => "lessThanOrEquals",
            Operator::LessThan => "lessThan",
        }
    }

    pub fn format(self, key: &str, value: &str) -> String {
        match self {
            Operator::Equals => format!("{key}:{value}"),
            Operator::NotEquals => format!("NOT {key}:{value}"),
            Operator::GreaterThanOrEquals => format!("{key}>={value}"),
            Operator::GreaterThan => format!("{key}>{value}"),
            Operator::LessThanOrEquals => format!("{key}<={value}"),
            Operator::LessThan => format!("{key}<{value}"),
        }
    }

    pub fn inverse(self) -> Operator {
        match self {
            Operator::Equals => Operator::NotEquals,
            Operator::NotEquals => Operator::Equals,
            Operator::GreaterThanOrEquals => Operator::LessThan,
            Operator::GreaterThan => Operator::LessThanOrEquals,
            Operator::LessThanOrEquals => Operator::GreaterThan,
            Operator::LessThan => Operator::GreaterThanOrEquals,
        }
    }

    pub fn is_range(self) -> bool {
        !matches!(self, Operator::Equals | Operator::NotEquals)
    }

    /// Engine range-query bound key (`gte`, `gt`, ...). `None` for non-range operators.
    pub fn range_key(self) -> Option<&'static str> {
        match self {
            Operator::GreaterThanOrEquals => Some("gte"),
            Operator::GreaterThan => Some("gt"),
            Operator::LessThanOrEquals => Some("lte"),
            Operator::LessThan => Some("lt"),
            Operator::Equals | Operator::NotEquals => None,
        }
    }
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    /// Separator used when re-serializing operands.
    pub fn delimiter(self) -> &'static str {
        match self {
            Connective::And => " ",
            Connective::Or => " OR ",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Connective::And => "and",
            Connective::Or => "or",
        }
    }
}

/// Strictly nested parse tree; one node per syntactic construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Ast {
    And { operands: Vec<Ast> },
    Or { operands: Vec<Ast> },
    Not { operand: Box<Ast> },
    Leaf { token: Token },
    Code {
        key: Token,
        operator: Operator,
        operand: Box<Ast>,
    },
}

impl Ast {
    pub fn leaf(token: Token) -> Ast {
        Ast::Leaf { token }
    }

    pub fn not(operand: Ast) -> Ast {
        Ast::Not {
            operand: Box::new(operand),
        }
    }

    pub fn group(connective: Connective, operands: Vec<Ast>) -> Ast {
        match connective {
            Connective::And => Ast::And { operands },
            Connective::Or => Ast::Or { operands },
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Ast::And { operands } | Ast::Or { operands } => {
                1 + operands.iter().map(Ast::depth).max().unwrap_or(0)
            }
            Ast::Not { operand } | Ast::Code { operand, .. } => 1 + operand.depth(),
            Ast::Leaf { .. } => 1,
        }
    }
}
