//! Parser: symbols → `Ast`.
//!
//! Recursive descent over the lexer's symbols. Precedence, tightest first:
//! - parenthesized group
//! - `NOT` / `!`
//! - code (`key OP value`)
//! - juxtaposition and explicit `AND`
//! - `OR`

use crate::ast::{Ast, Connective, Operator};
use crate::lex::{lex, LexError, Symbol, SymbolKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("empty query")]
    Empty,
    #[error("unmatched opening parenthesis at character index {offset}")]
    UnclosedParenthesis { offset: usize },
    #[error("unmatched closing parenthesis at character index {offset}")]
    UnopenedParenthesis { offset: usize },
    #[error("operator '{operator}' at character index {offset} is missing an operand")]
    DanglingOperator { operator: String, offset: usize },
    #[error("codes within codes are not allowed (key '{key}' at character index {offset})")]
    NestedCode { key: String, offset: usize },
    #[error("operator '{operator}' at character index {offset} must be followed by a single value")]
    RangeOperand { operator: String, offset: usize },
    #[error("operator '{operator}' at character index {offset} is not supported")]
    Unsupported { operator: String, offset: usize },
    #[error("query is nested deeper than {max} levels at character index {offset}")]
    TooDeep { max: usize, offset: usize },
}

/// Nesting allowed by [`parse_query`] and [`parse`].
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseQueryError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

/// Lex and parse in one step.
pub fn parse_query(query: &str) -> Result<Ast, ParseQueryError> {
    parse_query_with_depth(query, DEFAULT_MAX_DEPTH)
}

/// Lex and parse, failing as soon as groups and negations nest deeper than
/// `max_depth`.
pub fn parse_query_with_depth(query: &str, max_depth: usize) -> Result<Ast, ParseQueryError> {
    let symbols = lex(query)?;
    Ok(parse_with_depth(&symbols, max_depth)?)
}

pub fn parse(symbols: &[Symbol]) -> Result<Ast, SyntaxError> {
    parse_with_depth(symbols, DEFAULT_MAX_DEPTH)
}

pub fn parse_with_depth(symbols: &[Symbol], max_depth: usize) -> Result<Ast, SyntaxError> {
    if symbols.is_empty() {
        return Err(SyntaxError::Empty);
    }
    let mut parser = Parser {
        symbols,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let ast = parser.or_expr()?;
    match parser.peek() {
        None => Ok(ast),
        Some(s) if s.is_operator(")") => Err(SyntaxError::UnopenedParenthesis { offset: s.offset() }),
        // or_expr only stops at `)` or end of input.
        Some(s) => Err(dangling(s)),
    }
}

struct Parser<'a> {
    symbols: &'a [Symbol],
    pos: usize,
    /// Open groups and negations around the current position.
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Symbol> {
        self.symbols.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Symbol> {
        let s = self.symbols.get(self.pos);
        if s.is_some() {
            self.pos += 1;
        }
        s
    }

    /// Run `inner` one nesting level down.
    fn nested<T>(
        &mut self,
        at: &Symbol,
        inner: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= self.max_depth {
            return Err(SyntaxError::TooDeep {
                max: self.max_depth,
                offset: at.offset(),
            });
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    /// True when no operand can start at the current position.
    fn at_operand_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(s) => s.is_keyword("OR") || s.is_keyword("AND") || s.is_operator(")"),
        }
    }

    fn or_expr(&mut self) -> Result<Ast, SyntaxError> {
        let mut operands = vec![self.and_expr()?];
        while let Some(kw) = self.peek().filter(|s| s.is_keyword("OR")) {
            self.advance();
            if self.at_operand_end() {
                return Err(dangling(kw));
            }
            operands.push(self.and_expr()?);
        }
        Ok(collapse(operands, Connective::Or))
    }

    fn and_expr(&mut self) -> Result<Ast, SyntaxError> {
        let mut operands = vec![self.term()?];
        loop {
            match self.peek() {
                None => break,
                Some(s) if s.is_keyword("OR") || s.is_operator(")") => break,
                Some(kw) if kw.is_keyword("AND") => {
                    self.advance();
                    if self.at_operand_end() {
                        return Err(dangling(kw));
                    }
                    operands.push(self.term()?);
                }
                Some(_) => operands.push(self.term()?),
            }
        }
        Ok(collapse(operands, Connective::And))
    }

    fn term(&mut self) -> Result<Ast, SyntaxError> {
        let Some(sym) = self.advance() else {
            return Err(SyntaxError::Empty);
        };

        match sym.kind {
            SymbolKind::Keyword if sym.text() == "NOT" => self.negation(sym),
            SymbolKind::Keyword => Err(dangling(sym)),
            SymbolKind::Operator => match sym.text() {
                "!" => self.negation(sym),
                "(" => self.group(sym),
                ")" => Err(SyntaxError::UnopenedParenthesis { offset: sym.offset() }),
                "~" => Err(unsupported(sym)),
                _ => Err(dangling(sym)),
            },
            SymbolKind::Word | SymbolKind::Phrase => match self.peek() {
                Some(op) if op.is_operator("~") => Err(unsupported(op)),
                Some(op) if op.kind == SymbolKind::Operator => match Operator::from_symbol(op.text()) {
                    Some(operator) => {
                        self.advance();
                        self.code(sym, op, operator)
                    }
                    None => Ok(Ast::leaf(sym.token.clone())),
                },
                _ => Ok(Ast::leaf(sym.token.clone())),
            },
        }
    }

    fn negation(&mut self, not: &Symbol) -> Result<Ast, SyntaxError> {
        if self.at_operand_end() {
            return Err(dangling(not));
        }
        let operand = self.nested(not, Self::term)?;
        Ok(Ast::not(operand))
    }

    fn group(&mut self, open: &Symbol) -> Result<Ast, SyntaxError> {
        if self.peek().is_some_and(|s| s.is_operator(")")) {
            self.advance();
            return Ok(Ast::And { operands: vec![] });
        }
        let inner = match self.nested(open, Self::or_expr) {
            Err(SyntaxError::Empty) => {
                return Err(SyntaxError::UnclosedParenthesis { offset: open.offset() })
            }
            other => other?,
        };
        match self.advance() {
            Some(close) if close.is_operator(")") => Ok(inner),
            _ => Err(SyntaxError::UnclosedParenthesis { offset: open.offset() }),
        }
    }

    fn code(&mut self, key: &Symbol, op: &Symbol, operator: Operator) -> Result<Ast, SyntaxError> {
        if self.at_operand_end() {
            return Err(dangling(op));
        }

        let operand = if operator.is_range() {
            let value = self.advance().filter(|s| s.is_term()).ok_or_else(|| range_operand(op))?;
            if self
                .peek()
                .is_some_and(|s| s.kind == SymbolKind::Operator && Operator::from_symbol(s.text()).is_some())
            {
                return Err(nested_code(value));
            }
            Ast::leaf(value.token.clone())
        } else {
            let operand = self.term()?;
            if contains_code(&operand) {
                return Err(nested_code(key));
            }
            operand
        };

        Ok(Ast::Code {
            key: key.token.clone(),
            operator,
            operand: Box::new(operand),
        })
    }
}

fn collapse(mut operands: Vec<Ast>, connective: Connective) -> Ast {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        Ast::group(connective, operands)
    }
}

fn contains_code(ast: &Ast) -> bool {
    match ast {
        Ast::Code { .. } => true,
        Ast::And { operands } | Ast::Or { operands } => operands.iter().any(contains_code),
        Ast::Not { operand } => contains_code(operand),
        Ast::Leaf { .. } => false,
    }
}

fn dangling(s: &Symbol) -> SyntaxError {
    SyntaxError::DanglingOperator {
        operator: s.text().to_string(),
        offset: s.offset(),
    }
}

fn unsupported(s: &Symbol) -> SyntaxError {
    SyntaxError::Unsupported {
        operator: s.text().to_string(),
        offset: s.offset(),
    }
}

fn range_operand(s: &Symbol) -> SyntaxError {
    SyntaxError::RangeOperand {
        operator: s.text().to_string(),
        offset: s.offset(),
    }
}

fn nested_code(s: &Symbol) -> SyntaxError {
    SyntaxError::NestedCode {
        key: s.text().to_string(),
        offset: s.offset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn leaf(s: &str) -> Ast {
        Ast::leaf(Token::synthetic(s))
    }

    fn code(key: &str, operator: Operator, operand: Ast) -> Ast {
        Ast::Code {
            key: Token::synthetic(key),
            operator,
            operand: Box::new(operand),
        }
    }

    fn parse_str(q: &str) -> Result<Ast, ParseQueryError> {
        parse_query(q)
    }

    #[test]
    fn juxtaposition_is_conjunction() -> Result<(), ParseQueryError> {
        assert_eq!(
            parse_str("a b AND c")?,
            Ast::And {
                operands: vec![leaf("a"), leaf("b"), leaf("c")]
            }
        );
        Ok(())
    }

    #[test]
    fn or_binds_loosest() -> Result<(), ParseQueryError> {
        assert_eq!(
            parse_str("a b OR c")?,
            Ast::Or {
                operands: vec![
                    Ast::And {
                        operands: vec![leaf("a"), leaf("b")]
                    },
                    leaf("c")
                ]
            }
        );
        Ok(())
    }

    #[test]
    fn not_binds_tighter_than_code_groups() -> Result<(), ParseQueryError> {
        assert_eq!(
            parse_str("NOT title:x y")?,
            Ast::And {
                operands: vec![Ast::not(code("title", Operator::Equals, leaf("x"))), leaf("y")]
            }
        );
        assert_eq!(parse_str("!a")?, Ast::not(leaf("a")));
        Ok(())
    }

    #[test]
    fn code_operands() -> Result<(), ParseQueryError> {
        assert_eq!(
            parse_str("title:(a OR b)")?,
            code(
                "title",
                Operator::Equals,
                Ast::Or {
                    operands: vec![leaf("a"), leaf("b")]
                }
            )
        );
        assert_eq!(
            parse_str("year>=2020")?,
            code("year", Operator::GreaterThanOrEquals, leaf("2020"))
        );
        assert_eq!(
            parse_str("lang!=eng")?,
            code("lang", Operator::NotEquals, leaf("eng"))
        );
        Ok(())
    }

    #[test]
    fn empty_group_is_an_empty_conjunction() -> Result<(), ParseQueryError> {
        assert_eq!(parse_str("()")?, Ast::And { operands: vec![] });
        Ok(())
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        assert_eq!(
            parse_str("(a OR b"),
            Err(ParseQueryError::Syntax(SyntaxError::UnclosedParenthesis { offset: 0 }))
        );
        assert_eq!(
            parse_str("a OR b)"),
            Err(ParseQueryError::Syntax(SyntaxError::UnopenedParenthesis { offset: 6 }))
        );
    }

    #[test]
    fn rejects_dangling_operators() {
        for q in ["title:", "a OR", "NOT", "AND b", "a AND", "year>=", ":x", "(a OR)"] {
            let err = parse_str(q).expect_err(q);
            assert!(
                matches!(err, ParseQueryError::Syntax(SyntaxError::DanglingOperator { .. })),
                "{q}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_nested_codes() {
        for q in ["a:b:c", "title:(x author:y)", "year>=x:y", "a:NOT b:c"] {
            let err = parse_str(q).expect_err(q);
            assert!(
                matches!(err, ParseQueryError::Syntax(SyntaxError::NestedCode { .. })),
                "{q}: {err:?}"
            );
        }
    }

    #[test]
    fn range_operators_take_a_single_value() {
        let err = parse_str("year>(2000 2001)").expect_err("range group");
        assert!(matches!(err, ParseQueryError::Syntax(SyntaxError::RangeOperand { .. })));
    }

    #[test]
    fn like_operator_is_unsupported() {
        let err = parse_str("title~hamlet").expect_err("like");
        assert_eq!(
            err,
            ParseQueryError::Syntax(SyntaxError::Unsupported {
                operator: "~".to_string(),
                offset: 5
            })
        );
    }

    #[test]
    fn nesting_is_bounded_while_parsing() {
        let deep = format!("{}a{}", "(".repeat(999), ")".repeat(999));
        assert_eq!(
            parse_str(&deep),
            Err(ParseQueryError::Syntax(SyntaxError::TooDeep {
                max: DEFAULT_MAX_DEPTH,
                offset: DEFAULT_MAX_DEPTH
            }))
        );
        let nots = format!("{}a", "NOT ".repeat(999));
        assert!(matches!(
            parse_str(&nots),
            Err(ParseQueryError::Syntax(SyntaxError::TooDeep { .. }))
        ));

        assert_eq!(parse_query_with_depth("((a))", 2), Ok(leaf("a")));
        assert_eq!(
            parse_query_with_depth("(((a)))", 2),
            Err(ParseQueryError::Syntax(SyntaxError::TooDeep { max: 2, offset: 2 }))
        );
    }

    #[test]
    fn offsets_survive_parsing() -> Result<(), ParseQueryError> {
        match parse_str("foo  bar")? {
            Ast::And { operands } => match &operands[1] {
                Ast::Leaf { token } => assert_eq!(token.offset, Some(5)),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }
}
