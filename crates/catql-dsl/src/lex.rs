//! Lexer: query string → symbols.
//!
//! Symbol classes:
//! - `Phrase`: `"..."` (backslash escapes the next character)
//! - `Operator`: `>= <= != ! < > = ~ ( ) :`
//! - `Keyword`: unquoted, unescaped `AND` / `OR` / `NOT`
//! - `Word`: everything else, up to whitespace or an unescaped reserved char
//!
//! Offsets are byte offsets into the input and are never rewritten.

use crate::token::{Token, KEYWORDS};
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{anychar, multispace0},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WORD_STOP: &str = " \t\r\n\\\"!<>=~():";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Word,
    Phrase,
    Keyword,
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub token: Token,
}

impl Symbol {
    pub fn offset(&self) -> usize {
        self.token.offset.unwrap_or_default()
    }

    pub fn text(&self) -> &str {
        &self.token.value
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == SymbolKind::Operator && self.token.value == op
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        self.kind == SymbolKind::Keyword && self.token.value == kw
    }

    /// Words and phrases can stand as leaves or keys.
    pub fn is_term(&self) -> bool {
        matches!(self.kind, SymbolKind::Word | SymbolKind::Phrase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unclosed double quote, started at character index {offset}")]
    UnclosedQuote { offset: usize },
    #[error("double quote not allowed inside a word, at character index {offset}")]
    IllegalQuote { offset: usize },
    #[error("escape character at end of input, at character index {offset}")]
    DanglingEscape { offset: usize },
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            LexError::UnclosedQuote { offset }
            | LexError::IllegalQuote { offset }
            | LexError::DanglingEscape { offset } => *offset,
        }
    }
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        alt((tag(">="), tag("<="), tag("!="))),
        alt((
            tag("!"),
            tag("<"),
            tag(">"),
            tag("="),
            tag("~"),
            tag("("),
            tag(")"),
            tag(":"),
        )),
    ))(input)
}

fn phrase_body(input: &str) -> IResult<&str, String> {
    escaped_transform(is_not("\\\""), '\\', anychar)(input)
}

fn word(input: &str) -> IResult<&str, String> {
    escaped_transform(is_not(WORD_STOP), '\\', anychar)(input)
}

fn skip_whitespace(input: &str) -> &str {
    match multispace0::<&str, nom::error::Error<&str>>(input) {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}

pub fn lex(input: &str) -> Result<Vec<Symbol>, LexError> {
    let mut symbols = Vec::new();
    let mut rest = skip_whitespace(input);

    while !rest.is_empty() {
        let offset = input.len() - rest.len();

        if let Some(after_quote) = rest.strip_prefix('"') {
            let (remaining, body) = if after_quote.starts_with('"') {
                (after_quote, String::new())
            } else {
                phrase_body(after_quote).map_err(|_| LexError::UnclosedQuote { offset })?
            };
            rest = remaining
                .strip_prefix('"')
                .ok_or(LexError::UnclosedQuote { offset })?;
            symbols.push(Symbol {
                kind: SymbolKind::Phrase,
                token: Token::new(body, offset, true),
            });
        } else if let Ok((remaining, op)) = operator(rest) {
            symbols.push(Symbol {
                kind: SymbolKind::Operator,
                token: Token::new(op, offset, false),
            });
            rest = remaining;
        } else {
            let (remaining, text) = word(rest).map_err(|_| LexError::DanglingEscape { offset })?;
            if remaining.starts_with('"') {
                return Err(LexError::IllegalQuote {
                    offset: input.len() - remaining.len(),
                });
            }
            let raw = &rest[..rest.len() - remaining.len()];
            let kind = if !raw.contains('\\') && KEYWORDS.contains(&text.as_str()) {
                SymbolKind::Keyword
            } else {
                SymbolKind::Word
            };
            symbols.push(Symbol {
                kind,
                token: Token::new(text, offset, false),
            });
            rest = remaining;
        }

        rest = skip_whitespace(rest);
    }

    Ok(symbols)
}
