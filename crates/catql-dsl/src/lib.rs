//! Catql query grammar
//!
//! This crate owns the textual surface of the catalogue query language:
//! - `token`: immutable lexical units carrying their source offset
//! - `lex`: string → symbols (words, phrases, keywords, operators)
//! - `parse`: symbols → `Ast` (strictly mirrors parenthesization)
//! - `flatten`: `Ast` → `FlatNode` (associativity + free-text runs)
//!
//! Semantic resolution (keys, properties, values) lives in `catql-core`; nothing
//! here knows about the vocabulary except the filter-alias predicate handed to
//! the flattener.

pub mod ast;
pub mod flatten;
pub mod lex;
pub mod parse;
pub mod token;

pub use ast::{Ast, Connective, Operator};
pub use flatten::{flatten, FlatNode};
pub use lex::{lex, LexError, Symbol, SymbolKind};
pub use parse::{
    parse, parse_query, parse_query_with_depth, parse_with_depth, ParseQueryError, SyntaxError, DEFAULT_MAX_DEPTH,
};
pub use token::Token;
