//! Lexical units.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Characters that terminate a bare word (and must be quoted to appear in one).
pub const RESERVED_CHARS: &[char] = &['!', '<', '>', '=', '~', '(', ')', ':'];

/// Words that the lexer turns into keywords when unquoted.
pub const KEYWORDS: &[&str] = &["AND", "OR", "NOT"];

/// A token as typed by the user.
///
/// `offset` is the byte position of the token's first character in the source
/// string (the opening quote for phrases). Tokens synthesized after parsing
/// (expansion, filter injection) carry no offset.
///
/// Equality and hashing ignore the offset: two tokens with the same text and
/// quoting denote the same term wherever they were typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default)]
    pub quoted: bool,
}

impl Token {
    pub fn new(value: impl Into<String>, offset: usize, quoted: bool) -> Self {
        Self {
            value: value.into(),
            offset: Some(offset),
            quoted,
        }
    }

    /// A token that never appeared in the query string.
    pub fn synthetic(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            offset: None,
            quoted: false,
        }
    }

    /// Byte length of the token's surface form in the source string.
    pub fn source_len(&self) -> usize {
        if self.quoted {
            self.formatted().len()
        } else {
            self.value.len()
        }
    }

    /// Whether `cursor` (a byte offset) lies within or directly after this token.
    pub fn covers(&self, cursor: usize) -> bool {
        match self.offset {
            Some(start) => cursor >= start && cursor <= start + self.source_len(),
            None => false,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !self.quoted && self.value == "*"
    }

    /// Surface form suitable for re-parsing.
    ///
    /// Quoted tokens stay quoted; bare tokens are quoted only when they would
    /// otherwise lex differently (whitespace, reserved characters, keywords).
    pub fn formatted(&self) -> String {
        if self.quoted || needs_quoting(&self.value) {
            quote(&self.value)
        } else {
            self.value.clone()
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.quoted == other.quoted
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.quoted.hash(state);
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.formatted())
    }
}

pub fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || KEYWORDS.contains(&s)
        || s.chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\' || RESERVED_CHARS.contains(&c))
}

/// Wrap in double quotes, escaping embedded quotes and backslashes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
