//! Typed condition values.

use catql_dsl::{Connective, Token};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as Json;
use std::fmt;

// ============================================================================
// Dates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    Year,
    Month,
    Day,
    Minute,
    Second,
}

impl Granularity {
    /// Rounding unit in engine date math.
    pub fn date_math_unit(self) -> &'static str {
        match self {
            Granularity::Year => "y",
            Granularity::Month => "M",
            Granularity::Day => "d",
            Granularity::Minute => "m",
            Granularity::Second => "s",
        }
    }
}

/// A date as typed, remembering how precise it was.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDate {
    text: String,
    granularity: Granularity,
}

impl QueryDate {
    /// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` and
    /// `YYYY-MM-DDTHH:MM:SS`.
    pub fn parse(s: &str) -> Option<QueryDate> {
        let granularity = match s.len() {
            4 if s.chars().all(|c| c.is_ascii_digit()) => Granularity::Year,
            7 => {
                NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()?;
                Granularity::Month
            }
            10 => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
                Granularity::Day
            }
            16 => {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").ok()?;
                Granularity::Minute
            }
            19 => {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok()?;
                Granularity::Second
            }
            _ => return None,
        };
        Some(QueryDate {
            text: s.to_string(),
            granularity,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// `2020||/y`
    pub fn date_math(&self) -> String {
        format!("{}||/{}", self.text, self.granularity.date_math_unit())
    }
}

impl fmt::Display for QueryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum InvalidKind {
    /// Not a term admissible for the property.
    Forbidden,
    Ambiguous(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum Value {
    Literal(Token),
    Numeric {
        value: i64,
        token: Token,
    },
    DateTime {
        date: QueryDate,
        token: Token,
    },
    /// `1990-2000`, `-2000` or `1990-`.
    YearRange {
        min: Option<u16>,
        max: Option<u16>,
        token: Token,
    },
    Link {
        iri: String,
        description: Json,
        token: Token,
    },
    VocabTerm {
        key: String,
        description: Json,
        token: Token,
    },
    /// A multi-token value such as `title:(a b)`.
    FreeText {
        tokens: Vec<Token>,
        connective: Connective,
    },
    Invalid {
        kind: InvalidKind,
        token: Token,
    },
    Wildcard,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Literal(a), Value::Literal(b)) => a == b,
            (Value::Numeric { value: a, .. }, Value::Numeric { value: b, .. }) => a == b,
            (Value::DateTime { date: a, .. }, Value::DateTime { date: b, .. }) => a == b,
            (
                Value::YearRange { min: a0, max: a1, .. },
                Value::YearRange { min: b0, max: b1, .. },
            ) => a0 == b0 && a1 == b1,
            (Value::Link { iri: a, .. }, Value::Link { iri: b, .. }) => a == b,
            (Value::VocabTerm { key: a, .. }, Value::VocabTerm { key: b, .. }) => a == b,
            (
                Value::FreeText {
                    tokens: a,
                    connective: ac,
                },
                Value::FreeText {
                    tokens: b,
                    connective: bc,
                },
            ) => a == b && ac == bc,
            (Value::Invalid { kind: ak, token: a }, Value::Invalid { kind: bk, token: b }) => {
                ak == bk && a == b
            }
            (Value::Wildcard, Value::Wildcard) => true,
            _ => false,
        }
    }
}

impl Value {
    /// The value as it appears in a re-serialized query.
    pub fn query_form(&self) -> String {
        match self {
            Value::Literal(token)
            | Value::Numeric { token, .. }
            | Value::DateTime { token, .. }
            | Value::YearRange { token, .. }
            | Value::Link { token, .. }
            | Value::Invalid { token, .. } => token.formatted(),
            Value::VocabTerm { key, .. } => Token::synthetic(key.as_str()).formatted(),
            Value::FreeText { tokens, connective } => tokens
                .iter()
                .map(Token::formatted)
                .collect::<Vec<_>>()
                .join(connective.delimiter()),
            Value::Wildcard => "*".to_string(),
        }
    }

    /// Terms handed to the engine's text queries and how they are joined.
    pub fn text_terms(&self) -> (Vec<String>, Connective) {
        match self {
            Value::Literal(token)
            | Value::Numeric { token, .. }
            | Value::DateTime { token, .. }
            | Value::YearRange { token, .. }
            | Value::Link { token, .. }
            | Value::VocabTerm { token, .. }
            | Value::Invalid { token, .. } => (vec![token.value.clone()], Connective::And),
            Value::FreeText { tokens, connective } => {
                let terms = tokens
                    .iter()
                    .map(|t| if t.quoted { t.formatted() } else { t.value.clone() })
                    .collect();
                (terms, *connective)
            }
            Value::Wildcard => (vec!["*".to_string()], Connective::And),
        }
    }

    /// Whether the value can be compared with `<`, `>` and friends.
    pub fn is_range_compatible(&self) -> bool {
        matches!(self, Value::Numeric { .. } | Value::DateTime { .. })
    }

    pub fn is_multi_token(&self) -> bool {
        matches!(self, Value::FreeText { tokens, .. } if tokens.len() > 1)
    }

    pub fn tokens(&self) -> Vec<&Token> {
        match self {
            Value::Literal(token)
            | Value::Numeric { token, .. }
            | Value::DateTime { token, .. }
            | Value::YearRange { token, .. }
            | Value::Link { token, .. }
            | Value::VocabTerm { token, .. }
            | Value::Invalid { token, .. } => vec![token],
            Value::FreeText { tokens, .. } => tokens.iter().collect(),
            Value::Wildcard => Vec::new(),
        }
    }

    /// Description used in search mappings: the term itself for resources,
    /// the query form otherwise.
    pub fn describe(&self) -> Json {
        match self {
            Value::Link { description, .. } | Value::VocabTerm { description, .. } => {
                description.clone()
            }
            other => Json::String(other.query_form()),
        }
    }
}
