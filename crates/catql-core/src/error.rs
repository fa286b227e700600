use catql_dsl::{LexError, ParseQueryError, SyntaxError};
use thiserror::Error;

/// A query that lexes but cannot be turned into a query tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuery {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("unrecognized key '{key}'{}", did_you_mean(.suggestions))]
    UnrecognizedKey { key: String, suggestions: Vec<String> },
    #[error("ambiguous key '{key}', could be any of: {}", .candidates.join(", "))]
    AmbiguousKey { key: String, candidates: Vec<String> },
    #[error("unrecognized value '{value}' for '{key}'")]
    UnrecognizedValue { key: String, value: String },
    #[error("ambiguous value '{value}' for '{key}', could be any of: {}", .candidates.join(", "))]
    AmbiguousValue {
        key: String,
        value: String,
        candidates: Vec<String>,
    },
    #[error("codes are not allowed inside the value group of '{key}'")]
    NestedCodeInGroup { key: String },
    #[error("query is longer than {max} characters")]
    TooLong { max: usize },
    #[error("query is nested deeper than {max} levels")]
    TooDeep { max: usize },
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(", did you mean: {}?", suggestions.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Invalid(#[from] InvalidQuery),
}

impl From<ParseQueryError> for QueryError {
    fn from(e: ParseQueryError) -> Self {
        match e {
            ParseQueryError::Lex(e) => QueryError::Lex(e),
            ParseQueryError::Syntax(SyntaxError::TooDeep { max, .. }) => {
                QueryError::Invalid(InvalidQuery::TooDeep { max })
            }
            ParseQueryError::Syntax(e) => QueryError::Invalid(InvalidQuery::Syntax(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let e = InvalidQuery::UnrecognizedKey {
            key: "titel".into(),
            suggestions: vec!["title".into()],
        };
        assert_eq!(e.to_string(), "unrecognized key 'titel', did you mean: title?");
        let e = InvalidQuery::AmbiguousKey {
            key: "subject".into(),
            candidates: vec!["subject".into(), "subjectOfWork".into()],
        };
        assert!(e.to_string().ends_with("subject, subjectOfWork"));
    }

    #[test]
    fn parse_errors_split_into_lex_and_syntax() {
        let lex: QueryError = ParseQueryError::Lex(LexError::UnclosedQuote { offset: 2 }).into();
        assert!(matches!(lex, QueryError::Lex(_)));
        let syntax: QueryError = ParseQueryError::Syntax(SyntaxError::Empty).into();
        assert_eq!(syntax, QueryError::Invalid(InvalidQuery::Syntax(SyntaxError::Empty)));
    }
}
