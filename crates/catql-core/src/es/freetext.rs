//! Text clauses: `simple_query_string` when the text allows it, an escaped
//! `query_string` otherwise.

use super::dsl;
use crate::settings::FieldBoost;
use catql_dsl::Connective;
use catql_vocab::model::SEARCH_KEY;
use regex::Regex;
use serde_json::{json, Value as Json};
use std::sync::OnceLock;

const EXACT_SUFFIX: &str = ".exact";

fn non_simple_query() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\[?]|([*?])\S+").expect("valid regex"))
}

/// Text the `simple_query_string` syntax handles as intended.
pub fn is_simple_query(text: &str) -> bool {
    !non_simple_query().is_match(text)
}

/// Trimmed, with whitespace runs collapsed to one space.
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape `query_string` syntax the user did not mean. A leading `-` on a
/// word keeps its exclusion meaning.
pub(crate) fn escape_non_simple(text: &str) -> String {
    let text = text.replace("\\?", "?");
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        match c {
            '<' | '>' => {}
            '=' | '&' | '!' | '{' | '}' | '[' | ']' | '^' | ':' | '/' => {
                out.push('\\');
                out.push(c);
            }
            '-' if prev.map_or(true, char::is_whitespace) => out.push('-'),
            '-' => out.push_str("\\-"),
            c => out.push(c),
        }
        prev = Some(c);
    }
    out
}

/// Which fields a text query searches.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    /// The configured boosted fields.
    Boosted,
    /// One field at the default boost.
    Field(&'a str),
}

/// `terms` joined by `connective` in the syntax of the chosen query mode;
/// `simple_query_string` spells disjunction `|`.
pub(crate) fn text_query(
    terms: &[String],
    connective: Connective,
    negated: bool,
    target: Target<'_>,
    boost: &FieldBoost,
) -> Json {
    let terms: Vec<String> = terms.iter().map(|t| normalize(t)).collect();
    let simple = terms.iter().all(|t| is_simple_query(t));
    let (mode, query) = match (simple, connective) {
        (true, Connective::And) => ("simple_query_string", terms.join(" ")),
        (true, Connective::Or) => ("simple_query_string", terms.join(" | ")),
        (false, connective) => {
            let escaped: Vec<String> = terms.iter().map(|t| escape_non_simple(t)).collect();
            ("query_string", escaped.join(connective.delimiter()))
        }
    };

    let fields: Vec<(String, u32)> = match target {
        Target::Boosted => boost.fields.iter().map(|(f, b)| (f.clone(), b.boost)).collect(),
        Target::Field(f) => vec![(f.to_string(), boost.default_boost_factor)],
    };
    let boosted = |fields: &[(String, u32)]| -> Vec<String> {
        fields.iter().map(|(f, b)| format!("{f}^{b}")).collect()
    };
    let clause = |fields: Vec<String>, extra: Option<(&str, &str)>| -> Json {
        let mut body = json!({
            "query": query,
            "fields": fields,
            "analyze_wildcard": boost.analyze_wildcard,
            "default_operator": "AND",
        });
        if let (Some((k, v)), Some(map)) = (extra, body.as_object_mut()) {
            map.insert(k.to_string(), json!(v));
        }
        json!({ mode: body })
    };

    let mut clauses = vec![clause(boosted(&fields), None)];

    let soft: Vec<(String, u32)> = fields.iter().filter(|(f, _)| f.contains(SEARCH_KEY)).cloned().collect();
    if !soft.is_empty() {
        clauses.push(clause(boosted(&soft), Some(("quote_field_suffix", EXACT_SUFFIX))));
    }

    if boost.include_exact_fields && !soft.is_empty() {
        let exact: Vec<(String, u32)> = soft
            .iter()
            .map(|(f, b)| (f.replace(SEARCH_KEY, &format!("{SEARCH_KEY}{EXACT_SUFFIX}")), *b))
            .collect();
        clauses.push(clause(boosted(&exact), None));
    }

    if let (Target::Boosted, Some(kind)) = (target, boost.multi_match_type.as_deref()) {
        let divisor = boost.phrase_boost_divisor.max(1);
        let phrase_fields: Vec<String> = fields
            .iter()
            .map(|(f, b)| format!("{f}^{}", (b / divisor).max(1)))
            .collect();
        clauses.push(json!({
            "multi_match": { "query": query, "type": kind, "fields": phrase_fields }
        }));
    }

    if let Target::Boosted = target {
        for (field, settings) in &boost.fields {
            if let Some(script) = &settings.script_score {
                clauses.push(json!({
                    "script_score": {
                        "query": clause(vec![field.clone()], None),
                        "script": { "source": format!("{} ? {} : _score", script.apply_if, script.function) },
                    }
                }));
            }
        }
    }

    let combined = if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        dsl::should(clauses)
    };
    if negated {
        dsl::must_not(combined)
    } else {
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BoostedField, ScriptScore};
    use std::collections::BTreeMap;

    fn boost() -> FieldBoost {
        FieldBoost {
            fields: BTreeMap::from([
                ("_str".to_string(), BoostedField { boost: 100, script_score: None }),
                ("title".to_string(), BoostedField { boost: 10, script_score: None }),
            ]),
            ..FieldBoost::default()
        }
    }

    fn terms(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn or_runs_use_each_modes_disjunction() {
        let title = |values: &[&str], connective| {
            text_query(&terms(values), connective, false, Target::Field("title"), &boost())
        };
        let q = title(&["foo", "\"bar baz\"", "qux"], Connective::Or);
        assert_eq!(q["simple_query_string"]["query"], "foo | \"bar baz\" | qux");
        assert_eq!(title(&["fo*o", "qux"], Connective::Or)["query_string"]["query"], "fo*o OR qux");
        assert_eq!(title(&["foo", "qux"], Connective::And)["simple_query_string"]["query"], "foo qux");
    }

    #[test]
    fn simple_detection() {
        assert!(is_simple_query("hamlet prince"));
        assert!(is_simple_query("hamlet*"));
        assert!(!is_simple_query("ham*let"));
        assert!(!is_simple_query("what\\?"));
    }

    #[test]
    fn escaping_keeps_exclusions() {
        assert_eq!(escape_non_simple("-x a-b c:d <e>"), "-x a\\-b c\\:d e");
        assert_eq!(escape_non_simple("what\\?"), "what?");
        assert_eq!(normalize("  a \t b  "), "a b");
    }

    #[test]
    fn single_field_queries_stay_flat() {
        let q = text_query(&terms(&["Hamlet"]), Connective::And, false, Target::Field("title"), &boost());
        assert_eq!(
            q,
            json!({ "simple_query_string": {
                "query": "Hamlet",
                "fields": ["title^1"],
                "analyze_wildcard": true,
                "default_operator": "AND",
            }})
        );
    }

    #[test]
    fn boosted_queries_add_soft_and_script_clauses() {
        let mut b = boost();
        b.include_exact_fields = true;
        b.fields.insert(
            "hasTitle._str".into(),
            BoostedField {
                boost: 50,
                script_score: Some(ScriptScore {
                    function: "_score * 2".into(),
                    apply_if: "doc['x'].size() > 0".into(),
                }),
            },
        );
        let q = text_query(&terms(&["ham*let"]), Connective::And, true, Target::Boosted, &b);
        let should = &q["bool"]["must_not"]["bool"]["should"];
        // fields, soft, exact and one script score
        assert_eq!(should.as_array().map(Vec::len), Some(4));
        assert_eq!(should[0]["query_string"]["query"], "ham*let");
        assert_eq!(should[1]["query_string"]["quote_field_suffix"], ".exact");
        assert_eq!(should[2]["query_string"]["fields"], json!(["_str.exact^100", "hasTitle._str.exact^50"]));
        assert_eq!(
            should[3]["script_score"]["script"]["source"],
            "doc['x'].size() > 0 ? _score * 2 : _score"
        );
    }
}
