//! Scoring wrappers around the main query.

use crate::settings::{BoostSettings, ScoreFunction};
use serde_json::{json, Value as Json};

/// `function_score` around `query` when score functions are configured, then
/// constant-score boosts beside it.
pub(crate) fn apply(query: Json, boost: &BoostSettings) -> Json {
    let query = function_score(query, boost);
    constant_scores(query, boost)
}

fn function_score(query: Json, boost: &BoostSettings) -> Json {
    let settings = &boost.function_score;
    if settings.functions.is_empty() {
        return query;
    }
    let functions: Vec<Json> = settings.functions.iter().map(score_function).collect();
    let mut body = json!({ "query": query, "functions": functions });
    if let Some(map) = body.as_object_mut() {
        if let Some(mode) = &settings.score_mode {
            map.insert("score_mode".to_string(), json!(mode));
        }
        if let Some(mode) = &settings.boost_mode {
            map.insert("boost_mode".to_string(), json!(mode));
        }
    }
    json!({ "function_score": body })
}

fn score_function(function: &ScoreFunction) -> Json {
    match function {
        ScoreFunction::FieldValueFactor {
            field,
            factor,
            modifier,
            missing,
            weight,
        } => json!({
            "field_value_factor": {
                "field": field,
                "factor": factor,
                "modifier": modifier,
                "missing": missing,
            },
            "weight": weight,
        }),
        ScoreFunction::MatchingFieldValue { field, value, boost } => json!({
            "script_score": {
                "script": {
                    "source": format!("doc['{field}'].value == '{value}' ? {boost} : 0"),
                }
            }
        }),
    }
}

fn constant_scores(query: Json, boost: &BoostSettings) -> Json {
    if boost.constant_score.is_empty() {
        return query;
    }
    let boosts: Vec<Json> = boost
        .constant_score
        .iter()
        .map(|c| {
            json!({
                "constant_score": {
                    "filter": { "term": { c.field.as_str(): c.value } },
                    "boost": c.score,
                }
            })
        })
        .collect();
    json!({ "bool": { "must": [query], "should": boosts } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ConstantScore, FunctionScore};

    #[test]
    fn no_configuration_leaves_the_query_alone() {
        let q = json!({ "match_all": {} });
        assert_eq!(apply(q.clone(), &BoostSettings::default()), q);
    }

    #[test]
    fn function_and_constant_scores_wrap_in_order() {
        let boost = BoostSettings {
            function_score: FunctionScore {
                functions: vec![
                    ScoreFunction::FieldValueFactor {
                        field: "reverseLinks.totalItems".into(),
                        factor: 1.5,
                        modifier: "log1p".into(),
                        missing: 0.0,
                        weight: 2.0,
                    },
                    ScoreFunction::MatchingFieldValue {
                        field: "@type".into(),
                        value: "Print".into(),
                        boost: 10.0,
                    },
                ],
                score_mode: Some("sum".into()),
                boost_mode: None,
            },
            constant_score: vec![ConstantScore {
                field: "language.@id".into(),
                value: "https://id.kb.se/language/swe".into(),
                score: 5,
            }],
            ..BoostSettings::default()
        };
        let q = apply(json!({ "match_all": {} }), &boost);
        let scored = &q["bool"]["must"][0]["function_score"];
        assert_eq!(scored["score_mode"], "sum");
        assert!(scored.get("boost_mode").is_none());
        assert_eq!(scored["functions"][0]["field_value_factor"]["modifier"], "log1p");
        assert_eq!(
            scored["functions"][1]["script_score"]["script"]["source"],
            "doc['@type'].value == 'Print' ? 10 : 0"
        );
        assert_eq!(
            q["bool"]["should"][0]["constant_score"]["filter"]["term"]["language.@id"],
            "https://id.kb.se/language/swe"
        );
    }
}
