//! Small helpers shared across the pipeline.

use std::collections::BTreeMap;
use url::form_urlencoded;

pub fn parenthesize(s: &str) -> String {
    format!("({s})")
}

/// Edit distance between `a` and `b`, or `None` once it must exceed `max`.
fn bounded_distance(a: &[char], b: &[char], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + usize::from(ca != cb));
            diagonal = above;
        }
        if row.iter().all(|&d| d > max) {
            return None;
        }
    }
    row.last().copied().filter(|&d| d <= max)
}

/// Up to `limit` candidates within `max_dist` case-insensitive edits of
/// `input`, closest first.
pub fn suggestions<'a>(
    input: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    max_dist: usize,
    limit: usize,
) -> Vec<String> {
    let lowered = |s: &str| -> Vec<char> { s.to_lowercase().chars().collect() };
    let input = lowered(input);
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter_map(|c| bounded_distance(&lowered(c), &input, max_dist).map(|d| (d, c)))
        .collect();
    scored.sort_unstable();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(limit).map(|(_, c)| c.to_string()).collect()
}

/// `/find?_q=<query>&<params>`, form-encoded with `:`, `/` and `@` left readable.
pub fn find_url(query: &str, params: &BTreeMap<String, String>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.append_pair("_q", query);
    for (k, v) in params.iter().filter(|(k, _)| k.as_str() != "_q") {
        serializer.append_pair(k, v);
    }
    let encoded = serializer
        .finish()
        .replace("%3A", ":")
        .replace("%2F", "/")
        .replace("%40", "@");
    format!("/find?{encoded}")
}
