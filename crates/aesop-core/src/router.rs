//! Router: picks Route A/B/C for research/followup_research intents.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::types::{Intent, Route};

static DEICTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(these|those|this|that)\s+(studies|papers|results|articles|findings)\b|\b(them|it)\b")
        .unwrap()
});

static EXPLICIT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bpmid\s*\d+\b|\b(first|second|third|paper|study)\s*\d?\b").unwrap());

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "on", "and", "or", "to", "for", "with", "is", "are", "was",
    "were", "by", "at", "as", "from", "that", "this", "it",
];

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .map(String::from)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Computes Jaccard similarity between the message and the union of cached
/// paper titles' tokens.
pub fn keyword_overlap(message: &str, session_paper_titles: &[String]) -> f64 {
    let message_tokens = tokenize(message);
    let title_tokens: HashSet<String> =
        session_paper_titles.iter().flat_map(|t| tokenize(t)).collect();
    jaccard(&message_tokens, &title_tokens)
}

pub fn has_deictic_or_explicit_signal(message: &str) -> bool {
    DEICTIC.is_match(message) || EXPLICIT_REF.is_match(message)
}

/// Decides the route. Tie-breaks at the exact 0.15/0.35 boundaries favor the
/// more conservative (higher-effort) route.
pub fn route(intent: Intent, has_session: bool, message: &str, session_paper_titles: &[String]) -> Route {
    if !has_session {
        return Route::A;
    }

    let signal = has_deictic_or_explicit_signal(message);
    let jaccard = keyword_overlap(message, session_paper_titles);

    if intent == Intent::FollowupResearch || signal || jaccard > 0.35 {
        return Route::C;
    }
    if jaccard > 0.15 {
        return Route::B;
    }
    Route::A
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_session_always_routes_a() {
        assert_eq!(route(Intent::Research, false, "tell me more about those studies", &[]), Route::A);
    }

    #[test]
    fn followup_intent_forces_route_c() {
        let titles = vec!["KRAS G12D inhibitors in pancreatic cancer".to_string()];
        assert_eq!(route(Intent::FollowupResearch, true, "new unrelated question", &titles), Route::C);
    }

    #[test]
    fn deictic_marker_forces_route_c() {
        let titles = vec!["EGFR mutations in lung cancer".to_string()];
        assert_eq!(route(Intent::Research, true, "summarize these papers", &titles), Route::C);
    }

    #[test]
    fn explicit_pmid_reference_forces_route_c() {
        let titles = vec!["EGFR mutations in lung cancer".to_string()];
        assert_eq!(route(Intent::Research, true, "what does pmid 12345678 say", &titles), Route::C);
    }

    #[test]
    fn high_jaccard_overlap_routes_c() {
        let titles = vec!["KRAS G12D inhibitors pancreatic cancer treatment options".to_string()];
        assert_eq!(
            route(Intent::Research, true, "KRAS G12D inhibitors pancreatic cancer", &titles),
            Route::C
        );
    }

    #[test]
    fn mid_jaccard_overlap_routes_b() {
        let titles = vec!["KRAS G12D inhibitors pancreatic cancer treatment options safety".to_string()];
        let sim = keyword_overlap("pancreatic cancer safety profile", &titles);
        assert!(sim > 0.15 && sim <= 0.35, "expected mid-range jaccard, got {sim}");
        assert_eq!(route(Intent::Research, true, "pancreatic cancer safety profile", &titles), Route::B);
    }

    #[test]
    fn low_jaccard_overlap_routes_a() {
        let titles = vec!["KRAS G12D inhibitors in pancreatic cancer".to_string()];
        assert_eq!(route(Intent::Research, true, "what about diabetes treatment", &titles), Route::A);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a: HashSet<String> = ["x".to_string()].into_iter().collect();
        let b: HashSet<String> = ["y".to_string()].into_iter().collect();
        assert_eq!(jaccard(&a, &b), 0.0);
    }
}
