//! Synthesizer: produces the structured markdown review from graded papers.

use aesop_llm::LlmClient;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::GradedPaper;

const HIGH_QUALITY_THRESHOLD: f64 = 0.7;

static PMID_CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)PMID\s+(\d+)").unwrap());

/// Produces a markdown review with fixed H2 sections, then strips any PMID
/// citation the LLM invented that isn't in `papers`: citations are injected
/// by the caller, never trusted from the model as-is.
pub async fn synthesize(llm: &LlmClient, query: &str, papers: &[GradedPaper]) -> String {
    let high: Vec<&GradedPaper> = papers.iter().filter(|p| p.quality_score >= HIGH_QUALITY_THRESHOLD).collect();
    let low: Vec<&GradedPaper> = papers.iter().filter(|p| p.quality_score < HIGH_QUALITY_THRESHOLD).collect();

    let system = "Write a structured evidence review in markdown with exactly these H2 sections, \
        in order: ## Background, ## High-Quality Evidence, ## Lower-Quality Evidence, \
        ## Limitations, ## Conclusion. Cite papers inline as 'PMID <number>'.";
    let user = format!(
        "Research question: {query}\n\nHigh-quality evidence:\n{}\n\nLower-quality evidence:\n{}",
        format_papers(&high),
        format_papers(&low),
    );

    let draft = match llm.complete(system, &user).await {
        Ok(text) => text,
        Err(_) => fallback_synthesis(query, &high, &low),
    };

    strip_unknown_citations(&draft, papers)
}

fn format_papers(papers: &[&GradedPaper]) -> String {
    if papers.is_empty() {
        return "(none)".to_string();
    }
    papers
        .iter()
        .map(|p| {
            format!(
                "- PMID {} ({}): {}",
                p.pmid,
                p.quality_score,
                p.abstract_text.as_deref().unwrap_or(&p.title)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fallback_synthesis(query: &str, high: &[&GradedPaper], low: &[&GradedPaper]) -> String {
    format!(
        "## Background\n\nEvidence review for: {query}\n\n\
         ## High-Quality Evidence\n\n{}\n\n\
         ## Lower-Quality Evidence\n\n{}\n\n\
         ## Limitations\n\nSynthesis was generated without an LLM summary due to an upstream error.\n\n\
         ## Conclusion\n\nSee cited papers for details.",
        format_papers(high),
        format_papers(low),
    )
}

fn strip_unknown_citations(draft: &str, papers: &[GradedPaper]) -> String {
    let known: std::collections::HashSet<&str> = papers.iter().map(|p| p.pmid.as_str()).collect();
    PMID_CITATION
        .replace_all(draft, |caps: &regex::Captures| {
            let pmid = &caps[1];
            if known.contains(pmid) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Recommendation;

    fn graded(pmid: &str, quality: f64) -> GradedPaper {
        GradedPaper {
            pmid: pmid.to_string(),
            title: format!("paper {pmid}"),
            abstract_text: Some("abstract".to_string()),
            publication_year: Some(2020),
            journal: None,
            relevance_score: quality,
            methodology_score: quality,
            study_type: "rct".to_string(),
            quality_score: quality,
            recommendation: Recommendation::Keep,
        }
    }

    #[test]
    fn strips_citation_to_pmid_not_in_paper_set() {
        let papers = vec![graded("111", 0.8)];
        let draft = "Evidence shows a link (PMID 111). Another study (PMID 999) disagrees.";
        let cleaned = strip_unknown_citations(draft, &papers);
        assert!(cleaned.contains("PMID 111"));
        assert!(!cleaned.contains("PMID 999"));
    }

    #[test]
    fn fallback_synthesis_contains_all_five_sections() {
        let high = vec![graded("1", 0.9)];
        let low = vec![graded("2", 0.5)];
        let high_refs: Vec<&GradedPaper> = high.iter().collect();
        let low_refs: Vec<&GradedPaper> = low.iter().collect();
        let text = fallback_synthesis("KRAS inhibitors", &high_refs, &low_refs);
        for section in ["## Background", "## High-Quality Evidence", "## Lower-Quality Evidence", "## Limitations", "## Conclusion"] {
            assert!(text.contains(section), "missing section {section}");
        }
    }
}
