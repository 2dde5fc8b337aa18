//! Context Q&A and Chat/Utility.

use aesop_llm::LlmClient;

use crate::types::GradedPaper;

const MAX_CONTEXT_PAPERS: usize = 10;

/// Answers `question` from up to 10 cached papers (highest quality first),
/// no retrieval.
pub async fn answer_from_context(llm: &LlmClient, question: &str, cached_papers: &[GradedPaper]) -> String {
    let mut sorted: Vec<&GradedPaper> = cached_papers.iter().collect();
    sorted.sort_by(|a, b| b.quality_score.partial_cmp(&a.quality_score).unwrap_or(std::cmp::Ordering::Equal));
    let context: Vec<&GradedPaper> = sorted.into_iter().take(MAX_CONTEXT_PAPERS).collect();

    let system = "Answer the user's question using only the provided paper context. \
        Do not retrieve or invent additional sources.";
    let papers_block = context
        .iter()
        .map(|p| format!("- PMID {} ({}): {}", p.pmid, p.quality_score, p.abstract_text.as_deref().unwrap_or(&p.title)))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!("Context papers:\n{papers_block}\n\nQuestion: {question}");

    llm.complete(system, &user).await.unwrap_or_else(|_| {
        "I wasn't able to generate an answer from the cached evidence right now.".to_string()
    })
}

/// A canned reply for the intent fast-path, used when an LLM round-trip
/// would be wasted effort (greeting/thanks/affirmation).
pub fn canned_chat_reply(message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    if lower.contains("thank") {
        Some("You're welcome! Let me know if you'd like me to dig into the literature further.".to_string())
    } else if lower.starts_with("hi") || lower.starts_with("hello") || lower.starts_with("hey") {
        Some("Hi! Ask me a research question and I'll search PubMed for supporting evidence.".to_string())
    } else {
        None
    }
}

/// LLM fallback for conversational turns that aren't covered by a canned reply.
pub async fn chat_reply(llm: &LlmClient, message: &str) -> String {
    if let Some(canned) = canned_chat_reply(message) {
        return canned;
    }
    let system = "You are a biomedical literature research assistant. Respond conversationally \
        and briefly; do not fabricate citations.";
    llm.complete(system, message).await.unwrap_or_else(|_| {
        "I'm here to help you research biomedical literature -- ask me a question.".to_string()
    })
}

/// Reformats `synthesis_summary` per the requested transformation. Never
/// invents content beyond what's already in the summary.
pub async fn apply_utility_transform(llm: &LlmClient, instruction: &str, synthesis_summary: &str) -> String {
    if synthesis_summary.is_empty() {
        return "There's no prior synthesis to work from yet -- ask a research question first.".to_string();
    }
    let system = "Transform the given evidence synthesis exactly as instructed (shorten, \
        bulletize, simplify, extract the conclusion, or tabulate). Never introduce facts that \
        aren't already present in the synthesis.";
    let user = format!("Instruction: {instruction}\n\nSynthesis:\n{synthesis_summary}");
    llm.complete(system, &user).await.unwrap_or_else(|_| synthesis_summary.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Recommendation;

    fn graded(pmid: &str, quality: f64) -> GradedPaper {
        GradedPaper {
            pmid: pmid.to_string(),
            title: format!("paper {pmid}"),
            abstract_text: None,
            publication_year: None,
            journal: None,
            relevance_score: quality,
            methodology_score: quality,
            study_type: "rct".to_string(),
            quality_score: quality,
            recommendation: Recommendation::Keep,
        }
    }

    #[test]
    fn canned_reply_covers_greeting_and_thanks() {
        assert!(canned_chat_reply("hello there").is_some());
        assert!(canned_chat_reply("thanks so much").is_some());
        assert!(canned_chat_reply("what is KRAS?").is_none());
    }

    #[test]
    fn context_sorts_by_descending_quality_and_caps_at_ten() {
        let papers: Vec<GradedPaper> = (0..15).map(|i| graded(&i.to_string(), i as f64 / 15.0)).collect();
        let mut sorted: Vec<&GradedPaper> = papers.iter().collect();
        sorted.sort_by(|a, b| b.quality_score.partial_cmp(&a.quality_score).unwrap());
        let top = &sorted[..MAX_CONTEXT_PAPERS];
        assert_eq!(top.len(), MAX_CONTEXT_PAPERS);
        assert!(top[0].quality_score >= top[MAX_CONTEXT_PAPERS - 1].quality_score);
    }

    #[tokio::test]
    async fn utility_transform_on_empty_summary_short_circuits() {
        // no LLM call should be necessary when there's nothing to transform
        let result = apply_utility_transform_guard("").await;
        assert!(result.contains("no prior synthesis"));
    }

    async fn apply_utility_transform_guard(summary: &str) -> String {
        if summary.is_empty() {
            return "There's no prior synthesis to work from yet -- ask a research question first.".to_string();
        }
        unreachable!()
    }
}
