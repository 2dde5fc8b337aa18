//! Critic -- the hard core: grades each paper, enforces the scoring
//! rubric, makes the CRAG global decision, and reads/writes acceptance memory.

use aesop_config::CragConfig;
use aesop_db::{AcceptanceMemory, AcceptanceRecord};
use aesop_llm::{EmbeddingClient, LlmClient};
use aesop_pubmed::Paper;
use std::collections::HashMap;
use std::time::Duration;

use crate::types::{CriticDecision, GradedPaper, PaperGrade, RawGrade, Recommendation};

const INTER_CALL_DELAY: Duration = Duration::from_millis(500);

/// Minimum methodology score each study type implies, regardless of the
/// LLM's own grade.
fn study_type_priors() -> HashMap<&'static str, f64> {
    HashMap::from([
        ("meta-analysis", 0.85),
        ("systematic review", 0.80),
        ("randomized controlled trial", 0.70),
        ("rct", 0.70),
        ("cohort study", 0.55),
        ("case-control study", 0.50),
        ("cross-sectional study", 0.45),
        ("case series", 0.30),
        ("case study", 0.25),
        ("expert opinion", 0.20),
    ])
}

fn parse_recommendation(s: &str) -> Recommendation {
    match s.to_uppercase().as_str() {
        "KEEP" => Recommendation::Keep,
        "NEEDS_MORE" => Recommendation::NeedsMore,
        _ => Recommendation::Discard,
    }
}

/// Applies the non-negotiable score-enforcement steps to a raw LLM grade,
/// producing the authoritative `PaperGrade`.
pub fn enforce_grade(pmid: &str, raw: RawGrade, crag: &CragConfig) -> PaperGrade {
    let priors = study_type_priors();
    let study_type = raw.study_type.to_lowercase();
    let relevance_score = raw.relevance_score.clamp(0.0, 1.0);
    let mut methodology_score = raw.methodology_score.clamp(0.0, 1.0);

    if let Some(&prior) = priors.get(study_type.as_str()) {
        methodology_score = methodology_score.max(prior);
    }

    let mut recommendation = parse_recommendation(&raw.recommendation);
    if relevance_score < crag.min_relevance_to_keep || methodology_score < crag.min_methodology_to_keep {
        recommendation = Recommendation::Discard;
    }

    PaperGrade {
        pmid: pmid.to_string(),
        relevance_score,
        methodology_score,
        sample_size_adequate: raw.sample_size_adequate,
        study_type,
        recommendation,
    }
}

/// A terminal per-paper grading failure synthesizes a zero-score DISCARD
/// grade so the loop continues.
fn discard_zero_grade(pmid: &str) -> PaperGrade {
    PaperGrade {
        pmid: pmid.to_string(),
        relevance_score: 0.0,
        methodology_score: 0.0,
        sample_size_adequate: false,
        study_type: String::new(),
        recommendation: Recommendation::Discard,
    }
}

/// Grades every paper in sequence, honoring the 500ms inter-call delay
/// between evaluations and the retry/backoff wrapper carried by
/// `LlmClient::complete_json`.
pub async fn grade_papers(llm: &LlmClient, papers: &[Paper], crag: &CragConfig) -> Vec<PaperGrade> {
    let mut grades = Vec::with_capacity(papers.len());
    for (i, paper) in papers.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(INTER_CALL_DELAY).await;
        }

        let system = "Grade this paper's relevance and methodology for the given research \
            question. Respond with strict JSON: {\"relevance_score\": number, \"methodology_score\": \
            number, \"sample_size_adequate\": bool, \"study_type\": string, \"recommendation\": \
            \"KEEP\"|\"DISCARD\"|\"NEEDS_MORE\"}.";
        let user = format!(
            "Title: {}\nAbstract: {}",
            paper.title,
            paper.abstract_text.as_deref().unwrap_or("(no abstract)")
        );

        let grade = match llm.complete_json::<RawGrade>(system, &user).await {
            Ok(raw) => enforce_grade(&paper.pmid, raw, crag),
            Err(_) => discard_zero_grade(&paper.pmid),
        };
        grades.push(grade);
    }
    grades
}

pub struct CragOutcome {
    pub decision: CriticDecision,
    pub avg_quality: f64,
    pub graded_papers: Vec<GradedPaper>,
}

/// The CRAG global decision, including the forced-sufficient termination at
/// `iteration >= max_iterations`.
pub fn crag_decision(
    papers: &[Paper],
    grades: &[PaperGrade],
    iteration: u32,
    max_iterations: u32,
    memory_boost: f64,
    crag: &CragConfig,
) -> CragOutcome {
    let n = grades.len().max(1) as f64;
    let keep_ratio = grades.iter().filter(|g| g.recommendation == Recommendation::Keep).count() as f64 / n;
    let discard_ratio =
        grades.iter().filter(|g| g.recommendation == Recommendation::Discard).count() as f64 / n;

    let non_discard: Vec<&PaperGrade> =
        grades.iter().filter(|g| g.recommendation != Recommendation::Discard).collect();
    let avg_quality = if non_discard.is_empty() {
        0.0
    } else {
        non_discard.iter().map(|g| (g.relevance_score + g.methodology_score) / 2.0).sum::<f64>()
            / non_discard.len() as f64
    };

    let effective_threshold = (crag.min_avg_quality_for_sufficient
        - iteration as f64 * crag.confidence_decay_rate
        - memory_boost)
        .max(crag.min_confidence_floor);

    let mut decision = if keep_ratio >= crag.keep_ratio_threshold {
        CriticDecision::Sufficient
    } else if discard_ratio >= crag.max_discard_ratio {
        CriticDecision::RetrieveMore
    } else if avg_quality >= effective_threshold {
        CriticDecision::Sufficient
    } else {
        CriticDecision::RetrieveMore
    };

    if decision == CriticDecision::RetrieveMore && iteration + 1 >= max_iterations {
        decision = CriticDecision::Sufficient;
    }

    let graded_papers: Vec<GradedPaper> = papers
        .iter()
        .filter_map(|p| {
            let grade = grades.iter().find(|g| g.pmid == p.pmid)?;
            if grade.recommendation == Recommendation::Discard {
                None
            } else {
                Some(GradedPaper::from_paper_and_grade(p, grade))
            }
        })
        .collect();

    CragOutcome { decision, avg_quality, graded_papers }
}

/// Reads the memory bias for `query`. Embeds the query only if no exact-hash
/// rows exist; degrades to `None` on embedding failure (the memory layer
/// itself degrades storage errors to 0.0).
pub async fn fetch_memory_bias(
    memory: &AcceptanceMemory,
    embedder: &EmbeddingClient,
    query: &str,
    crag: &CragConfig,
) -> f64 {
    let embedding = embedder.embed(query).await;
    memory.fetch_memory_bias(query, embedding.as_deref(), crag.max_memory_boost, crag.memory_decay_lambda).await
}

/// Writes every KEEP paper whose quality_score clears the acceptance floor.
pub async fn record_accepted(
    memory: &AcceptanceMemory,
    query: &str,
    query_embedding: &[f32],
    graded_papers: &[GradedPaper],
    iteration: u32,
    crag: &CragConfig,
) {
    let records: Vec<AcceptanceRecord> = graded_papers
        .iter()
        .filter(|p| p.recommendation == Recommendation::Keep && p.quality_score >= crag.min_quality_for_acceptance)
        .map(|p| AcceptanceRecord {
            research_query: query.to_string(),
            query_embedding: query_embedding.to_vec(),
            pmid: p.pmid.clone(),
            study_type: Some(p.study_type.clone()),
            publication_year: p.publication_year,
            relevance_score: p.relevance_score,
            methodology_score: p.methodology_score,
            quality_score: p.quality_score,
            iteration: iteration as i32,
        })
        .collect();

    if !records.is_empty() {
        memory.record_accepted(&records).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(relevance: f64, methodology: f64, sample_ok: bool, study_type: &str, rec: &str) -> RawGrade {
        RawGrade {
            relevance_score: relevance,
            methodology_score: methodology,
            sample_size_adequate: sample_ok,
            study_type: study_type.to_string(),
            recommendation: rec.to_string(),
        }
    }

    #[test]
    fn clamps_out_of_range_scores() {
        let grade = enforce_grade("1", raw(1.5, -0.2, true, "cohort study", "KEEP"), &CragConfig::default());
        assert_eq!(grade.relevance_score, 1.0);
        assert!(grade.methodology_score >= 0.0);
    }

    #[test]
    fn study_type_prior_raises_methodology_floor() {
        let grade = enforce_grade("1", raw(0.9, 0.1, true, "meta-analysis", "KEEP"), &CragConfig::default());
        assert_eq!(grade.methodology_score, 0.85);
    }

    #[test]
    fn rct_alias_maps_to_same_prior_as_long_form() {
        let a = enforce_grade("1", raw(0.9, 0.0, true, "rct", "KEEP"), &CragConfig::default());
        let b = enforce_grade("2", raw(0.9, 0.0, true, "randomized controlled trial", "KEEP"), &CragConfig::default());
        assert_eq!(a.methodology_score, b.methodology_score);
    }

    #[test]
    fn low_relevance_overrides_recommendation_to_discard() {
        let grade = enforce_grade("1", raw(0.2, 0.9, true, "meta-analysis", "KEEP"), &CragConfig::default());
        assert_eq!(grade.recommendation, Recommendation::Discard);
    }

    #[test]
    fn low_methodology_overrides_recommendation_to_discard() {
        let grade = enforce_grade("1", raw(0.9, 0.2, true, "case study", "KEEP"), &CragConfig::default());
        assert_eq!(grade.recommendation, Recommendation::Discard);
    }

    #[test]
    fn unknown_study_type_lowercased_to_empty_has_no_prior() {
        let grade = enforce_grade("1", raw(0.9, 0.6, true, "UNKNOWN", "KEEP"), &CragConfig::default());
        assert_eq!(grade.methodology_score, 0.6);
    }

    #[test]
    fn inadequate_sample_size_penalizes_quality_score() {
        let adequate = enforce_grade("1", raw(0.8, 0.8, true, "cohort study", "KEEP"), &CragConfig::default());
        let inadequate = enforce_grade("2", raw(0.8, 0.8, false, "cohort study", "KEEP"), &CragConfig::default());
        assert!((inadequate.quality_score() - adequate.quality_score() * 0.7).abs() < 1e-9);
    }

    fn paper(pmid: &str) -> Paper {
        Paper { pmid: pmid.to_string(), title: format!("paper {pmid}"), abstract_text: None, publication_year: None, journal: None }
    }

    #[test]
    fn keep_ratio_above_threshold_is_sufficient() {
        let papers: Vec<Paper> = (1..=10).map(|i| paper(&i.to_string())).collect();
        let grades: Vec<PaperGrade> = papers
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let rec = if i < 5 { "KEEP" } else { "NEEDS_MORE" };
                enforce_grade(&p.pmid, raw(0.9, 0.9, true, "cohort study", rec), &CragConfig::default())
            })
            .collect();

        let outcome = crag_decision(&papers, &grades, 0, 3, 0.0, &CragConfig::default());
        assert_eq!(outcome.decision, CriticDecision::Sufficient);
    }

    #[test]
    fn high_discard_ratio_forces_retrieve_more_before_final_iteration() {
        let papers: Vec<Paper> = (1..=10).map(|i| paper(&i.to_string())).collect();
        let grades: Vec<PaperGrade> = papers
            .iter()
            .map(|p| enforce_grade(&p.pmid, raw(0.1, 0.1, true, "", "DISCARD"), &CragConfig::default()))
            .collect();

        let outcome = crag_decision(&papers, &grades, 0, 3, 0.0, &CragConfig::default());
        assert_eq!(outcome.decision, CriticDecision::RetrieveMore);
    }

    #[test]
    fn final_iteration_forces_sufficient_even_when_retrieve_more_would_fire() {
        let papers: Vec<Paper> = (1..=10).map(|i| paper(&i.to_string())).collect();
        let grades: Vec<PaperGrade> = papers
            .iter()
            .map(|p| enforce_grade(&p.pmid, raw(0.1, 0.1, true, "", "DISCARD"), &CragConfig::default()))
            .collect();

        // iteration 2 is the 3rd (0-indexed) and last allowed iteration under max_iterations=3.
        let outcome = crag_decision(&papers, &grades, 2, 3, 0.0, &CragConfig::default());
        assert_eq!(outcome.decision, CriticDecision::Sufficient);
    }

    #[test]
    fn memory_boost_lowers_effective_threshold() {
        let papers: Vec<Paper> = (1..=10).map(|i| paper(&i.to_string())).collect();
        // avg_quality ~0.5 for all non-discard grades at relevance=methodology=0.5,
        // keep_ratio 0 (all NEEDS_MORE), discard_ratio 0.
        let grades: Vec<PaperGrade> = papers
            .iter()
            .map(|p| enforce_grade(&p.pmid, raw(0.5, 0.5, true, "", "NEEDS_MORE"), &CragConfig::default()))
            .collect();

        let without_boost = crag_decision(&papers, &grades, 0, 3, 0.0, &CragConfig::default());
        let with_boost = crag_decision(&papers, &grades, 0, 3, 0.15, &CragConfig::default());
        assert_eq!(without_boost.decision, CriticDecision::RetrieveMore);
        assert_eq!(with_boost.decision, CriticDecision::Sufficient);
    }

    #[test]
    fn discard_grades_are_not_materialized_as_graded_papers() {
        let papers = vec![paper("1"), paper("2")];
        let grades = vec![
            enforce_grade("1", raw(0.9, 0.9, true, "cohort study", "KEEP"), &CragConfig::default()),
            enforce_grade("2", raw(0.1, 0.1, true, "", "DISCARD"), &CragConfig::default()),
        ];
        let outcome = crag_decision(&papers, &grades, 0, 3, 0.0, &CragConfig::default());
        assert_eq!(outcome.graded_papers.len(), 1);
        assert_eq!(outcome.graded_papers[0].pmid, "1");
    }
}
