//! Shared types threaded through the orchestrator state machine.

use aesop_db::CachedPaper;
use aesop_pubmed::Paper;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Chat,
    Research,
    FollowupResearch,
    Utility,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Chat => "chat",
            Intent::Research => "research",
            Intent::FollowupResearch => "followup_research",
            Intent::Utility => "utility",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Full Graph: no usable session context, run the whole CRAG loop.
    A,
    /// Augmented: merge cached KEEP papers with a fresh, narrower scout pass.
    B,
    /// Context Q&A: answer from cached papers only, no retrieval.
    C,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::A => "A",
            Route::B => "B",
            Route::C => "C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Keep,
    Discard,
    NeedsMore,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Keep => "KEEP",
            Recommendation::Discard => "DISCARD",
            Recommendation::NeedsMore => "NEEDS_MORE",
        }
    }
}

/// Raw LLM grading output before score enforcement is applied.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGrade {
    pub relevance_score: f64,
    pub methodology_score: f64,
    pub sample_size_adequate: bool,
    pub study_type: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperGrade {
    pub pmid: String,
    pub relevance_score: f64,
    pub methodology_score: f64,
    pub sample_size_adequate: bool,
    pub study_type: String,
    pub recommendation: Recommendation,
}

impl PaperGrade {
    pub fn quality_score(&self) -> f64 {
        let base = (self.relevance_score + self.methodology_score) / 2.0;
        if self.sample_size_adequate {
            base
        } else {
            base * 0.7
        }
    }
}

/// Post-filter paper: materialized only for non-DISCARD grades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedPaper {
    pub pmid: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub publication_year: Option<i32>,
    pub journal: Option<String>,
    pub relevance_score: f64,
    pub methodology_score: f64,
    pub study_type: String,
    pub quality_score: f64,
    pub recommendation: Recommendation,
}

impl GradedPaper {
    pub fn from_paper_and_grade(paper: &Paper, grade: &PaperGrade) -> Self {
        Self {
            pmid: paper.pmid.clone(),
            title: paper.title.clone(),
            abstract_text: paper.abstract_text.clone(),
            publication_year: paper.publication_year,
            journal: paper.journal.clone(),
            relevance_score: grade.relevance_score,
            methodology_score: grade.methodology_score,
            study_type: grade.study_type.clone(),
            quality_score: grade.quality_score(),
            recommendation: grade.recommendation,
        }
    }

    pub fn to_cached_paper(&self) -> CachedPaper {
        CachedPaper {
            pmid: self.pmid.clone(),
            title: self.title.clone(),
            abstract_text: self.abstract_text.clone(),
            publication_year: self.publication_year,
            journal: self.journal.clone(),
            relevance_score: self.relevance_score,
            methodology_score: self.methodology_score,
            study_type: self.study_type.clone(),
            quality_score: self.quality_score,
            recommendation: self.recommendation.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticDecision {
    Sufficient,
    RetrieveMore,
}

impl CriticDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticDecision::Sufficient => "sufficient",
            CriticDecision::RetrieveMore => "retrieve_more",
        }
    }
}

/// One request's transient working state. Owned exclusively by the handler
/// processing it -- never shared across requests.
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    pub input_message: String,
    pub session_id: Option<Uuid>,
    pub intent: Option<Intent>,
    pub intent_confidence: Option<f64>,
    pub route: Option<Route>,
    pub papers: Vec<Paper>,
    pub grades: Vec<PaperGrade>,
    pub iteration: u32,
    pub critic_decision: Option<CriticDecision>,
    pub memory_boost: f64,
    pub final_response: Option<String>,
}

impl OrchestratorState {
    pub fn new(input_message: String, session_id: Option<Uuid>) -> Self {
        Self {
            input_message,
            session_id,
            intent: None,
            intent_confidence: None,
            route: None,
            papers: Vec::new(),
            grades: Vec::new(),
            iteration: 0,
            critic_decision: None,
            memory_boost: 0.0,
            final_response: None,
        }
    }
}

/// Response envelope returned by the orchestrator, mirrored onto the HTTP
/// surface's `POST /chat` JSON body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: Uuid,
    pub route_taken: Option<&'static str>,
    pub intent: &'static str,
    pub intent_confidence: f64,
    pub papers_count: usize,
    pub critic_decision: Option<&'static str>,
    pub avg_quality: Option<f64>,
}
