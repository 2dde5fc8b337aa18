//! Orchestrator: the state machine composing intent classification,
//! routing, Scout, Critic, Synthesizer, Context Q&A and Chat/Utility.
//!
//! ```text
//! START -> CLASSIFY_INTENT
//!   chat      -> CHAT       -> SAVE_SESSION? -> END
//!   utility   -> UTILITY    -> SAVE_SESSION  -> END
//!   research / followup_research -> ROUTE
//! ROUTE:
//!   Route A -> SCOUT -> CRITIC -> (sufficient? SYNTH : SCOUT (iter+1))
//!   Route B -> SCOUT -> MERGE_WITH_CACHE -> SYNTH
//!   Route C -> CONTEXT_QA
//!   (terminal) -> SAVE_SESSION -> END
//! ```

use aesop_config::CragConfig;
use aesop_db::{AcceptanceMemory, CachedPaper, SessionContext, SessionLocks, SessionStore};
use aesop_llm::{EmbeddingClient, LlmClient};
use aesop_pubmed::{Paper, PubMedClient};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::context_qa::{answer_from_context, apply_utility_transform, chat_reply};
use crate::critic::{crag_decision, fetch_memory_bias, grade_papers, record_accepted};
use crate::intent::classify_intent;
use crate::router::route;
use crate::scout::{expand_query, search_and_fetch};
use crate::synthesizer::synthesize;
use crate::types::{ChatResponse, CriticDecision, GradedPaper, Intent, OrchestratorState, Route};

pub struct Orchestrator {
    llm: Arc<LlmClient>,
    embedder: Arc<EmbeddingClient>,
    pubmed: Arc<PubMedClient>,
    memory: Arc<AcceptanceMemory>,
    sessions: Arc<SessionStore>,
    session_locks: SessionLocks,
    crag: CragConfig,
    fetch_batch_size: usize,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<LlmClient>,
        embedder: Arc<EmbeddingClient>,
        pubmed: Arc<PubMedClient>,
        memory: Arc<AcceptanceMemory>,
        sessions: Arc<SessionStore>,
        crag: CragConfig,
        fetch_batch_size: usize,
    ) -> Self {
        Self { llm, embedder, pubmed, memory, sessions, session_locks: SessionLocks::new(), crag, fetch_batch_size }
    }

    /// Serializes requests on the same `session_id`: the guard is held for
    /// the remainder of the request so a second request on the same session
    /// queues behind it rather than racing its read-modify-write.
    pub async fn handle(&self, message: String, session_id: Option<Uuid>) -> ChatResponse {
        let _session_guard = match session_id {
            Some(id) => Some(self.session_locks.acquire(id).await),
            None => None,
        };
        let session = match session_id {
            Some(id) => self.sessions.get(&id).await,
            None => None,
        };
        let has_session = session.is_some();
        let has_synthesis = session.as_ref().map(|s| !s.synthesis_summary.is_empty()).unwrap_or(false);

        let (intent, confidence) =
            classify_intent(&self.llm, &message, has_session, has_synthesis).await;

        let mut state = OrchestratorState::new(message.clone(), session_id);
        state.intent = Some(intent);
        state.intent_confidence = Some(confidence);

        match intent {
            Intent::Chat => self.run_chat(state, session).await,
            Intent::Utility => self.run_utility(state, session).await,
            Intent::Research | Intent::FollowupResearch => self.run_research(state, session).await,
        }
    }

    async fn run_chat(&self, mut state: OrchestratorState, session: Option<SessionContext>) -> ChatResponse {
        let reply = chat_reply(&self.llm, &state.input_message).await;
        state.final_response = Some(reply.clone());

        // Pure chat does not create a session; it only refreshes one if present.
        let session_id = if let Some(mut ctx) = session {
            ctx.turn_count += 1;
            let id = ctx.session_id;
            self.sessions.put(ctx, Utc::now()).await;
            id
        } else {
            state.session_id.unwrap_or_else(Uuid::new_v4)
        };

        ChatResponse {
            response: reply,
            session_id,
            route_taken: None,
            intent: intent_str(state.intent),
            intent_confidence: state.intent_confidence.unwrap_or(0.0),
            papers_count: 0,
            critic_decision: None,
            avg_quality: None,
        }
    }

    async fn run_utility(&self, mut state: OrchestratorState, session: Option<SessionContext>) -> ChatResponse {
        let mut ctx = session.unwrap_or_else(|| {
            SessionContext::new(state.session_id.unwrap_or_else(Uuid::new_v4), state.input_message.clone(), vec![0.0; 1536], Utc::now())
        });

        let reply = apply_utility_transform(&self.llm, &state.input_message, &ctx.synthesis_summary).await;
        state.final_response = Some(reply.clone());

        ctx.turn_count += 1;
        let session_id = ctx.session_id;
        self.sessions.put(ctx, Utc::now()).await;

        ChatResponse {
            response: reply,
            session_id,
            route_taken: None,
            intent: intent_str(state.intent),
            intent_confidence: state.intent_confidence.unwrap_or(0.0),
            papers_count: 0,
            critic_decision: None,
            avg_quality: None,
        }
    }

    async fn run_research(&self, mut state: OrchestratorState, session: Option<SessionContext>) -> ChatResponse {
        let session_titles: Vec<String> =
            session.as_ref().map(|s| s.retrieved_papers.iter().map(|p| p.title.clone()).collect()).unwrap_or_default();
        let chosen_route = route(state.intent.unwrap_or(Intent::Research), session.is_some(), &state.input_message, &session_titles);
        state.route = Some(chosen_route);

        let query = session.as_ref().map(|s| s.original_query.clone()).unwrap_or_else(|| state.input_message.clone());

        let (response_text, critic_decision, avg_quality, graded_papers, papers_count) = match chosen_route {
            Route::C => {
                let cached = session.as_ref().map(|s| cached_to_graded(&s.retrieved_papers)).unwrap_or_default();
                let answer = answer_from_context(&self.llm, &state.input_message, &cached).await;
                (answer, None, None, cached, 0)
            }
            Route::A => {
                let (text, decision, quality, graded) = self.run_crag_loop(&query, &mut state).await;
                (text, Some(decision), Some(quality), graded, state.papers.len())
            }
            Route::B => {
                let cached = session.as_ref().map(|s| cached_to_graded(&s.retrieved_papers)).unwrap_or_default();
                let variants = expand_query(&self.llm, &query).await;
                let fresh_papers = search_and_fetch(&self.pubmed, &variants, self.fetch_batch_size).await;
                let new_papers: Vec<Paper> =
                    fresh_papers.into_iter().filter(|p| !cached.iter().any(|c| c.pmid == p.pmid)).collect();
                let papers_count = new_papers.len();
                let grades = grade_papers(&self.llm, &new_papers, &self.crag).await;
                let outcome = crag_decision(&new_papers, &grades, 0, self.crag.max_iterations, 0.0, &self.crag);

                let mut merged = cached;
                for p in outcome.graded_papers {
                    if !merged.iter().any(|m| m.pmid == p.pmid) {
                        merged.push(p);
                    }
                }
                let text = synthesize(&self.llm, &query, &merged).await;
                (text, Some(outcome.decision), Some(outcome.avg_quality), merged, papers_count)
            }
        };

        state.final_response = Some(response_text.clone());
        state.critic_decision = critic_decision;

        let session_id = state.session_id.unwrap_or_else(Uuid::new_v4);
        let mut ctx = session.unwrap_or_else(|| SessionContext::new(session_id, query.clone(), vec![0.0; 1536], Utc::now()));
        ctx.retrieved_papers = graded_papers.iter().map(|p| p.to_cached_paper()).collect();
        if !response_text.is_empty() && chosen_route != Route::C {
            ctx.synthesis_summary = response_text.clone();
        }
        ctx.turn_count += 1;
        self.sessions.put(ctx, Utc::now()).await;

        ChatResponse {
            response: response_text,
            session_id,
            route_taken: Some(chosen_route.as_str()),
            intent: intent_str(state.intent),
            intent_confidence: state.intent_confidence.unwrap_or(0.0),
            papers_count,
            critic_decision: critic_decision.map(|d| d.as_str()),
            avg_quality,
        }
    }

    /// Route A's SCOUT -> CRITIC -> (sufficient? SYNTH : SCOUT) loop, capped
    /// at `crag.max_iterations`.
    async fn run_crag_loop(&self, query: &str, state: &mut OrchestratorState) -> (String, CriticDecision, f64, Vec<GradedPaper>) {
        let query_embedding = self.embedder.embed(query).await.unwrap_or_else(|| vec![0.0; 1536]);
        let memory_boost = fetch_memory_bias(&self.memory, &self.embedder, query, &self.crag).await;
        state.memory_boost = memory_boost;

        loop {
            let variants = expand_query(&self.llm, query).await;
            let papers = search_and_fetch(&self.pubmed, &variants, self.fetch_batch_size).await;
            state.papers = papers.clone();

            let grades = grade_papers(&self.llm, &papers, &self.crag).await;
            state.grades = grades.clone();

            let outcome =
                crag_decision(&papers, &grades, state.iteration, self.crag.max_iterations, memory_boost, &self.crag);

            if outcome.decision == CriticDecision::Sufficient {
                // `crag_decision` itself forces this at `iteration + 1 >= max_iterations`,
                // so this branch also covers the graceful-degradation termination case.
                record_accepted(&self.memory, query, &query_embedding, &outcome.graded_papers, state.iteration, &self.crag)
                    .await;
                let text = synthesize(&self.llm, query, &outcome.graded_papers).await;
                return (text, outcome.decision, outcome.avg_quality, outcome.graded_papers);
            }

            state.iteration += 1;
        }
    }
}

fn cached_to_graded(cached: &[CachedPaper]) -> Vec<GradedPaper> {
    cached
        .iter()
        .map(|c| GradedPaper {
            pmid: c.pmid.clone(),
            title: c.title.clone(),
            abstract_text: c.abstract_text.clone(),
            publication_year: c.publication_year,
            journal: c.journal.clone(),
            relevance_score: c.relevance_score,
            methodology_score: c.methodology_score,
            study_type: c.study_type.clone(),
            quality_score: c.quality_score,
            recommendation: crate::types::Recommendation::Keep,
        })
        .collect()
}

fn intent_str(intent: Option<Intent>) -> &'static str {
    intent.map(|i| i.as_str()).unwrap_or("chat")
}
