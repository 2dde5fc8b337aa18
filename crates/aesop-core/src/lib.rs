//! aesop-core — the multi-agent orchestrator (C6-C13): intent classification,
//! routing, the CRAG retrieval/grading loop, synthesis, and context Q&A/chat.

pub mod context_qa;
pub mod critic;
pub mod intent;
pub mod orchestrator;
pub mod router;
pub mod scout;
pub mod synthesizer;
pub mod types;

pub use orchestrator::Orchestrator;
pub use types::{ChatResponse, Intent, Route};
