//! aesop-llm — LLM and embedding client (C1, C3).
//!
//! A thin backend abstraction (`backend`) plus the retry/strict-JSON wrapper
//! (`client`) and the embedding client used by the acceptance memory.

pub mod backend;
pub mod client;
pub mod embedding;
pub mod json;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message, OllamaBackend, OpenAiBackend};
pub use client::{ClientError, LlmClient};
pub use embedding::EmbeddingClient;
