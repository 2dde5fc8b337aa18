//! LlmClient: retry and strict-JSON completion wrapper shared by the
//! intent classifier, Scout's query expansion, and the Critic's grading pass.

use crate::backend::{LlmBackend, LlmError, LlmRequest, Message};
use crate::json::{extract_json, JsonExtractError};
use aesop_common::retry::{with_retry, RetryPolicy};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Json(#[from] JsonExtractError),
}

pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
    retry_policy: RetryPolicy,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend, retry_policy: RetryPolicy::default() }
    }

    /// Sends a chat completion with the shared retry policy (base 1s,
    /// factor 2, jitter +/-20%, max 5 attempts).
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ClientError> {
        let backend = Arc::clone(&self.backend);
        let req = LlmRequest::new(vec![Message::system(system), Message::user(user)]);

        let resp = with_retry(self.retry_policy, LlmError::is_retryable, || {
            let backend = Arc::clone(&backend);
            let req = req.clone();
            async move { backend.complete(req).await }
        })
        .await?;

        Ok(resp.content)
    }

    /// Sends a completion and parses the result as strict JSON with bounded
    /// recovery.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<T, ClientError> {
        let raw = self.complete(system, user).await?;
        Ok(extract_json(&raw)?)
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }
}
