//! Embedding client.
//!
//! Wraps a single `LlmBackend` to produce the fixed-dimension vectors used by
//! the acceptance memory's similarity search. Embedding failures are never
//! fatal to the caller: `embed` returns `None` on timeout or backend error so
//! the acceptance-memory read path can degrade its bias to 0.0 instead of
//! failing the whole turn.

use crate::backend::LlmBackend;
use std::sync::Arc;
use std::time::Duration;

const EMBED_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EmbeddingClient {
    backend: Arc<dyn LlmBackend>,
    dim: usize,
}

impl EmbeddingClient {
    pub fn new(backend: Arc<dyn LlmBackend>, dim: usize) -> Self {
        Self { backend, dim }
    }

    /// Embeds a single string, returning `None` on any failure (timeout,
    /// transport error, or a backend returning the wrong dimensionality).
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let fut = self.backend.embed(vec![text.to_string()]);
        let result = match tokio::time::timeout(EMBED_TIMEOUT, fut).await {
            Ok(Ok(mut vecs)) if !vecs.is_empty() => vecs.pop(),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "embedding backend call failed");
                None
            }
            Err(_) => {
                tracing::warn!("embedding call timed out after {:?}", EMBED_TIMEOUT);
                None
            }
        };

        result.filter(|v| v.len() == self.dim).or_else(|| {
            tracing::warn!("embedding dimensionality mismatch, discarding");
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::backend::{LlmError, LlmRequest, LlmResponse};

    struct FixedBackend {
        dim: usize,
        fail: bool,
    }

    #[async_trait]
    impl LlmBackend for FixedBackend {
        async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
            unimplemented!()
        }

        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
            if self.fail {
                return Err(LlmError::Unavailable("boom".into()));
            }
            Ok(texts.iter().map(|_| vec![0.1; self.dim]).collect())
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn returns_vector_of_expected_dimension() {
        let client = EmbeddingClient::new(Arc::new(FixedBackend { dim: 1536, fail: false }), 1536);
        let v = client.embed("some text").await.unwrap();
        assert_eq!(v.len(), 1536);
    }

    #[tokio::test]
    async fn mismatched_dimension_degrades_to_none() {
        let client = EmbeddingClient::new(Arc::new(FixedBackend { dim: 768, fail: false }), 1536);
        assert!(client.embed("some text").await.is_none());
    }

    #[tokio::test]
    async fn backend_error_degrades_to_none() {
        let client = EmbeddingClient::new(Arc::new(FixedBackend { dim: 1536, fail: true }), 1536);
        assert!(client.embed("some text").await.is_none());
    }
}
