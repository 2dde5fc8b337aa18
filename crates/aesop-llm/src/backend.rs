//! LLM backend trait and concrete implementations.
//!
//! A backend is a thin transport over one provider's chat-completion and
//! embedding endpoints. `LlmClient` (see `client.rs`) adds the retry policy,
//! timeout and strict-JSON contract on top of whichever backend is configured.

use aesop_common::sandbox::SandboxClient;
use aesop_common::AesopError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("request timed out")]
    Timeout,
    #[error(transparent)]
    Sandbox(#[from] AesopError),
}

impl LlmError {
    /// Errors worth retrying under the exponential-backoff policy: throttling,
    /// timeouts, and 5xx-class transport failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimitExceeded | LlmError::Timeout => true,
            LlmError::Http(e) => e.is_timeout() || e.status().is_some_and(|s| s.is_server_error()),
            LlmError::Unavailable(_) | LlmError::Serde(_) | LlmError::Sandbox(_) => false,
        }
    }
}

/// Extracts the host from a configured base URL so it can be allowlisted on
/// the backend's `SandboxClient`.
fn host_of(base_url: &str) -> Option<String> {
    url::Url::parse(base_url).ok()?.host_str().map(str::to_string)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, model: None, max_tokens: None, temperature: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError>;
    fn model_id(&self) -> &str;
}

fn status_to_error(status: reqwest::StatusCode) -> Option<LlmError> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Some(LlmError::RateLimitExceeded)
    } else if status.is_server_error() {
        Some(LlmError::Unavailable(format!("upstream returned {status}")))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Ollama backend (local, OpenAI-compatible surface)
// ---------------------------------------------------------------------------

pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: SandboxClient,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = base_url.into();
        let mut client = SandboxClient::new()?;
        if let Some(host) = host_of(&base_url) {
            client.allow_domain(&host);
        }
        Ok(Self { base_url, model: model.into(), client })
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": req.model.as_deref().unwrap_or(&self.model),
            "messages": req.messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.1),
        });

        let resp = self.client.post(&url)?.json(&body).send().await?;
        if let Some(e) = status_to_error(resp.status()) {
            return Err(e);
        }
        let json: serde_json::Value = resp.json().await?;

        Ok(LlmResponse {
            content: json["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string(),
            model: json["model"].as_str().unwrap_or(&self.model).to_string(),
            prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        })
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let body = serde_json::json!({"model": &self.model, "input": text});
            let resp = self.client.post(&url)?.json(&body).send().await?;
            if let Some(e) = status_to_error(resp.status()) {
                return Err(e);
            }
            let json: serde_json::Value = resp.json().await?;
            let vec: Vec<f32> = serde_json::from_value(json["data"][0]["embedding"].clone())?;
            embeddings.push(vec);
        }
        Ok(embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend (remote)
// ---------------------------------------------------------------------------

pub struct OpenAiBackend {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    client: SandboxClient,
}

impl OpenAiBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = base_url.into();
        let mut client = SandboxClient::new()?;
        if let Some(host) = host_of(&base_url) {
            client.allow_domain(&host);
        }
        Ok(Self { base_url, model: model.into(), api_key: api_key.into(), client })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": req.model.as_deref().unwrap_or(&self.model),
            "messages": req.messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.1),
        });

        let resp = self.client.post(&url)?.bearer_auth(&self.api_key).json(&body).send().await?;
        if let Some(e) = status_to_error(resp.status()) {
            return Err(e);
        }

        let json: serde_json::Value = resp.json().await?;
        Ok(LlmResponse {
            content: json["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string(),
            model: json["model"].as_str().unwrap_or(&self.model).to_string(),
            prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        })
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({"model": &self.model, "input": texts});
        let resp = self.client.post(&url)?.bearer_auth(&self.api_key).json(&body).send().await?;
        if let Some(e) = status_to_error(resp.status()) {
            return Err(e);
        }
        let json: serde_json::Value = resp.json().await?;
        let embeddings: Vec<Vec<f32>> = json["data"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .map(|item| serde_json::from_value(item["embedding"].clone()).unwrap_or_default())
            .collect();
        Ok(embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
