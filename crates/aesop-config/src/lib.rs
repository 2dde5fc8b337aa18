//! Configuration loading for aesop.
//! Reads `aesop.toml` from the current directory or the path in `AESOP_CONFIG`.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub pubmed: PubmedConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub crag: CragConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key_env: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_backend() -> String {
    "openai-compatible".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_model")]
    pub model: String,
    pub api_key_env: Option<String>,
    #[serde(default = "default_embed_base_url")]
    pub base_url: String,
    #[serde(default = "default_embed_dim")]
    pub dim: usize,
}

fn default_embed_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embed_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embed_dim() -> usize {
    1536
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubmedConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_pubmed_batch_size")]
    pub fetch_batch_size: usize,
}

fn default_pubmed_batch_size() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    3600
}
fn default_reap_interval_secs() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

/// The CRAG tunables. Exposed as overridable defaults; callers should treat
/// these as advisory for experimentation, not a way to break the loop's
/// documented termination guarantees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CragConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_min_relevance")]
    pub min_relevance_to_keep: f64,
    #[serde(default = "default_min_methodology")]
    pub min_methodology_to_keep: f64,
    #[serde(default = "default_keep_ratio_threshold")]
    pub keep_ratio_threshold: f64,
    #[serde(default = "default_max_discard_ratio")]
    pub max_discard_ratio: f64,
    #[serde(default = "default_min_avg_quality")]
    pub min_avg_quality_for_sufficient: f64,
    #[serde(default = "default_confidence_decay_rate")]
    pub confidence_decay_rate: f64,
    #[serde(default = "default_min_confidence_floor")]
    pub min_confidence_floor: f64,
    #[serde(default = "default_max_memory_boost")]
    pub max_memory_boost: f64,
    #[serde(default = "default_memory_decay_lambda")]
    pub memory_decay_lambda: f64,
    #[serde(default = "default_min_quality_for_acceptance")]
    pub min_quality_for_acceptance: f64,
}

fn default_max_iterations() -> u32 {
    3
}
fn default_min_relevance() -> f64 {
    0.45
}
fn default_min_methodology() -> f64 {
    0.50
}
fn default_keep_ratio_threshold() -> f64 {
    0.40
}
fn default_max_discard_ratio() -> f64 {
    0.55
}
fn default_min_avg_quality() -> f64 {
    0.60
}
fn default_confidence_decay_rate() -> f64 {
    0.07
}
fn default_min_confidence_floor() -> f64 {
    0.45
}
fn default_max_memory_boost() -> f64 {
    0.15
}
fn default_memory_decay_lambda() -> f64 {
    0.01
}
fn default_min_quality_for_acceptance() -> f64 {
    0.60
}

impl Default for CragConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            min_relevance_to_keep: default_min_relevance(),
            min_methodology_to_keep: default_min_methodology(),
            keep_ratio_threshold: default_keep_ratio_threshold(),
            max_discard_ratio: default_max_discard_ratio(),
            min_avg_quality_for_sufficient: default_min_avg_quality(),
            confidence_decay_rate: default_confidence_decay_rate(),
            min_confidence_floor: default_min_confidence_floor(),
            max_memory_boost: default_max_memory_boost(),
            memory_decay_lambda: default_memory_decay_lambda(),
            min_quality_for_acceptance: default_min_quality_for_acceptance(),
        }
    }
}

mod tests;

impl Config {
    /// Load configuration from `aesop.toml`.
    /// Checks the `AESOP_CONFIG` env var first, then the current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("AESOP_CONFIG").unwrap_or_else(|_| "aesop.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy aesop.example.toml to aesop.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
