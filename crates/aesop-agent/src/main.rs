//! aesop — corrective retrieval-augmented evidence synthesis engine.
//! Entry point for the agent binary: wires configuration, storage, the LLM
//! and PubMed clients, the orchestrator, and the HTTP surface together, then
//! serves.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aesop_config::Config;
use aesop_db::{pool, AcceptanceMemory, SessionStore};
use aesop_llm::{EmbeddingClient, LlmBackend, LlmClient, OllamaBackend, OpenAiBackend};
use aesop_pubmed::PubMedClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aesop=debug,info")))
        .init();

    info!("aesop starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    info!("Connecting to PostgreSQL...");
    let db_pool = pool::connect(&config.database.url, config.database.max_connections as u32).await?;
    info!("Postgres connected.");

    info!("Running schema migrations...");
    pool::run_migrations(&db_pool).await?;
    info!("Migrations complete.");

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(config.session.ttl_secs)));
    let memory = Arc::new(AcceptanceMemory::new(db_pool));

    let llm_backend = build_backend(&config.llm.backend, &config.llm.base_url, &config.llm.model, config.llm.api_key_env.as_deref())?;
    let llm = Arc::new(LlmClient::new(llm_backend));

    let embed_backend_kind = if config.embedding.api_key_env.is_some() { "openai-compatible" } else { "ollama" };
    let embed_backend = build_backend(
        embed_backend_kind,
        &config.embedding.base_url,
        &config.embedding.model,
        config.embedding.api_key_env.as_deref(),
    )?;
    let embedder = Arc::new(EmbeddingClient::new(embed_backend, config.embedding.dim));

    let pubmed = Arc::new(PubMedClient::new(config.pubmed.api_key.clone())?);

    let orchestrator = Arc::new(aesop_core::Orchestrator::new(
        llm,
        embedder,
        pubmed,
        memory,
        sessions.clone(),
        config.crag.clone(),
        config.pubmed.fetch_batch_size,
    ));

    spawn_session_reaper(sessions.clone(), Duration::from_secs(config.session.reap_interval_secs));

    let state = aesop_web::state::AppState::new(orchestrator, sessions);
    let app = aesop_web::router::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("aesop listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the configured `LlmBackend`: `"ollama"` talks to a local
/// OpenAI-compatible server with no auth, anything else is treated as a
/// remote OpenAI-compatible endpoint authenticated via the env var named by
/// `api_key_env`.
fn build_backend(kind: &str, base_url: &str, model: &str, api_key_env: Option<&str>) -> anyhow::Result<Arc<dyn LlmBackend>> {
    if kind == "ollama" {
        Ok(Arc::new(OllamaBackend::new(base_url.to_string(), model.to_string())?))
    } else {
        let api_key = api_key_env.and_then(|var| std::env::var(var).ok()).unwrap_or_default();
        Ok(Arc::new(OpenAiBackend::new(base_url.to_string(), model.to_string(), api_key)?))
    }
}

/// Periodically evicts sessions whose sliding TTL has lapsed.
fn spawn_session_reaper(sessions: Arc<SessionStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let reaped = sessions.reap_expired(chrono::Utc::now()).await;
            if reaped > 0 {
                tracing::debug!(reaped, "reaped expired sessions");
            }
        }
    });
}
