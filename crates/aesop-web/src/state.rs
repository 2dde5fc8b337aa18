//! Shared application state for the web server.

use std::sync::Arc;

use aesop_db::SessionStore;
use aesop_core::Orchestrator;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Progress events pushed to connected clients via SSE while a request is
/// working through the CRAG loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// Intent classification completed for a request.
    IntentClassified { session_id: Option<uuid::Uuid>, intent: String, confidence: f64 },
    /// A CRAG iteration finished grading its retrieved batch.
    CragIteration { session_id: Option<uuid::Uuid>, iteration: u32, avg_quality: f64 },
    /// The orchestrator returned a final response.
    ResponseReady { session_id: uuid::Uuid, route_taken: Option<String> },
}

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionStore>,
    event_tx: broadcast::Sender<AppEvent>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, sessions: Arc<SessionStore>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { orchestrator, sessions, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    pub fn publish(&self, event: AppEvent) {
        // No receivers connected is the common case; not an error.
        let _ = self.event_tx.send(event);
    }
}

pub type SharedState = Arc<AppState>;
