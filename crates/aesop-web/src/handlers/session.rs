//! `GET /session/{id}` and `DELETE /session/{id}`.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use crate::error::RequestError;
use crate::state::SharedState;

pub async fn get_session(State(state): State<SharedState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.sessions.get(&id).await {
        Some(ctx) => axum::Json(ctx).into_response(),
        None => RequestError::not_found(format!("no session {id}")).into_response(),
    }
}

/// Idempotent: returns `{status:"deleted", session_id}` whether or not the
/// session existed.
pub async fn delete_session(State(state): State<SharedState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    state.sessions.delete(&id).await;
    axum::Json(json!({"status": "deleted", "session_id": id})).into_response()
}
