//! `POST /chat`: the orchestrator's single entry point over HTTP.

use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::RequestError;
use crate::state::{AppEvent, SharedState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
}

pub async fn chat(State(state): State<SharedState>, Json(payload): Json<ChatRequest>) -> impl IntoResponse {
    if payload.message.trim().is_empty() {
        return RequestError::bad_request("message must not be empty").into_response();
    }

    let response = state.orchestrator.handle(payload.message, payload.session_id).await;
    state.publish(AppEvent::ResponseReady { session_id: response.session_id, route_taken: response.route_taken.map(str::to_string) });

    axum::Json(response).into_response()
}
