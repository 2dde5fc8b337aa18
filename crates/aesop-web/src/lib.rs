//! aesop-web — the HTTP surface over the multi-agent orchestrator:
//! `POST /chat`, `GET|DELETE /session/{id}`, `GET /health`.

pub mod error;
pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;
