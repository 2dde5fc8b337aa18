//! HTTP-facing error envelope, translating `AesopError` into a JSON body
//! and status code for handlers to return.

use aesop_common::AesopError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RequestError {
    pub error: String,
    pub kind: String,
}

impl RequestError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { error: message.into(), kind: "bad_request".to_string() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { error: message.into(), kind: "not_found".to_string() }
    }

    fn status(&self) -> StatusCode {
        match self.kind.as_str() {
            "bad_request" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "policy_blocked" => StatusCode::FORBIDDEN,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&AesopError> for RequestError {
    fn from(err: &AesopError) -> Self {
        let kind = match err {
            AesopError::NotFound(_) => "not_found",
            AesopError::PolicyBlocked(_) => "policy_blocked",
            AesopError::RateLimited => "rate_limited",
            AesopError::Config(_) => "config",
            AesopError::Database(_) => "database",
            AesopError::Http(_) | AesopError::Serialization(_) | AesopError::Other(_) => "internal",
        };
        Self { error: err.to_string(), kind: kind.to_string() }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, axum::Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = RequestError::not_found("session not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_error_maps_to_500() {
        let err = RequestError::from(&AesopError::Database("boom".to_string()));
        assert_eq!(err.kind, "database");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
