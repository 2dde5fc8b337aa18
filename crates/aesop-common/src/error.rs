use thiserror::Error;

/// Shared error type for every aesop crate boundary.
///
/// Error kind 5 of the error-handling design ("logic invariants violated") is
/// deliberately NOT a variant here — those are represented as `panic!`/`debug_assert!`
/// at the call site, because they indicate a bug in this codebase, not a
/// recoverable condition a caller should match on.
#[derive(Debug, Error)]
pub enum AesopError {
    #[error("database error: {0}")]
    Database(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network capability denied: {0}")]
    PolicyBlocked(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("upstream rate limited")]
    RateLimited,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AesopError>;
