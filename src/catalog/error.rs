use crate::retry_policy::RetryableError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a [`CatalogService`](super::CatalogService).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl CatalogError {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogError::NotFound(_) => "not_found",
            CatalogError::RateLimited { .. } => "rate_limited",
            CatalogError::Transient(_) => "transient",
            CatalogError::Client { .. } => "client",
            CatalogError::Transport(_) => "transport",
            CatalogError::Decode(_) => "decode",
        }
    }

    /// Maps an HTTP status to an error, or `None` for successes.
    pub fn from_status(status: u16, retry_after_secs: Option<u64>, body: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            404 => Some(CatalogError::NotFound(truncate(body))),
            429 => Some(CatalogError::RateLimited { retry_after_secs }),
            500..=599 => Some(CatalogError::Transient(format!(
                "status {}: {}",
                status,
                truncate(body)
            ))),
            _ => Some(CatalogError::Client {
                status,
                message: truncate(body),
            }),
        }
    }
}

impl RetryableError for CatalogError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::RateLimited { .. }
                | CatalogError::Transient(_)
                | CatalogError::Transport(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CatalogError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::Decode(err.to_string())
        } else {
            CatalogError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Decode(err.to_string())
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
