//! Listening history: recent plays and similar-artist lookups.

mod lastfm;
mod play_map;

pub use lastfm::LastFmClient;
pub use play_map::{build_play_map, fetch_all_recent_plays, PlayMap};

use crate::retry_policy::RetryableError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Temporary failure: {0}")]
    Transient(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl RetryableError for HistoryError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            HistoryError::RateLimited | HistoryError::Transient(_) | HistoryError::Transport(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        // The API gives no delay hint, back off a fixed amount
        match self {
            HistoryError::RateLimited => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HistoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            HistoryError::Decode(err.to_string())
        } else {
            HistoryError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        HistoryError::Decode(err.to_string())
    }
}

/// One scrobble.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub artist: String,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentPlaysPage {
    pub events: Vec<PlayEvent>,
    pub total_pages: u32,
}

pub trait ListeningHistory: Send + Sync {
    /// One page (1-based) of the user's plays, newest first, optionally
    /// restricted to plays after `since`. Tracks playing right now are omitted.
    fn recent_plays(
        &self,
        user: &str,
        page: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<RecentPlaysPage, HistoryError>;

    /// Names of artists similar to `artist_name`, most similar first.
    fn similar_artists(&self, artist_name: &str, limit: usize)
        -> Result<Vec<String>, HistoryError>;
}
