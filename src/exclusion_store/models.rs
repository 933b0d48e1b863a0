use chrono::{DateTime, Utc};

/// A track that must not be suggested again until it is marked fixed.
///
/// Unfixed facts also count against the track's artist: once an artist
/// collects enough of them the artist itself is blocked.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackBlacklistFact {
    pub track_id: String,
    pub track_name: Option<String>,
    pub artist_id: String,
    pub artist_name: Option<String>,
    pub fixed: bool,
    pub created_at: DateTime<Utc>,
}

/// A third-party playlist that discovery has already looked at.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistFact {
    pub playlist_id: String,
    pub name: Option<String>,
    /// True when the playlist was empty or inaccessible and must not be revisited.
    pub blacklisted: bool,
    pub updated_at: DateTime<Utc>,
}
