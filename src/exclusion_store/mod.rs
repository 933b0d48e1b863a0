//! Persistent exclusion facts shared across curation runs.
//!
//! The selection engine only reads and appends facts; the one mutation of an
//! existing fact is marking a blacklisted track as fixed once the retention
//! sweep has confirmed it is gone from the playlist.

mod facts;
mod models;
mod null_store;
mod read_only_store;
mod schema;
mod sqlite_exclusion_store;

pub use facts::ExclusionFacts;
pub use models::{PlaylistFact, TrackBlacklistFact};
pub use null_store::NullExclusionStore;
pub use read_only_store::ReadOnlyExclusionStore;
pub use schema::EXCLUSION_VERSIONED_SCHEMAS;
pub use sqlite_exclusion_store::SqliteExclusionStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

pub trait ExclusionStore: Send + Sync {
    // Blacklisted tracks
    /// True if the track has an unfixed blacklist fact.
    fn is_track_blacklisted(&self, track_id: &str) -> Result<bool>;
    /// Number of unfixed blacklist facts attributed to the artist.
    fn blacklisted_artist_count(&self, artist_id: &str) -> Result<usize>;
    /// Insert a fact, or reset an existing one for the same track.
    fn insert_track_blacklist_fact(&self, fact: &TrackBlacklistFact) -> Result<()>;
    /// Unfixed facts created before the given instant.
    fn stale_unfixed_tracks(&self, created_before: DateTime<Utc>)
        -> Result<Vec<TrackBlacklistFact>>;
    /// Returns true if a fact was updated.
    fn mark_track_fixed(&self, track_id: &str) -> Result<bool>;

    // Artists whose public playlists are not worth scraping
    fn is_artist_scrape_blacklisted(&self, artist_id: &str) -> Result<bool>;
    fn add_scrape_blacklisted_artist(&self, artist_id: &str, name: Option<&str>) -> Result<()>;

    // Third-party playlists
    fn is_playlist_blacklisted(&self, playlist_id: &str) -> Result<bool>;
    fn get_playlist_fact(&self, playlist_id: &str) -> Result<Option<PlaylistFact>>;
    fn upsert_playlist_fact(
        &self,
        playlist_id: &str,
        name: Option<&str>,
        blacklisted: bool,
    ) -> Result<()>;

    // Whitelisted source profiles
    fn whitelisted_profiles(&self) -> Result<Vec<String>>;
    fn add_whitelisted_profile(&self, profile_id: &str) -> Result<()>;
}
