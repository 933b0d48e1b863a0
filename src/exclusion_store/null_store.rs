//! Null exclusion store implementation.
//!
//! Stands in when the exclusion database cannot be opened, and for dry runs.
//! Every lookup answers with the permissive default and every write is dropped.

use super::{ExclusionStore, PlaylistFact, TrackBlacklistFact};
use anyhow::Result;
use chrono::{DateTime, Utc};

pub struct NullExclusionStore;

impl ExclusionStore for NullExclusionStore {
    fn is_track_blacklisted(&self, _track_id: &str) -> Result<bool> {
        Ok(false)
    }

    fn blacklisted_artist_count(&self, _artist_id: &str) -> Result<usize> {
        Ok(0)
    }

    fn insert_track_blacklist_fact(&self, _fact: &TrackBlacklistFact) -> Result<()> {
        Ok(())
    }

    fn stale_unfixed_tracks(
        &self,
        _created_before: DateTime<Utc>,
    ) -> Result<Vec<TrackBlacklistFact>> {
        Ok(vec![])
    }

    fn mark_track_fixed(&self, _track_id: &str) -> Result<bool> {
        Ok(false)
    }

    fn is_artist_scrape_blacklisted(&self, _artist_id: &str) -> Result<bool> {
        Ok(false)
    }

    fn add_scrape_blacklisted_artist(&self, _artist_id: &str, _name: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn is_playlist_blacklisted(&self, _playlist_id: &str) -> Result<bool> {
        Ok(false)
    }

    fn get_playlist_fact(&self, _playlist_id: &str) -> Result<Option<PlaylistFact>> {
        Ok(None)
    }

    fn upsert_playlist_fact(
        &self,
        _playlist_id: &str,
        _name: Option<&str>,
        _blacklisted: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn whitelisted_profiles(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }

    fn add_whitelisted_profile(&self, _profile_id: &str) -> Result<()> {
        Ok(())
    }
}
