//! Read-only view over another exclusion store, used by dry runs.
//!
//! Lookups reach the wrapped store so gating behaves exactly as in a real
//! run; writes go to the null store.

use super::{ExclusionStore, NullExclusionStore, PlaylistFact, TrackBlacklistFact};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct ReadOnlyExclusionStore {
    inner: Arc<dyn ExclusionStore>,
    writes: NullExclusionStore,
}

impl ReadOnlyExclusionStore {
    pub fn new(inner: Arc<dyn ExclusionStore>) -> Self {
        Self {
            inner,
            writes: NullExclusionStore,
        }
    }
}

impl ExclusionStore for ReadOnlyExclusionStore {
    fn is_track_blacklisted(&self, track_id: &str) -> Result<bool> {
        self.inner.is_track_blacklisted(track_id)
    }

    fn blacklisted_artist_count(&self, artist_id: &str) -> Result<usize> {
        self.inner.blacklisted_artist_count(artist_id)
    }

    fn insert_track_blacklist_fact(&self, fact: &TrackBlacklistFact) -> Result<()> {
        self.writes.insert_track_blacklist_fact(fact)
    }

    fn stale_unfixed_tracks(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<TrackBlacklistFact>> {
        self.inner.stale_unfixed_tracks(created_before)
    }

    fn mark_track_fixed(&self, track_id: &str) -> Result<bool> {
        self.writes.mark_track_fixed(track_id)
    }

    fn is_artist_scrape_blacklisted(&self, artist_id: &str) -> Result<bool> {
        self.inner.is_artist_scrape_blacklisted(artist_id)
    }

    fn add_scrape_blacklisted_artist(&self, artist_id: &str, name: Option<&str>) -> Result<()> {
        self.writes.add_scrape_blacklisted_artist(artist_id, name)
    }

    fn is_playlist_blacklisted(&self, playlist_id: &str) -> Result<bool> {
        self.inner.is_playlist_blacklisted(playlist_id)
    }

    fn get_playlist_fact(&self, playlist_id: &str) -> Result<Option<PlaylistFact>> {
        self.inner.get_playlist_fact(playlist_id)
    }

    fn upsert_playlist_fact(
        &self,
        playlist_id: &str,
        name: Option<&str>,
        blacklisted: bool,
    ) -> Result<()> {
        self.writes.upsert_playlist_fact(playlist_id, name, blacklisted)
    }

    fn whitelisted_profiles(&self) -> Result<Vec<String>> {
        self.inner.whitelisted_profiles()
    }

    fn add_whitelisted_profile(&self, profile_id: &str) -> Result<()> {
        self.writes.add_whitelisted_profile(profile_id)
    }
}
