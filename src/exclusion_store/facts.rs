use super::{ExclusionStore, TrackBlacklistFact};
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Infallible view over an [`ExclusionStore`].
///
/// Lookups that fail are logged and answered with a neutral default, so a
/// broken database can slow the engine down but never stop a run.
#[derive(Clone)]
pub struct ExclusionFacts {
    store: Arc<dyn ExclusionStore>,
}

impl ExclusionFacts {
    pub fn new(store: Arc<dyn ExclusionStore>) -> Self {
        Self { store }
    }

    pub fn is_track_blacklisted(&self, track_id: &str) -> bool {
        self.store
            .is_track_blacklisted(track_id)
            .unwrap_or_else(|e| {
                warn!("Track blacklist lookup failed for {}: {:#}", track_id, e);
                false
            })
    }

    pub fn blacklisted_artist_count(&self, artist_id: &str) -> usize {
        self.store
            .blacklisted_artist_count(artist_id)
            .unwrap_or_else(|e| {
                warn!("Blacklist count lookup failed for artist {}: {:#}", artist_id, e);
                0
            })
    }

    pub fn record_track(&self, fact: &TrackBlacklistFact) {
        if let Err(e) = self.store.insert_track_blacklist_fact(fact) {
            warn!("Failed to record blacklist fact for {}: {:#}", fact.track_id, e);
        }
    }

    pub fn stale_unfixed_tracks(&self, created_before: DateTime<Utc>) -> Vec<TrackBlacklistFact> {
        self.store
            .stale_unfixed_tracks(created_before)
            .unwrap_or_else(|e| {
                warn!("Failed to list stale blacklist facts: {:#}", e);
                Vec::new()
            })
    }

    pub fn mark_track_fixed(&self, track_id: &str) -> bool {
        self.store.mark_track_fixed(track_id).unwrap_or_else(|e| {
            warn!("Failed to mark {} fixed: {:#}", track_id, e);
            false
        })
    }

    pub fn is_artist_scrape_blacklisted(&self, artist_id: &str) -> bool {
        self.store
            .is_artist_scrape_blacklisted(artist_id)
            .unwrap_or_else(|e| {
                warn!("Scrape blacklist lookup failed for {}: {:#}", artist_id, e);
                false
            })
    }

    pub fn add_scrape_blacklisted_artist(&self, artist_id: &str, name: Option<&str>) {
        if let Err(e) = self.store.add_scrape_blacklisted_artist(artist_id, name) {
            warn!("Failed to scrape-blacklist artist {}: {:#}", artist_id, e);
        }
    }

    pub fn is_playlist_blacklisted(&self, playlist_id: &str) -> bool {
        self.store
            .is_playlist_blacklisted(playlist_id)
            .unwrap_or_else(|e| {
                warn!("Playlist lookup failed for {}: {:#}", playlist_id, e);
                false
            })
    }

    pub fn record_playlist(&self, playlist_id: &str, name: Option<&str>, blacklisted: bool) {
        if let Err(e) = self
            .store
            .upsert_playlist_fact(playlist_id, name, blacklisted)
        {
            warn!("Failed to record playlist {}: {:#}", playlist_id, e);
        }
    }

    /// A uniformly chosen whitelisted profile not in `exclude`, if any.
    pub fn random_whitelisted_profile<R: Rng + ?Sized>(
        &self,
        exclude: &HashSet<String>,
        rng: &mut R,
    ) -> Option<String> {
        let candidates: Vec<String> = self
            .whitelisted_profiles()
            .into_iter()
            .filter(|profile| !exclude.contains(profile))
            .collect();
        candidates.choose(rng).cloned()
    }

    pub fn add_whitelisted_profile(&self, profile_id: &str) {
        if let Err(e) = self.store.add_whitelisted_profile(profile_id) {
            warn!("Failed to whitelist profile {}: {:#}", profile_id, e);
        }
    }

    pub fn whitelisted_profiles(&self) -> Vec<String> {
        self.store.whitelisted_profiles().unwrap_or_else(|e| {
            warn!("Failed to list whitelisted profiles: {:#}", e);
            Vec::new()
        })
    }
}
