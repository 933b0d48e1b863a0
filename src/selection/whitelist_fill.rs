use super::{Admission, DiscoverySource, TrackCandidate, TrackDrawer};
use crate::catalog::{CatalogService, SEARCH_PAGE_SIZE};
use crate::config::SelectionSettings;
use crate::exclusion_store::ExclusionFacts;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Tops up a short playlist from the public playlists of whitelisted profiles.
pub struct WhitelistFill<'a> {
    catalog: &'a dyn CatalogService,
    facts: &'a ExclusionFacts,
    drawer: &'a TrackDrawer<'a>,
    admission: &'a Admission<'a>,
    settings: &'a SelectionSettings,
    stop: &'a AtomicBool,
}

impl<'a> WhitelistFill<'a> {
    pub fn new(
        catalog: &'a dyn CatalogService,
        facts: &'a ExclusionFacts,
        drawer: &'a TrackDrawer<'a>,
        admission: &'a Admission<'a>,
        settings: &'a SelectionSettings,
        stop: &'a AtomicBool,
    ) -> Self {
        Self {
            catalog,
            facts,
            drawer,
            admission,
            settings,
            stop,
        }
    }

    /// Admits up to `missing` tracks; returns those added.
    pub fn run<R: Rng + ?Sized>(
        &self,
        missing: usize,
        run_artist_ids: &mut HashSet<String>,
        rng: &mut R,
    ) -> Vec<TrackCandidate> {
        let mut added = Vec::new();
        let mut visited_profiles = HashSet::new();

        while added.len() < missing && visited_profiles.len() < self.settings.whitelist_profiles {
            let Some(profile) = self.facts.random_whitelisted_profile(&visited_profiles, rng)
            else {
                debug!("No whitelisted profiles left");
                break;
            };
            visited_profiles.insert(profile.clone());
            info!("Filling from whitelisted profile {}", profile);

            let mut playlists = match self.catalog.user_playlists(&profile, SEARCH_PAGE_SIZE, 0) {
                Ok(page) => page.items,
                Err(e) => {
                    warn!("Failed to list playlists of {}: {}", profile, e);
                    continue;
                }
            };
            playlists.shuffle(rng);

            for playlist in playlists
                .into_iter()
                .take(self.settings.whitelist_playlists_per_profile)
            {
                if added.len() >= missing || self.stop.load(Ordering::SeqCst) {
                    break;
                }
                let source = DiscoverySource::WhitelistedPlaylist {
                    profile_id: profile.clone(),
                    playlist_id: playlist.id.clone(),
                    name: playlist.name.clone(),
                };
                let Some(candidate) = self.drawer.draw(
                    &playlist.id,
                    &source,
                    &playlist.name,
                    self.settings.follower_ceiling,
                    run_artist_ids,
                    rng,
                ) else {
                    continue;
                };
                if self.admission.admit(&candidate, run_artist_ids) {
                    added.push(candidate);
                }
            }

            if self.stop.load(Ordering::SeqCst) {
                break;
            }
        }

        info!("Whitelist fill added {} of {} missing tracks", added.len(), missing);
        added
    }
}
