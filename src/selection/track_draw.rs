use super::{DiscoverySource, ExclusionGate, GateCheck, TrackCandidate, Verdict};
use crate::catalog::{CatalogService, PLAYLIST_PAGE_SIZE};
use crate::config::SelectionSettings;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info};

/// Draws uniformly random tracks from a playlist until one passes the gate.
pub struct TrackDrawer<'a> {
    catalog: &'a dyn CatalogService,
    gate: &'a ExclusionGate<'a>,
    max_attempts: usize,
    max_consecutive_rejections: usize,
}

impl<'a> TrackDrawer<'a> {
    pub fn new(
        catalog: &'a dyn CatalogService,
        gate: &'a ExclusionGate<'a>,
        settings: &SelectionSettings,
    ) -> Self {
        Self {
            catalog,
            gate,
            max_attempts: settings.draw_attempts,
            max_consecutive_rejections: settings.max_consecutive_rejections,
        }
    }

    /// Up to `max_attempts` draws, each on a freshly fetched item list.
    ///
    /// Gives up when the playlist cannot be fetched or is empty, and after
    /// `max_consecutive_rejections` gate rejections in a row. Items without an
    /// id or without artists are skipped and do not count as rejections.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        playlist_id: &str,
        source: &DiscoverySource,
        artist_name: &str,
        follower_ceiling: u64,
        run_artist_ids: &HashSet<String>,
        rng: &mut R,
    ) -> Option<TrackCandidate> {
        let mut consecutive_rejections = 0;

        for attempt in 1..=self.max_attempts {
            let items = match self.catalog.playlist_items(playlist_id, PLAYLIST_PAGE_SIZE, 0) {
                Ok(page) if !page.items.is_empty() => page.items,
                Ok(_) => {
                    debug!("Playlist {} is empty, giving up", source);
                    return None;
                }
                Err(e) => {
                    debug!("Playlist {} unavailable ({}), giving up", source, e);
                    return None;
                }
            };

            let Some(item) = items.choose(rng) else {
                return None;
            };
            let Some(track) = item.track.clone().filter(|t| !t.artists.is_empty()) else {
                debug!("Skipping item without artists in {}", source);
                continue;
            };
            let Some(candidate) = TrackCandidate::from_track(track, source.clone()) else {
                debug!("Skipping item without id in {}", source);
                continue;
            };

            match self.gate.validate(
                &candidate,
                run_artist_ids,
                GateCheck::draw(follower_ceiling),
            ) {
                Verdict::Accept => {
                    info!(
                        "[attempt {}] Picked '{}' from {} while looking for '{}'",
                        attempt, candidate.track_name, source, artist_name
                    );
                    return Some(candidate);
                }
                Verdict::Reject(reason) => {
                    consecutive_rejections += 1;
                    debug!(
                        "[attempt {}] Rejected '{}' from {}: {}",
                        attempt, candidate.track_name, source, reason
                    );
                    if consecutive_rejections >= self.max_consecutive_rejections {
                        info!(
                            "{} consecutive rejections in {}, moving on",
                            consecutive_rejections, source
                        );
                        return None;
                    }
                }
            }
        }
        None
    }
}
