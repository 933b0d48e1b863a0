//! One curation run: refresh the registry, weight artists, fill the playlist
//! and sweep out old tracks.

use crate::catalog::{all_playlist_items, CatalogService};
use crate::config::AppConfig;
use crate::exclusion_store::ExclusionFacts;
use crate::history::{build_play_map, fetch_all_recent_plays, ListeningHistory};
use crate::registry::ArtistRegistry;
use crate::retention::RetentionSweep;
use crate::scraper::PlaylistScraper;
use crate::selection::{
    compute_weights, Admission, DiscoveryCascade, ExclusionGate, LotteryDriver, TrackDrawer,
    WhitelistFill,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub added: usize,
    pub quota: usize,
    pub drawn: usize,
    pub evicted: usize,
    pub reconciled: usize,
    pub new_artists: usize,
    pub stopped: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Added {}/{} tracks ({} artists drawn), evicted {}, reconciled {}, {} new artists",
            self.added, self.quota, self.drawn, self.evicted, self.reconciled, self.new_artists
        )?;
        if self.stopped {
            write!(f, " (stopped early)")?;
        }
        Ok(())
    }
}

/// Collaborators of a run. The scraper is owned so its session can be
/// released before the sweep.
pub struct CurationRun<'a> {
    pub config: &'a AppConfig,
    pub catalog: &'a dyn CatalogService,
    pub history: &'a dyn ListeningHistory,
    pub scraper: Box<dyn PlaylistScraper + 'a>,
    pub facts: ExclusionFacts,
    pub stop: &'a AtomicBool,
}

impl<'a> CurationRun<'a> {
    /// Fails only on bookkeeping errors: reading or saving the registry,
    /// fetching the first history page or reading the destination playlist.
    pub fn execute<R: Rng + ?Sized>(self, now: DateTime<Utc>, rng: &mut R) -> Result<RunSummary> {
        let config = self.config;
        let selection = &config.selection;
        let mut summary = RunSummary {
            quota: selection.quota,
            ..Default::default()
        };

        for profile_id in &config.whitelisted_profile_ids {
            self.facts.add_whitelisted_profile(profile_id);
        }

        let mut registry = ArtistRegistry::load(&config.registry_path)?;
        if config.skip_likes_scan {
            info!("Skipping liked tracks scan");
        } else {
            match registry.refresh_from_likes(self.catalog) {
                Ok(new_artists) => {
                    for artist in &new_artists {
                        info!("New artist in registry: {} ({})", artist.name, artist.id);
                    }
                    summary.new_artists = new_artists.len();
                    if config.dry_run {
                        info!("Dry run, not saving the artist registry");
                    } else {
                        registry.save(&config.registry_path)?;
                    }
                }
                Err(e) => warn!("Liked tracks scan failed, using the registry as is: {}", e),
            }
        }

        let plays = fetch_all_recent_plays(
            self.history,
            &config.lastfm.username,
            now,
            selection.lookback_days,
        )
        .context("Failed to fetch listening history")?;
        let play_map = build_play_map(&plays, now, selection.lookback_days);
        let weights = compute_weights(&registry, &play_map, now);
        info!(
            "{} of {} registry artists have recent plays",
            weights.len(),
            registry.len()
        );

        let mut run_artist_ids: HashSet<String> =
            all_playlist_items(self.catalog, &config.playlist_id)
                .context("Failed to read the destination playlist")?
                .iter()
                .filter_map(|item| item.track.as_ref())
                .filter_map(|track| track.primary_artist())
                .filter_map(|artist| artist.id.clone())
                .collect();
        info!(
            "{} artists already represented in the playlist",
            run_artist_ids.len()
        );

        {
            let gate = ExclusionGate::new(self.catalog, &self.facts, &registry, selection);
            let drawer = TrackDrawer::new(self.catalog, &gate, selection);
            let cascade = DiscoveryCascade::new(
                self.catalog,
                self.scraper.as_ref(),
                self.history,
                &self.facts,
                &gate,
                &drawer,
                selection,
                &config.spotify.market,
            );
            let admission = Admission::new(&gate, self.catalog, &self.facts, &config.playlist_id);

            let lottery = LotteryDriver::new(&cascade, &admission, &registry, self.stop);
            let outcome = lottery.run(&weights, selection.quota, &mut run_artist_ids, rng);
            summary.added = outcome.added.len();
            summary.drawn = outcome.drawn.len();
            summary.stopped = outcome.stopped;

            if selection.whitelist_fill && !summary.stopped && summary.added < selection.quota {
                let fill = WhitelistFill::new(
                    self.catalog,
                    &self.facts,
                    &drawer,
                    &admission,
                    selection,
                    self.stop,
                );
                let filled = fill.run(selection.quota - summary.added, &mut run_artist_ids, rng);
                summary.added += filled.len();
            }
        }
        drop(self.scraper);
        summary.stopped |= self.stop.load(Ordering::SeqCst);

        if config.skip_sweep {
            info!("Skipping retention sweep");
        } else {
            let sweep = RetentionSweep::new(self.catalog, &self.facts, &config.retention);
            match sweep.sweep(&config.playlist_id, now) {
                Ok(result) => {
                    summary.evicted = result.evicted;
                    summary.reconciled = result.reconciled;
                }
                Err(e) => warn!("Retention sweep failed: {}", e),
            }
        }

        info!("{}", summary);
        Ok(summary)
    }
}
