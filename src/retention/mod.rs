//! Retention sweep for the destination playlist.
//!
//! Tracks older than the configured age are evicted, then blacklist facts for
//! tracks that have left the playlist are marked fixed.

use crate::catalog::{all_playlist_items, CatalogError, CatalogService, PlaylistItem};
use crate::config::RetentionSettings;
use crate::exclusion_store::ExclusionFacts;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub scanned: usize,
    pub evicted: usize,
    pub reconciled: usize,
}

/// Parses an `added_at` timestamp, with or without fractional seconds or offset.
pub fn parse_added_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Ids of tracks at least `max_age_days` whole days old, each listed once.
pub fn expired_track_ids(
    items: &[PlaylistItem],
    now: DateTime<Utc>,
    max_age_days: i64,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut expired = Vec::new();
    for item in items {
        let Some(track_id) = item.track.as_ref().and_then(|t| t.id.as_deref()) else {
            continue;
        };
        let Some(added_at) = item.added_at.as_deref() else {
            continue;
        };
        let Some(added) = parse_added_at(added_at) else {
            debug!("Skipping {} with unparsable added_at '{}'", track_id, added_at);
            continue;
        };
        if (now - added).num_days() >= max_age_days && seen.insert(track_id.to_string()) {
            expired.push(track_id.to_string());
        }
    }
    expired
}

pub struct RetentionSweep<'a> {
    catalog: &'a dyn CatalogService,
    facts: &'a ExclusionFacts,
    settings: &'a RetentionSettings,
}

impl<'a> RetentionSweep<'a> {
    pub fn new(
        catalog: &'a dyn CatalogService,
        facts: &'a ExclusionFacts,
        settings: &'a RetentionSettings,
    ) -> Self {
        Self {
            catalog,
            facts,
            settings,
        }
    }

    /// Evicts expired tracks from `playlist_id` and reconciles stale facts.
    ///
    /// Fails only when the playlist itself cannot be read. A failed removal
    /// batch is logged and its tracks stay in the playlist.
    pub fn sweep(
        &self,
        playlist_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary, CatalogError> {
        let items = all_playlist_items(self.catalog, playlist_id)?;
        let expired = expired_track_ids(&items, now, self.settings.max_age_days);
        info!(
            "Retention sweep: {} items scanned, {} older than {} days",
            items.len(),
            expired.len(),
            self.settings.max_age_days
        );

        let mut removed = HashSet::new();
        for batch in expired.chunks(self.settings.batch_size) {
            match self.catalog.remove_all_occurrences(playlist_id, batch) {
                Ok(()) => {
                    debug!("Removed a batch of {} tracks", batch.len());
                    removed.extend(batch.iter().cloned());
                }
                Err(e) => warn!("Failed to remove a batch of {} tracks: {}", batch.len(), e),
            }
        }

        let remaining: HashSet<&str> = items
            .iter()
            .filter_map(|item| item.track.as_ref().and_then(|t| t.id.as_deref()))
            .filter(|id| !removed.contains(*id))
            .collect();
        let reconciled = self.reconcile(&remaining, now);

        let summary = SweepSummary {
            scanned: items.len(),
            evicted: removed.len(),
            reconciled,
        };
        info!(
            "Retention sweep done: {} evicted, {} facts marked fixed",
            summary.evicted, summary.reconciled
        );
        Ok(summary)
    }

    /// Marks stale unfixed facts fixed when their track is no longer in the playlist.
    fn reconcile(&self, remaining: &HashSet<&str>, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.settings.reconcile_after_days);
        self.facts
            .stale_unfixed_tracks(cutoff)
            .into_iter()
            .filter(|fact| !remaining.contains(fact.track_id.as_str()))
            .filter(|fact| self.facts.mark_track_fixed(&fact.track_id))
            .count()
    }
}
