use super::{ExclusionGate, GateCheck, TrackCandidate, Verdict};
use crate::catalog::CatalogService;
use crate::exclusion_store::{ExclusionFacts, TrackBlacklistFact};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{info, warn};

/// Final gate and bookkeeping for a discovered track.
pub struct Admission<'a> {
    gate: &'a ExclusionGate<'a>,
    catalog: &'a dyn CatalogService,
    facts: &'a ExclusionFacts,
    playlist_id: &'a str,
}

impl<'a> Admission<'a> {
    pub fn new(
        gate: &'a ExclusionGate<'a>,
        catalog: &'a dyn CatalogService,
        facts: &'a ExclusionFacts,
        playlist_id: &'a str,
    ) -> Self {
        Self {
            gate,
            catalog,
            facts,
            playlist_id,
        }
    }

    /// Re-checks the candidate against the current run set and, on a pass,
    /// appends it to the destination playlist and blacklists it for later runs.
    ///
    /// Returns true if the track was added.
    pub fn admit(&self, candidate: &TrackCandidate, run_artist_ids: &mut HashSet<String>) -> bool {
        if let Verdict::Reject(reason) =
            self.gate
                .validate(candidate, run_artist_ids, GateCheck::final_admission())
        {
            info!(
                "Final check rejected '{}' from {}: {}",
                candidate.track_name, candidate.source, reason
            );
            return false;
        }

        // The gate already refused candidates without a primary artist id
        let Some((artist_id, artist_name)) = candidate
            .primary_artist()
            .and_then(|a| a.id.clone().map(|id| (id, a.name.clone())))
        else {
            return false;
        };

        if let Err(e) = self
            .catalog
            .add_items(self.playlist_id, &[candidate.track_id.clone()])
        {
            warn!("Failed to add '{}' to the playlist: {}", candidate.track_name, e);
            return false;
        }

        self.facts.record_track(&TrackBlacklistFact {
            track_id: candidate.track_id.clone(),
            track_name: Some(candidate.track_name.clone()),
            artist_id: artist_id.clone(),
            artist_name: Some(artist_name.clone()),
            fixed: false,
            created_at: Utc::now(),
        });
        run_artist_ids.insert(artist_id);

        info!(
            "Added '{}' by {} from {}",
            candidate.track_name, artist_name, candidate.source
        );
        true
    }
}
