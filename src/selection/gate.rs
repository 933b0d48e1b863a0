use super::TrackCandidate;
use crate::catalog::CatalogService;
use crate::config::SelectionSettings;
use crate::exclusion_store::ExclusionFacts;
use crate::registry::ArtistRegistry;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NoArtists,
    TrackBlacklisted,
    ArtistOverBlacklistThreshold { count: usize },
    BlockedByRegistry { total_liked: u32 },
    ArtistAlreadyRepresented,
    AboveFollowerCeiling { followers: u64, ceiling: u64 },
    FollowerLookupFailed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoArtists => write!(f, "no artists"),
            RejectReason::TrackBlacklisted => write!(f, "track blacklisted"),
            RejectReason::ArtistOverBlacklistThreshold { count } => {
                write!(f, "artist over blacklist threshold ({} facts)", count)
            }
            RejectReason::BlockedByRegistry { total_liked } => {
                write!(f, "blocked by registry: over-liked ({} likes)", total_liked)
            }
            RejectReason::ArtistAlreadyRepresented => {
                write!(f, "artist already represented in playlist this run")
            }
            RejectReason::AboveFollowerCeiling { followers, ceiling } => {
                write!(f, "{} followers exceeds ceiling of {}", followers, ceiling)
            }
            RejectReason::FollowerLookupFailed => write!(f, "follower lookup failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Which optional checks a validation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateCheck {
    pub track_blacklist: bool,
    pub follower_ceiling: Option<u64>,
}

impl GateCheck {
    /// Inside a playlist draw: no track-blacklist lookup.
    pub fn draw(follower_ceiling: u64) -> Self {
        Self {
            track_blacklist: false,
            follower_ceiling: Some(follower_ceiling),
        }
    }

    /// Candidates checked on their own, outside a playlist draw.
    pub fn standalone(follower_ceiling: u64) -> Self {
        Self {
            track_blacklist: true,
            follower_ceiling: Some(follower_ceiling),
        }
    }

    /// Last check before a track is added to the playlist.
    pub fn final_admission() -> Self {
        Self {
            track_blacklist: true,
            follower_ceiling: None,
        }
    }
}

/// Decides whether a candidate track may enter the playlist.
///
/// Checks run in a fixed order and stop at the first rejection. Only the
/// follower ceiling reaches out to the catalog; counts are cached for the
/// lifetime of the gate.
pub struct ExclusionGate<'a> {
    catalog: &'a dyn CatalogService,
    facts: &'a ExclusionFacts,
    registry: &'a ArtistRegistry,
    artist_blacklist_threshold: usize,
    registry_like_threshold: u32,
    followers: RefCell<HashMap<String, u64>>,
}

impl<'a> ExclusionGate<'a> {
    pub fn new(
        catalog: &'a dyn CatalogService,
        facts: &'a ExclusionFacts,
        registry: &'a ArtistRegistry,
        settings: &SelectionSettings,
    ) -> Self {
        Self {
            catalog,
            facts,
            registry,
            artist_blacklist_threshold: settings.artist_blacklist_threshold,
            registry_like_threshold: settings.registry_like_threshold,
            followers: RefCell::new(HashMap::new()),
        }
    }

    pub fn validate(
        &self,
        candidate: &TrackCandidate,
        run_artist_ids: &HashSet<String>,
        check: GateCheck,
    ) -> Verdict {
        // A primary artist without an id cannot be tracked across runs
        let Some((primary, artist_id)) = candidate
            .primary_artist()
            .and_then(|a| a.id.as_deref().map(|id| (a, id)))
        else {
            return Verdict::Reject(RejectReason::NoArtists);
        };

        if check.track_blacklist && self.facts.is_track_blacklisted(&candidate.track_id) {
            return Verdict::Reject(RejectReason::TrackBlacklisted);
        }

        let count = self.facts.blacklisted_artist_count(artist_id);
        if count >= self.artist_blacklist_threshold {
            return Verdict::Reject(RejectReason::ArtistOverBlacklistThreshold { count });
        }

        if let Some(record) = self.registry.lookup(Some(artist_id), &primary.name) {
            if record.total_liked >= self.registry_like_threshold {
                return Verdict::Reject(RejectReason::BlockedByRegistry {
                    total_liked: record.total_liked,
                });
            }
        }

        if run_artist_ids.contains(artist_id) {
            return Verdict::Reject(RejectReason::ArtistAlreadyRepresented);
        }

        if let Some(ceiling) = check.follower_ceiling {
            match self.follower_count(artist_id) {
                Some(followers) if followers > ceiling => {
                    return Verdict::Reject(RejectReason::AboveFollowerCeiling {
                        followers,
                        ceiling,
                    });
                }
                Some(_) => {}
                None => return Verdict::Reject(RejectReason::FollowerLookupFailed),
            }
        }

        Verdict::Accept
    }

    fn follower_count(&self, artist_id: &str) -> Option<u64> {
        if let Some(count) = self.followers.borrow().get(artist_id) {
            return Some(*count);
        }
        match self.catalog.artist(artist_id) {
            Ok(artist) => {
                let count = artist.followers?;
                self.followers
                    .borrow_mut()
                    .insert(artist_id.to_string(), count);
                Some(count)
            }
            Err(e) => {
                debug!("Follower lookup for {} failed: {}", artist_id, e);
                None
            }
        }
    }
}
