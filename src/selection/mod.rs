//! The selection engine.
//!
//! Artists are weighted by recent listening, drawn by lottery, and for each
//! drawn artist a discovery cascade looks for one fresh track. Every
//! candidate passes the exclusion gate before it reaches the playlist.

mod admission;
mod cascade;
mod gate;
mod lottery;
mod track_draw;
mod weighting;
mod whitelist_fill;

pub use admission::Admission;
pub use cascade::DiscoveryCascade;
pub use gate::{ExclusionGate, GateCheck, RejectReason, Verdict};
pub use lottery::{draw_artist, LotteryDriver, LotteryOutcome};
pub use track_draw::TrackDrawer;
pub use weighting::{compute_weights, Weights};
pub use whitelist_fill::WhitelistFill;

use crate::catalog::{PlaylistItem, Track, TrackArtist};
use std::fmt;

/// Where a candidate track was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    /// A playlist listed on the artist's own profile page.
    ArtistPlaylist { playlist_id: String, name: String },
    /// A third-party playlist found by searching the artist's name.
    SearchedPlaylist { playlist_id: String, name: String },
    /// Top track of an artist the listening history calls similar.
    SimilarArtist { artist_name: String },
    /// Top track of an artist the catalog calls related.
    RelatedArtist { artist_name: String },
    /// A public playlist of a whitelisted profile.
    WhitelistedPlaylist {
        profile_id: String,
        playlist_id: String,
        name: String,
    },
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoverySource::ArtistPlaylist { name, .. } => {
                write!(f, "'{}' (artist-made playlist)", name)
            }
            DiscoverySource::SearchedPlaylist { name, .. } => {
                write!(f, "'{}' (searched user playlist)", name)
            }
            DiscoverySource::SimilarArtist { artist_name } => {
                write!(f, "top tracks of '{}' (similar artist)", artist_name)
            }
            DiscoverySource::RelatedArtist { artist_name } => {
                write!(f, "top tracks of '{}' (related artist)", artist_name)
            }
            DiscoverySource::WhitelistedPlaylist {
                profile_id, name, ..
            } => write!(f, "'{}' (whitelisted profile {})", name, profile_id),
        }
    }
}

/// A track considered for admission during one lottery draw.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCandidate {
    pub track_id: String,
    pub track_name: String,
    /// Credited artists, primary first.
    pub artists: Vec<TrackArtist>,
    pub source: DiscoverySource,
}

impl TrackCandidate {
    /// `None` for tracks without an id (local files, unavailable tracks).
    pub fn from_track(track: Track, source: DiscoverySource) -> Option<Self> {
        Some(Self {
            track_id: track.id?,
            track_name: track.name,
            artists: track.artists,
            source,
        })
    }

    pub fn primary_artist(&self) -> Option<&TrackArtist> {
        self.artists.first()
    }
}

/// Items crediting the artist, by id when given or by case-insensitive name.
pub(crate) fn count_artist_tracks(
    items: &[PlaylistItem],
    artist_name: &str,
    artist_id: Option<&str>,
) -> usize {
    items
        .iter()
        .filter_map(|item| item.track.as_ref())
        .filter(|track| {
            track.credits_artist_named(artist_name)
                || artist_id.is_some_and(|id| {
                    track.artists.iter().any(|a| a.id.as_deref() == Some(id))
                })
        })
        .count()
}
