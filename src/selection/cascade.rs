use super::{
    count_artist_tracks, DiscoverySource, ExclusionGate, GateCheck, TrackCandidate, TrackDrawer,
    Verdict,
};
use crate::catalog::{
    same_name, Artist, CatalogService, PlaylistItem, PlaylistSummary, PLAYLIST_PAGE_SIZE,
    SEARCH_PAGE_SIZE,
};
use crate::config::SelectionSettings;
use crate::exclusion_store::ExclusionFacts;
use crate::history::ListeningHistory;
use crate::scraper::PlaylistScraper;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Artist search page used when re-resolving a name.
const BROAD_SEARCH_LIMIT: usize = 10;

/// Finds at most one acceptable track for an artist by trying, in order:
/// playlists on the artist's profile page, searched user playlists, similar
/// artists from the listening history and related artists from the catalog.
pub struct DiscoveryCascade<'a> {
    catalog: &'a dyn CatalogService,
    scraper: &'a dyn PlaylistScraper,
    history: &'a dyn ListeningHistory,
    facts: &'a ExclusionFacts,
    gate: &'a ExclusionGate<'a>,
    drawer: &'a TrackDrawer<'a>,
    settings: &'a SelectionSettings,
    market: &'a str,
}

impl<'a> DiscoveryCascade<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: &'a dyn CatalogService,
        scraper: &'a dyn PlaylistScraper,
        history: &'a dyn ListeningHistory,
        facts: &'a ExclusionFacts,
        gate: &'a ExclusionGate<'a>,
        drawer: &'a TrackDrawer<'a>,
        settings: &'a SelectionSettings,
        market: &'a str,
    ) -> Self {
        Self {
            catalog,
            scraper,
            history,
            facts,
            gate,
            drawer,
            settings,
            market,
        }
    }

    pub fn discover<R: Rng + ?Sized>(
        &self,
        artist_name: &str,
        run_artist_ids: &HashSet<String>,
        rng: &mut R,
    ) -> Option<TrackCandidate> {
        let artist = match self.catalog.search_artists(artist_name, 1) {
            Ok(results) => match results.into_iter().next() {
                Some(artist) => artist,
                None => {
                    info!("No catalog artist found for '{}'", artist_name);
                    return None;
                }
            },
            Err(e) => {
                warn!("Artist search for '{}' failed: {}", artist_name, e);
                return None;
            }
        };

        // Playlists looked at by the first source are not revisited by the second
        let mut seen_playlists = HashSet::new();

        if let Some(candidate) = self.from_artist_playlists(
            &artist,
            artist_name,
            run_artist_ids,
            &mut seen_playlists,
            rng,
        ) {
            return Some(candidate);
        }
        info!(
            "No track from artist-made playlists for '{}', trying searched playlists",
            artist_name
        );

        if let Some(candidate) = self.from_searched_playlists(
            &artist,
            artist_name,
            run_artist_ids,
            &mut seen_playlists,
            rng,
        ) {
            return Some(candidate);
        }
        info!(
            "No track from searched playlists for '{}', trying similar artists",
            artist_name
        );

        if let Some(candidate) = self.from_similar_artists(artist_name, run_artist_ids, rng) {
            return Some(candidate);
        }
        info!(
            "No track from similar artists for '{}', trying related artists",
            artist_name
        );

        let candidate = self.from_related_artists(&artist, artist_name, run_artist_ids, rng);
        if candidate.is_none() {
            info!("Every discovery source exhausted for '{}'", artist_name);
        }
        candidate
    }

    fn from_artist_playlists<R: Rng + ?Sized>(
        &self,
        artist: &Artist,
        artist_name: &str,
        run_artist_ids: &HashSet<String>,
        seen_playlists: &mut HashSet<String>,
        rng: &mut R,
    ) -> Option<TrackCandidate> {
        if self.facts.is_artist_scrape_blacklisted(&artist.id) {
            debug!("Artist {} is scrape-blacklisted", artist.id);
            return None;
        }

        let mut attempted = 0;
        for playlist in self.scraper.artist_playlists(&artist.id) {
            if attempted == self.settings.artist_playlist_cap {
                break;
            }
            if !seen_playlists.insert(playlist.id.clone()) {
                continue;
            }

            let Some(items) = self.first_page(&playlist.id) else {
                info!(
                    "Scraped playlist {} unusable, scrape-blacklisting artist '{}'",
                    playlist.id, artist.name
                );
                self.facts
                    .add_scrape_blacklisted_artist(&artist.id, Some(artist.name.as_str()));
                return None;
            };

            let artist_tracks = count_artist_tracks(&items, artist_name, None);
            if artist_tracks > self.settings.artist_playlist_max_artist_tracks {
                debug!(
                    "Skipping '{}': {} tracks by the artist",
                    playlist.name, artist_tracks
                );
                continue;
            }
            attempted += 1;

            let source = DiscoverySource::ArtistPlaylist {
                playlist_id: playlist.id.clone(),
                name: playlist.name.clone(),
            };
            if let Some(candidate) = self.drawer.draw(
                &playlist.id,
                &source,
                artist_name,
                self.settings.artist_playlist_ceiling,
                run_artist_ids,
                rng,
            ) {
                return Some(candidate);
            }
        }
        None
    }

    fn from_searched_playlists<R: Rng + ?Sized>(
        &self,
        artist: &Artist,
        artist_name: &str,
        run_artist_ids: &HashSet<String>,
        seen_playlists: &mut HashSet<String>,
        rng: &mut R,
    ) -> Option<TrackCandidate> {
        let mut playlists = self.search_playlists(artist_name);
        playlists.shuffle(rng);

        let mut confirmed = 0;
        for playlist in playlists {
            if confirmed >= self.settings.searched_playlist_cap {
                break;
            }
            if !seen_playlists.insert(playlist.id.clone()) {
                continue;
            }
            if self.facts.is_playlist_blacklisted(&playlist.id) {
                continue;
            }

            let Some(items) = self.first_page(&playlist.id) else {
                self.facts
                    .record_playlist(&playlist.id, Some(playlist.name.as_str()), true);
                continue;
            };

            let artist_tracks =
                count_artist_tracks(&items, artist_name, Some(artist.id.as_str()));
            if artist_tracks == 0 {
                self.facts
                    .record_playlist(&playlist.id, Some(playlist.name.as_str()), false);
                continue;
            }
            confirmed += 1;

            if artist_tracks > self.settings.searched_playlist_max_artist_tracks {
                debug!(
                    "Skipping '{}': {} tracks by the artist",
                    playlist.name, artist_tracks
                );
                continue;
            }

            let source = DiscoverySource::SearchedPlaylist {
                playlist_id: playlist.id.clone(),
                name: playlist.name.clone(),
            };
            if let Some(candidate) = self.drawer.draw(
                &playlist.id,
                &source,
                artist_name,
                self.settings.follower_ceiling,
                run_artist_ids,
                rng,
            ) {
                return Some(candidate);
            }
        }
        None
    }

    fn from_similar_artists<R: Rng + ?Sized>(
        &self,
        artist_name: &str,
        run_artist_ids: &HashSet<String>,
        rng: &mut R,
    ) -> Option<TrackCandidate> {
        let cap = self.settings.similar_artist_cap;
        let mut names = match self.history.similar_artists(artist_name, cap) {
            Ok(names) => names,
            Err(e) => {
                warn!("Similar artists lookup for '{}' failed: {}", artist_name, e);
                return None;
            }
        };
        names.truncate(cap);
        names.shuffle(rng);

        for name in names {
            let similar = match self.catalog.search_artists(&name, 1) {
                Ok(results) => results.into_iter().next(),
                Err(e) => {
                    debug!("Artist search for '{}' failed: {}", name, e);
                    None
                }
            };
            let Some(similar) = similar else { continue };

            let source = DiscoverySource::SimilarArtist {
                artist_name: similar.name.clone(),
            };
            if let Some(candidate) = self.top_track_candidate(&similar, source, run_artist_ids, rng)
            {
                return Some(candidate);
            }
        }
        None
    }

    fn from_related_artists<R: Rng + ?Sized>(
        &self,
        artist: &Artist,
        artist_name: &str,
        run_artist_ids: &HashSet<String>,
        rng: &mut R,
    ) -> Option<TrackCandidate> {
        let mut artist_id = artist.id.clone();
        let mut related = self.related_artists(&artist_id);

        if related.is_empty() {
            match self.broad_resolve(artist_name) {
                Some(resolved) if resolved.id != artist_id => {
                    debug!(
                        "Re-resolved '{}' from {} to {}",
                        artist_name, artist_id, resolved.id
                    );
                    artist_id = resolved.id;
                    related = self.related_artists(&artist_id);
                }
                _ => {}
            }
        }

        related.shuffle(rng);
        for candidate_artist in related
            .into_iter()
            .take(self.settings.related_artist_cap)
        {
            if candidate_artist.id == artist_id || same_name(&candidate_artist.name, artist_name) {
                continue;
            }
            let source = DiscoverySource::RelatedArtist {
                artist_name: candidate_artist.name.clone(),
            };
            if let Some(candidate) =
                self.top_track_candidate(&candidate_artist, source, run_artist_ids, rng)
            {
                return Some(candidate);
            }
        }
        None
    }

    /// A random top track of `artist`, if the artist is small enough and the
    /// track passes the gate.
    fn top_track_candidate<R: Rng + ?Sized>(
        &self,
        artist: &Artist,
        source: DiscoverySource,
        run_artist_ids: &HashSet<String>,
        rng: &mut R,
    ) -> Option<TrackCandidate> {
        let ceiling = self.settings.follower_ceiling;
        if artist.followers.is_some_and(|followers| followers >= ceiling) {
            debug!("Skipping '{}': too many followers", artist.name);
            return None;
        }

        let tracks = match self.catalog.artist_top_tracks(&artist.id, self.market) {
            Ok(tracks) => tracks,
            Err(e) => {
                debug!("Top tracks for '{}' failed: {}", artist.name, e);
                return None;
            }
        };
        let track = tracks.choose(rng)?.clone();
        let candidate = TrackCandidate::from_track(track, source)?;

        match self
            .gate
            .validate(&candidate, run_artist_ids, GateCheck::standalone(ceiling))
        {
            Verdict::Accept => {
                info!(
                    "Picked '{}' from {}",
                    candidate.track_name, candidate.source
                );
                Some(candidate)
            }
            Verdict::Reject(reason) => {
                debug!("Rejected '{}': {}", candidate.track_name, reason);
                None
            }
        }
    }

    /// First page of a playlist, or `None` when it is unavailable or empty.
    fn first_page(&self, playlist_id: &str) -> Option<Vec<PlaylistItem>> {
        match self.catalog.playlist_items(playlist_id, PLAYLIST_PAGE_SIZE, 0) {
            Ok(page) if !page.items.is_empty() => Some(page.items),
            Ok(_) => None,
            Err(e) => {
                debug!("Fetching playlist {} failed: {}", playlist_id, e);
                None
            }
        }
    }

    /// Searched playlists across a few pages, deduplicated by id.
    fn search_playlists(&self, query: &str) -> Vec<PlaylistSummary> {
        let mut ids = HashSet::new();
        let mut playlists = Vec::new();
        for page in 0..self.settings.search_pages {
            let offset = page * SEARCH_PAGE_SIZE;
            match self.catalog.search_playlists(query, SEARCH_PAGE_SIZE, offset) {
                Ok(result) => {
                    let fetched = result.fetched;
                    for playlist in result.items {
                        if ids.insert(playlist.id.clone()) {
                            playlists.push(playlist);
                        }
                    }
                    if fetched < SEARCH_PAGE_SIZE || offset + SEARCH_PAGE_SIZE >= result.total {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Playlist search for '{}' failed: {}", query, e);
                    break;
                }
            }
        }
        debug!("Found {} playlists for '{}'", playlists.len(), query);
        playlists
    }

    fn related_artists(&self, artist_id: &str) -> Vec<Artist> {
        self.catalog.related_artists(artist_id).unwrap_or_else(|e| {
            debug!("Related artists for {} failed: {}", artist_id, e);
            vec![]
        })
    }

    /// Wider artist search preferring an exact case-insensitive name match.
    fn broad_resolve(&self, artist_name: &str) -> Option<Artist> {
        let results = self
            .catalog
            .search_artists(artist_name, BROAD_SEARCH_LIMIT)
            .ok()?;
        let exact = results
            .iter()
            .position(|a| same_name(&a.name, artist_name))
            .unwrap_or(0);
        results.into_iter().nth(exact)
    }
}
