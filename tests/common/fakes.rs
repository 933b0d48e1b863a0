use chrono::{DateTime, Utc};
use playlist_curator::catalog::{
    Artist, CatalogError, CatalogService, Page, PlaylistItem, PlaylistSummary, Track,
};
use playlist_curator::exclusion_store::{
    ExclusionStore, PlaylistFact, SqliteExclusionStore, TrackBlacklistFact,
};
use playlist_curator::history::{HistoryError, ListeningHistory, PlayEvent, RecentPlaysPage};
use playlist_curator::scraper::{PlaylistRef, PlaylistScraper};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

#[derive(Default)]
struct CatalogState {
    artists: HashMap<String, Artist>,
    artist_search: HashMap<String, Vec<Artist>>,
    failing_artists: HashSet<String>,
    playlists: HashMap<String, Vec<PlaylistItem>>,
    failing_playlists: HashSet<String>,
    playlist_search: HashMap<String, Vec<PlaylistSummary>>,
    top_tracks: HashMap<String, Vec<Track>>,
    related: HashMap<String, Vec<Artist>>,
    saved: Vec<PlaylistItem>,
    user_playlists: HashMap<String, Vec<PlaylistSummary>>,
    added: Vec<(String, String)>,
    removed: Vec<String>,
    playlist_fetches: HashMap<String, usize>,
    artist_searches: Vec<(String, usize)>,
    playlist_search_offsets: Vec<usize>,
    null_entries: HashSet<String>,
}

/// Builds a page the way the real client does: entries listed in `null_entries`
/// come back as nulls, so they count as fetched but never reach `items`.
fn page_with_nulls<T>(
    all: Vec<T>,
    limit: usize,
    offset: usize,
    null_entries: &HashSet<String>,
    id_of: impl Fn(&T) -> Option<&str>,
) -> Page<T> {
    let total = all.len();
    let raw: Vec<T> = all.into_iter().skip(offset).take(limit).collect();
    let fetched = raw.len();
    let items = raw
        .into_iter()
        .filter(|entry| !id_of(entry).is_some_and(|id| null_entries.contains(id)))
        .collect();
    Page {
        items,
        total,
        fetched,
    }
}

/// In-memory catalog. Playlists that receive tracks grow like the real thing.
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
    /// `added_at` stamped on tracks appended through `add_items`.
    pub added_at: Mutex<Option<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artist(&self, artist: Artist) {
        lock(&self.state).artists.insert(artist.id.clone(), artist);
    }

    /// Fixed, ordered result for an artist search, truncated to the requested limit.
    pub fn set_artist_search(&self, query: &str, artists: Vec<Artist>) {
        lock(&self.state)
            .artist_search
            .insert(query.to_lowercase(), artists);
    }

    pub fn fail_artist_lookup(&self, artist_id: &str) {
        lock(&self.state).failing_artists.insert(artist_id.to_string());
    }

    pub fn set_playlist(&self, playlist_id: &str, items: Vec<PlaylistItem>) {
        lock(&self.state)
            .playlists
            .insert(playlist_id.to_string(), items);
    }

    pub fn fail_playlist(&self, playlist_id: &str) {
        lock(&self.state)
            .failing_playlists
            .insert(playlist_id.to_string());
    }

    pub fn set_playlist_search(&self, query: &str, playlists: Vec<PlaylistSummary>) {
        lock(&self.state)
            .playlist_search
            .insert(query.to_lowercase(), playlists);
    }

    /// The catalog returns this playlist or track id as a null entry.
    pub fn return_as_null(&self, id: &str) {
        lock(&self.state).null_entries.insert(id.to_string());
    }

    pub fn set_top_tracks(&self, artist_id: &str, tracks: Vec<Track>) {
        lock(&self.state)
            .top_tracks
            .insert(artist_id.to_string(), tracks);
    }

    pub fn set_related(&self, artist_id: &str, artists: Vec<Artist>) {
        lock(&self.state)
            .related
            .insert(artist_id.to_string(), artists);
    }

    pub fn set_saved_tracks(&self, items: Vec<PlaylistItem>) {
        lock(&self.state).saved = items;
    }

    pub fn set_user_playlists(&self, profile_id: &str, playlists: Vec<PlaylistSummary>) {
        lock(&self.state)
            .user_playlists
            .insert(profile_id.to_string(), playlists);
    }

    pub fn playlist(&self, playlist_id: &str) -> Vec<PlaylistItem> {
        lock(&self.state)
            .playlists
            .get(playlist_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn added(&self) -> Vec<(String, String)> {
        lock(&self.state).added.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        lock(&self.state).removed.clone()
    }

    pub fn playlist_fetches(&self, playlist_id: &str) -> usize {
        lock(&self.state)
            .playlist_fetches
            .get(playlist_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn artist_searches(&self) -> Vec<(String, usize)> {
        lock(&self.state).artist_searches.clone()
    }

    pub fn playlist_search_offsets(&self) -> Vec<usize> {
        lock(&self.state).playlist_search_offsets.clone()
    }
}

impl CatalogService for FakeCatalog {
    fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<Artist>, CatalogError> {
        let mut state = lock(&self.state);
        state.artist_searches.push((query.to_string(), limit));
        let query = query.to_lowercase();
        if let Some(fixed) = state.artist_search.get(&query) {
            return Ok(fixed.iter().take(limit).cloned().collect());
        }
        let mut matches: Vec<Artist> = state
            .artists
            .values()
            .filter(|a| a.name.to_lowercase().contains(&query))
            .cloned()
            .collect();
        // Exact matches first, then by id for stable results
        matches.sort_by_key(|a| (a.name.to_lowercase() != query, a.id.clone()));
        matches.truncate(limit);
        Ok(matches)
    }

    fn search_playlists(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError> {
        let mut state = lock(&self.state);
        state.playlist_search_offsets.push(offset);
        let all = state
            .playlist_search
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default();
        Ok(page_with_nulls(all, limit, offset, &state.null_entries, |p| {
            Some(p.id.as_str())
        }))
    }

    fn playlist_items(
        &self,
        playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, CatalogError> {
        let mut state = lock(&self.state);
        *state
            .playlist_fetches
            .entry(playlist_id.to_string())
            .or_default() += 1;
        if state.failing_playlists.contains(playlist_id) {
            return Err(CatalogError::Client {
                status: 403,
                message: "forbidden".to_string(),
            });
        }
        let items = state
            .playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))?;
        Ok(page_with_nulls(items, limit, offset, &state.null_entries, |item| {
            item.track.as_ref().and_then(|t| t.id.as_deref())
        }))
    }

    fn artist(&self, artist_id: &str) -> Result<Artist, CatalogError> {
        let state = lock(&self.state);
        if state.failing_artists.contains(artist_id) {
            return Err(CatalogError::Transient("artist lookup timed out".to_string()));
        }
        state
            .artists
            .get(artist_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(artist_id.to_string()))
    }

    fn artist_top_tracks(
        &self,
        artist_id: &str,
        _market: &str,
    ) -> Result<Vec<Track>, CatalogError> {
        Ok(lock(&self.state)
            .top_tracks
            .get(artist_id)
            .cloned()
            .unwrap_or_default())
    }

    fn related_artists(&self, artist_id: &str) -> Result<Vec<Artist>, CatalogError> {
        Ok(lock(&self.state)
            .related
            .get(artist_id)
            .cloned()
            .unwrap_or_default())
    }

    fn add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<(), CatalogError> {
        let added_at = lock(&self.added_at).clone();
        let mut state = lock(&self.state);
        for track_id in track_ids {
            state
                .added
                .push((playlist_id.to_string(), track_id.clone()));
            let track = state
                .playlists
                .values()
                .flatten()
                .chain(state.saved.iter())
                .filter_map(|item| item.track.clone())
                .find(|t| t.id.as_deref() == Some(track_id.as_str()))
                .or_else(|| {
                    state
                        .top_tracks
                        .values()
                        .flatten()
                        .find(|t| t.id.as_deref() == Some(track_id.as_str()))
                        .cloned()
                });
            state
                .playlists
                .entry(playlist_id.to_string())
                .or_default()
                .push(PlaylistItem {
                    track,
                    added_at: added_at.clone(),
                });
        }
        Ok(())
    }

    fn remove_all_occurrences(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), CatalogError> {
        let mut state = lock(&self.state);
        state.removed.extend(track_ids.iter().cloned());
        if let Some(items) = state.playlists.get_mut(playlist_id) {
            items.retain(|item| {
                item.track
                    .as_ref()
                    .and_then(|t| t.id.as_ref())
                    .map_or(true, |id| !track_ids.contains(id))
            });
        }
        Ok(())
    }

    fn saved_tracks(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, CatalogError> {
        let state = lock(&self.state);
        Ok(Page::complete(
            state.saved.iter().skip(offset).take(limit).cloned().collect(),
            state.saved.len(),
        ))
    }

    fn user_playlists(
        &self,
        profile_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError> {
        let state = lock(&self.state);
        let all = state
            .user_playlists
            .get(profile_id)
            .cloned()
            .unwrap_or_default();
        let total = all.len();
        Ok(Page::complete(
            all.into_iter().skip(offset).take(limit).collect(),
            total,
        ))
    }
}

#[derive(Default)]
pub struct FakeScraper {
    pages: HashMap<String, Vec<PlaylistRef>>,
    calls: Mutex<Vec<String>>,
}

impl FakeScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlists(mut self, artist_id: &str, playlists: &[(&str, &str)]) -> Self {
        self.pages.insert(
            artist_id.to_string(),
            playlists
                .iter()
                .map(|(id, name)| PlaylistRef {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl PlaylistScraper for FakeScraper {
    fn artist_playlists(&self, artist_id: &str) -> Vec<PlaylistRef> {
        lock(&self.calls).push(artist_id.to_string());
        self.pages.get(artist_id).cloned().unwrap_or_default()
    }
}

#[derive(Default)]
pub struct FakeHistory {
    pub plays: Vec<PlayEvent>,
    pub similar: HashMap<String, Vec<String>>,
    pub fail_recent_plays: bool,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_play(mut self, artist: &str, played_at: DateTime<Utc>) -> Self {
        self.plays.push(PlayEvent {
            artist: artist.to_string(),
            played_at,
        });
        self
    }

    pub fn with_similar(mut self, artist: &str, similar: &[&str]) -> Self {
        self.similar.insert(
            artist.to_lowercase(),
            similar.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

impl ListeningHistory for FakeHistory {
    fn recent_plays(
        &self,
        _user: &str,
        _page: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<RecentPlaysPage, HistoryError> {
        if self.fail_recent_plays {
            return Err(HistoryError::Transient("history unavailable".to_string()));
        }
        let events = self
            .plays
            .iter()
            .filter(|p| since.map_or(true, |since| p.played_at >= since))
            .cloned()
            .collect();
        Ok(RecentPlaysPage {
            events,
            total_pages: 1,
        })
    }

    fn similar_artists(
        &self,
        artist_name: &str,
        limit: usize,
    ) -> Result<Vec<String>, HistoryError> {
        let mut names = self
            .similar
            .get(&artist_name.to_lowercase())
            .cloned()
            .unwrap_or_default();
        names.truncate(limit);
        Ok(names)
    }
}

/// In-memory SQLite store that counts scrape-blacklist writes.
pub struct CountingStore {
    pub inner: SqliteExclusionStore,
    scrape_blacklist_writes: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteExclusionStore::open_in_memory().unwrap(),
            scrape_blacklist_writes: Mutex::new(vec![]),
        }
    }

    pub fn scrape_blacklist_writes(&self) -> Vec<String> {
        lock(&self.scrape_blacklist_writes).clone()
    }
}

impl ExclusionStore for CountingStore {
    fn is_track_blacklisted(&self, track_id: &str) -> anyhow::Result<bool> {
        self.inner.is_track_blacklisted(track_id)
    }
    fn blacklisted_artist_count(&self, artist_id: &str) -> anyhow::Result<usize> {
        self.inner.blacklisted_artist_count(artist_id)
    }
    fn insert_track_blacklist_fact(&self, fact: &TrackBlacklistFact) -> anyhow::Result<()> {
        self.inner.insert_track_blacklist_fact(fact)
    }
    fn stale_unfixed_tracks(
        &self,
        created_before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<TrackBlacklistFact>> {
        self.inner.stale_unfixed_tracks(created_before)
    }
    fn mark_track_fixed(&self, track_id: &str) -> anyhow::Result<bool> {
        self.inner.mark_track_fixed(track_id)
    }
    fn is_artist_scrape_blacklisted(&self, artist_id: &str) -> anyhow::Result<bool> {
        self.inner.is_artist_scrape_blacklisted(artist_id)
    }
    fn add_scrape_blacklisted_artist(
        &self,
        artist_id: &str,
        name: Option<&str>,
    ) -> anyhow::Result<()> {
        lock(&self.scrape_blacklist_writes).push(artist_id.to_string());
        self.inner.add_scrape_blacklisted_artist(artist_id, name)
    }
    fn is_playlist_blacklisted(&self, playlist_id: &str) -> anyhow::Result<bool> {
        self.inner.is_playlist_blacklisted(playlist_id)
    }
    fn get_playlist_fact(&self, playlist_id: &str) -> anyhow::Result<Option<PlaylistFact>> {
        self.inner.get_playlist_fact(playlist_id)
    }
    fn upsert_playlist_fact(
        &self,
        playlist_id: &str,
        name: Option<&str>,
        blacklisted: bool,
    ) -> anyhow::Result<()> {
        self.inner.upsert_playlist_fact(playlist_id, name, blacklisted)
    }
    fn whitelisted_profiles(&self) -> anyhow::Result<Vec<String>> {
        self.inner.whitelisted_profiles()
    }
    fn add_whitelisted_profile(&self, profile_id: &str) -> anyhow::Result<()> {
        self.inner.add_whitelisted_profile(profile_id)
    }
}
