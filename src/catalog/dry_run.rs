use super::{Artist, CatalogError, CatalogService, Page, PlaylistItem, PlaylistSummary, Track};
use std::sync::Arc;
use tracing::info;

/// Passes reads through to the wrapped catalog and drops every write.
pub struct DryRunCatalog {
    inner: Arc<dyn CatalogService>,
}

impl DryRunCatalog {
    pub fn new(inner: Arc<dyn CatalogService>) -> Self {
        Self { inner }
    }
}

impl CatalogService for DryRunCatalog {
    fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<Artist>, CatalogError> {
        self.inner.search_artists(query, limit)
    }

    fn search_playlists(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError> {
        self.inner.search_playlists(query, limit, offset)
    }

    fn playlist_items(
        &self,
        playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, CatalogError> {
        self.inner.playlist_items(playlist_id, limit, offset)
    }

    fn artist(&self, artist_id: &str) -> Result<Artist, CatalogError> {
        self.inner.artist(artist_id)
    }

    fn artist_top_tracks(
        &self,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>, CatalogError> {
        self.inner.artist_top_tracks(artist_id, market)
    }

    fn related_artists(&self, artist_id: &str) -> Result<Vec<Artist>, CatalogError> {
        self.inner.related_artists(artist_id)
    }

    fn add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<(), CatalogError> {
        info!(
            "[dry-run] Would add {} track(s) to {}: {:?}",
            track_ids.len(),
            playlist_id,
            track_ids
        );
        Ok(())
    }

    fn remove_all_occurrences(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), CatalogError> {
        info!(
            "[dry-run] Would remove {} track(s) from {}: {:?}",
            track_ids.len(),
            playlist_id,
            track_ids
        );
        Ok(())
    }

    fn saved_tracks(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, CatalogError> {
        self.inner.saved_tracks(limit, offset)
    }

    fn user_playlists(
        &self,
        profile_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError> {
        self.inner.user_playlists(profile_id, limit, offset)
    }
}
