//! Music catalog access (search, playlists, artists, the user's library).

mod dry_run;
mod error;
mod spotify;

pub use dry_run::DryRunCatalog;
pub use error::CatalogError;
pub use spotify::SpotifyClient;

/// Maximum page size accepted by the catalog for playlist items.
pub const PLAYLIST_PAGE_SIZE: usize = 100;
/// Maximum page size for searches, saved tracks and profile playlists.
pub const SEARCH_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub followers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Local files and unavailable tracks have no id.
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<TrackArtist>,
}

impl Track {
    pub fn primary_artist(&self) -> Option<&TrackArtist> {
        self.artists.first()
    }

    /// True if any credit's name matches, case-insensitively.
    pub fn credits_artist_named(&self, name: &str) -> bool {
        self.artists.iter().any(|a| same_name(&a.name, name))
    }
}

/// Case-insensitive artist name equality.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// An entry of a playlist or of the saved-tracks library.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    pub track: Option<Track>,
    /// ISO 8601 timestamp as reported by the catalog.
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    /// Entries the catalog returned for this page, counting the null or
    /// id-less ones that were dropped from `items`. Pagination advances by it.
    pub fetched: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: vec![],
            total: 0,
            fetched: 0,
        }
    }

    /// A page where every returned entry was usable.
    pub fn complete(items: Vec<T>, total: usize) -> Self {
        Self {
            fetched: items.len(),
            items,
            total,
        }
    }
}

pub trait CatalogService: Send + Sync {
    fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<Artist>, CatalogError>;

    fn search_playlists(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError>;

    fn playlist_items(
        &self,
        playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, CatalogError>;

    fn artist(&self, artist_id: &str) -> Result<Artist, CatalogError>;

    fn artist_top_tracks(&self, artist_id: &str, market: &str)
        -> Result<Vec<Track>, CatalogError>;

    fn related_artists(&self, artist_id: &str) -> Result<Vec<Artist>, CatalogError>;

    /// Append tracks to the end of a playlist.
    fn add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<(), CatalogError>;

    /// Remove every occurrence of the given tracks from a playlist.
    fn remove_all_occurrences(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), CatalogError>;

    /// The user's liked tracks, newest first.
    fn saved_tracks(&self, limit: usize, offset: usize)
        -> Result<Page<PlaylistItem>, CatalogError>;

    fn user_playlists(
        &self,
        profile_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError>;
}

/// Fetch every item of a playlist, following pagination.
pub fn all_playlist_items(
    catalog: &dyn CatalogService,
    playlist_id: &str,
) -> Result<Vec<PlaylistItem>, CatalogError> {
    let mut items = Vec::new();
    let mut offset = 0;
    loop {
        let page = catalog.playlist_items(playlist_id, PLAYLIST_PAGE_SIZE, offset)?;
        items.extend(page.items);
        offset += PLAYLIST_PAGE_SIZE;
        if page.fetched < PLAYLIST_PAGE_SIZE || offset >= page.total {
            break;
        }
    }
    Ok(items)
}
