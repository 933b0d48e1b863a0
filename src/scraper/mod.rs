//! Discovery of playlists listed on an artist's public profile page.

mod profile_page;

pub use profile_page::ProfilePageScraper;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub name: String,
    pub id: String,
}

/// Best-effort: any failure yields an empty list.
pub trait PlaylistScraper {
    fn artist_playlists(&self, artist_id: &str) -> Vec<PlaylistRef>;
}

/// Used when scraping is disabled.
pub struct NoOpScraper;

impl PlaylistScraper for NoOpScraper {
    fn artist_playlists(&self, _artist_id: &str) -> Vec<PlaylistRef> {
        vec![]
    }
}
