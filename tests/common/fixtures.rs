use playlist_curator::catalog::{Artist, PlaylistItem, PlaylistSummary, Track, TrackArtist};
use playlist_curator::config::{
    AppConfig, LastFmSettings, RetentionSettings, RetrySettings, ScraperSettings,
    SelectionSettings, SpotifySettings,
};
use playlist_curator::registry::{ArtistRecord, ArtistRegistry};
use std::path::Path;

pub const DESTINATION_PLAYLIST: &str = "destination";

pub fn artist(id: &str, name: &str, followers: u64) -> Artist {
    Artist {
        id: id.to_string(),
        name: name.to_string(),
        followers: Some(followers),
    }
}

/// A track credited to `(artist_id, artist_name)` pairs, primary first.
pub fn track(id: &str, artists: &[(&str, &str)]) -> Track {
    Track {
        id: Some(id.to_string()),
        name: format!("Song {}", id),
        artists: artists
            .iter()
            .map(|(artist_id, name)| TrackArtist {
                id: Some(artist_id.to_string()),
                name: name.to_string(),
            })
            .collect(),
    }
}

pub fn item(track: Track) -> PlaylistItem {
    PlaylistItem {
        track: Some(track),
        added_at: Some("2024-01-01T00:00:00Z".to_string()),
    }
}

pub fn item_added(track: Track, added_at: &str) -> PlaylistItem {
    PlaylistItem {
        track: Some(track),
        added_at: Some(added_at.to_string()),
    }
}

pub fn playlist(id: &str, name: &str) -> PlaylistSummary {
    PlaylistSummary {
        id: id.to_string(),
        name: name.to_string(),
        owner_id: None,
    }
}

pub fn registry(artists: &[(&str, &str, u32)]) -> ArtistRegistry {
    let mut registry = ArtistRegistry::default();
    for (id, name, total_liked) in artists {
        registry.insert(
            id,
            ArtistRecord {
                name: name.to_string(),
                total_liked: *total_liked,
            },
        );
    }
    registry
}

pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        db_path: dir.join("curator.db"),
        registry_path: dir.join("artists.json"),
        playlist_id: DESTINATION_PLAYLIST.to_string(),
        dry_run: false,
        skip_sweep: false,
        skip_likes_scan: false,
        whitelisted_profile_ids: vec![],
        spotify: SpotifySettings::default(),
        lastfm: LastFmSettings {
            api_key: "key".to_string(),
            username: "listener".to_string(),
            min_request_interval_ms: 0,
        },
        scraper: ScraperSettings::default(),
        selection: SelectionSettings::default(),
        retention: RetentionSettings::default(),
        retry: RetrySettings::default(),
    }
}
