use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub registry_path: Option<String>,
    pub playlist_id: Option<String>,
    pub dry_run: Option<bool>,

    // Sections
    pub spotify: Option<SpotifyConfig>,
    pub lastfm: Option<LastFmConfig>,
    pub scraper: Option<ScraperConfig>,
    pub selection: Option<SelectionConfig>,
    pub retention: Option<RetentionConfig>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub market: Option<String>,
    pub min_request_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LastFmConfig {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub min_request_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScraperConfig {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_poll_attempts: Option<u32>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    pub quota: Option<usize>,
    pub seed: Option<u64>,
    pub lookback_days: Option<i64>,
    pub artist_playlist_ceiling: Option<u64>,
    pub follower_ceiling: Option<u64>,
    pub artist_playlist_cap: Option<usize>,
    pub artist_playlist_max_artist_tracks: Option<usize>,
    pub searched_playlist_cap: Option<usize>,
    pub searched_playlist_max_artist_tracks: Option<usize>,
    pub search_pages: Option<usize>,
    pub similar_artist_cap: Option<usize>,
    pub related_artist_cap: Option<usize>,
    pub draw_attempts: Option<usize>,
    pub max_consecutive_rejections: Option<usize>,
    pub artist_blacklist_threshold: Option<usize>,
    pub registry_like_threshold: Option<u32>,
    pub whitelist_fill: Option<bool>,
    pub whitelist_profiles: Option<usize>,
    pub whitelist_playlists_per_profile: Option<usize>,
    pub whitelisted_profile_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_age_days: Option<i64>,
    pub reconcile_after_days: Option<i64>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub rate_limit_margin_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
