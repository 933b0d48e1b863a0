mod file_config;

pub use file_config::{
    FileConfig, LastFmConfig, RetentionConfig, RetryConfig, ScraperConfig, SelectionConfig,
    SpotifyConfig,
};

use anyhow::{bail, Result};
use std::path::PathBuf;

const DEFAULT_DB_FILE: &str = "curator.db";
const DEFAULT_REGISTRY_FILE: &str = "artists.json";

/// CLI arguments and environment secrets that can be used for config resolution.
/// TOML values override these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub playlist_id: Option<String>,
    pub quota: Option<usize>,
    pub seed: Option<u64>,
    pub dry_run: bool,
    pub skip_sweep: bool,
    pub skip_likes_scan: bool,
    pub whitelisted_profile_ids: Vec<String>,

    // Secrets, usually read from the environment
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_refresh_token: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub lastfm_username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub registry_path: PathBuf,
    /// Destination playlist that receives new tracks and gets swept.
    pub playlist_id: String,
    pub dry_run: bool,
    pub skip_sweep: bool,
    pub skip_likes_scan: bool,
    /// Profiles added to the whitelist before the run.
    pub whitelisted_profile_ids: Vec<String>,

    pub spotify: SpotifySettings,
    pub lastfm: LastFmSettings,
    pub scraper: ScraperSettings,
    pub selection: SelectionSettings,
    pub retention: RetentionSettings,
    pub retry: RetrySettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
        let registry_path = file
            .registry_path
            .map(PathBuf::from)
            .or_else(|| cli.registry_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_FILE));

        let playlist_id = file
            .playlist_id
            .or_else(|| cli.playlist_id.clone())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "playlist_id must be specified via --playlist-id, PLAYLIST_ID or in config file"
                )
            })?;

        let dry_run = file.dry_run.unwrap_or(cli.dry_run);

        let spotify_file = file.spotify.unwrap_or_default();
        let spotify_defaults = SpotifySettings::default();
        let spotify = SpotifySettings {
            client_id: required(
                spotify_file.client_id.or_else(|| cli.spotify_client_id.clone()),
                "spotify client_id (SPOTIFY_CLIENT_ID)",
            )?,
            client_secret: required(
                spotify_file
                    .client_secret
                    .or_else(|| cli.spotify_client_secret.clone()),
                "spotify client_secret (SPOTIFY_CLIENT_SECRET)",
            )?,
            refresh_token: required(
                spotify_file
                    .refresh_token
                    .or_else(|| cli.spotify_refresh_token.clone()),
                "spotify refresh_token (SPOTIFY_REFRESH_TOKEN)",
            )?,
            market: spotify_file.market.unwrap_or(spotify_defaults.market),
            min_request_interval_ms: spotify_file
                .min_request_interval_ms
                .unwrap_or(spotify_defaults.min_request_interval_ms),
            timeout_secs: spotify_file
                .timeout_secs
                .unwrap_or(spotify_defaults.timeout_secs),
        };

        let lastfm_file = file.lastfm.unwrap_or_default();
        let lastfm = LastFmSettings {
            api_key: required(
                lastfm_file.api_key.or_else(|| cli.lastfm_api_key.clone()),
                "lastfm api_key (LASTFM_API_KEY)",
            )?,
            username: required(
                lastfm_file.username.or_else(|| cli.lastfm_username.clone()),
                "lastfm username (LASTFM_USERNAME)",
            )?,
            min_request_interval_ms: lastfm_file
                .min_request_interval_ms
                .unwrap_or(LastFmSettings::DEFAULT_MIN_REQUEST_INTERVAL_MS),
        };

        let scraper_file = file.scraper.unwrap_or_default();
        let scraper_defaults = ScraperSettings::default();
        let scraper = ScraperSettings {
            enabled: scraper_file.enabled.unwrap_or(scraper_defaults.enabled),
            base_url: scraper_file.base_url.unwrap_or(scraper_defaults.base_url),
            timeout_secs: scraper_file
                .timeout_secs
                .unwrap_or(scraper_defaults.timeout_secs),
            max_poll_attempts: scraper_file
                .max_poll_attempts
                .unwrap_or(scraper_defaults.max_poll_attempts),
            poll_interval_ms: scraper_file
                .poll_interval_ms
                .unwrap_or(scraper_defaults.poll_interval_ms),
        };

        let sel = file.selection.unwrap_or_default();
        let d = SelectionSettings::default();
        let selection = SelectionSettings {
            quota: sel.quota.or(cli.quota).unwrap_or(d.quota),
            seed: sel.seed.or(cli.seed),
            lookback_days: sel.lookback_days.unwrap_or(d.lookback_days),
            artist_playlist_ceiling: sel
                .artist_playlist_ceiling
                .unwrap_or(d.artist_playlist_ceiling),
            follower_ceiling: sel.follower_ceiling.unwrap_or(d.follower_ceiling),
            artist_playlist_cap: sel.artist_playlist_cap.unwrap_or(d.artist_playlist_cap),
            artist_playlist_max_artist_tracks: sel
                .artist_playlist_max_artist_tracks
                .unwrap_or(d.artist_playlist_max_artist_tracks),
            searched_playlist_cap: sel.searched_playlist_cap.unwrap_or(d.searched_playlist_cap),
            searched_playlist_max_artist_tracks: sel
                .searched_playlist_max_artist_tracks
                .unwrap_or(d.searched_playlist_max_artist_tracks),
            search_pages: sel.search_pages.unwrap_or(d.search_pages),
            similar_artist_cap: sel.similar_artist_cap.unwrap_or(d.similar_artist_cap),
            related_artist_cap: sel.related_artist_cap.unwrap_or(d.related_artist_cap),
            draw_attempts: sel.draw_attempts.unwrap_or(d.draw_attempts),
            max_consecutive_rejections: sel
                .max_consecutive_rejections
                .unwrap_or(d.max_consecutive_rejections),
            artist_blacklist_threshold: sel
                .artist_blacklist_threshold
                .unwrap_or(d.artist_blacklist_threshold),
            registry_like_threshold: sel
                .registry_like_threshold
                .unwrap_or(d.registry_like_threshold),
            whitelist_fill: sel.whitelist_fill.unwrap_or(d.whitelist_fill),
            whitelist_profiles: sel.whitelist_profiles.unwrap_or(d.whitelist_profiles),
            whitelist_playlists_per_profile: sel
                .whitelist_playlists_per_profile
                .unwrap_or(d.whitelist_playlists_per_profile),
        };

        if selection.draw_attempts == 0 {
            bail!("selection.draw_attempts must be at least 1");
        }
        if selection.max_consecutive_rejections == 0 {
            bail!("selection.max_consecutive_rejections must be at least 1");
        }
        if selection.lookback_days <= 0 {
            bail!("selection.lookback_days must be positive");
        }

        let whitelisted_profile_ids: Vec<String> = sel
            .whitelisted_profile_ids
            .unwrap_or_else(|| cli.whitelisted_profile_ids.clone())
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let ret = file.retention.unwrap_or_default();
        let rd = RetentionSettings::default();
        let retention = RetentionSettings {
            max_age_days: ret.max_age_days.unwrap_or(rd.max_age_days),
            reconcile_after_days: ret.reconcile_after_days.unwrap_or(rd.reconcile_after_days),
            batch_size: ret.batch_size.unwrap_or(rd.batch_size),
        };
        if retention.max_age_days < 0 {
            bail!("retention.max_age_days must not be negative");
        }
        if retention.batch_size == 0 || retention.batch_size > 100 {
            bail!("retention.batch_size must be between 1 and 100");
        }

        let retry_file = file.retry.unwrap_or_default();
        let rt = RetrySettings::default();
        let retry = RetrySettings {
            max_retries: retry_file.max_retries.unwrap_or(rt.max_retries),
            initial_backoff_secs: retry_file
                .initial_backoff_secs
                .unwrap_or(rt.initial_backoff_secs),
            max_backoff_secs: retry_file.max_backoff_secs.unwrap_or(rt.max_backoff_secs),
            backoff_multiplier: retry_file
                .backoff_multiplier
                .unwrap_or(rt.backoff_multiplier),
            rate_limit_margin_secs: retry_file
                .rate_limit_margin_secs
                .unwrap_or(rt.rate_limit_margin_secs),
        };
        if retry.backoff_multiplier < 1.0 {
            bail!("retry.backoff_multiplier must be >= 1.0");
        }

        Ok(Self {
            db_path,
            registry_path,
            playlist_id,
            dry_run,
            skip_sweep: cli.skip_sweep,
            skip_likes_scan: cli.skip_likes_scan,
            whitelisted_profile_ids,
            spotify,
            lastfm,
            scraper,
            selection,
            retention,
            retry,
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("Missing {}: set it in the environment or in the config file", what),
    }
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Market used for artist top tracks.
    pub market: String,
    pub min_request_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            market: "US".to_string(),
            min_request_interval_ms: 500,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LastFmSettings {
    pub api_key: String,
    pub username: String,
    pub min_request_interval_ms: u64,
}

impl LastFmSettings {
    // Last.fm allows 5 requests per second
    const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 200;
}

#[derive(Debug, Clone)]
pub struct ScraperSettings {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Page fetches per artist before giving up.
    pub max_poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://open.spotify.com".to_string(),
            timeout_secs: 20,
            max_poll_attempts: 3,
            poll_interval_ms: 1500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionSettings {
    pub quota: usize,
    pub seed: Option<u64>,
    pub lookback_days: i64,
    /// Follower ceiling for tracks drawn from artist-made playlists.
    pub artist_playlist_ceiling: u64,
    /// Follower ceiling for every other source.
    pub follower_ceiling: u64,
    pub artist_playlist_cap: usize,
    pub artist_playlist_max_artist_tracks: usize,
    pub searched_playlist_cap: usize,
    pub searched_playlist_max_artist_tracks: usize,
    pub search_pages: usize,
    pub similar_artist_cap: usize,
    pub related_artist_cap: usize,
    pub draw_attempts: usize,
    pub max_consecutive_rejections: usize,
    pub artist_blacklist_threshold: usize,
    pub registry_like_threshold: u32,
    pub whitelist_fill: bool,
    pub whitelist_profiles: usize,
    pub whitelist_playlists_per_profile: usize,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            quota: 50,
            seed: None,
            lookback_days: 365,
            artist_playlist_ceiling: 80_000,
            follower_ceiling: 50_000,
            artist_playlist_cap: 2,
            artist_playlist_max_artist_tracks: 5,
            searched_playlist_cap: 10,
            searched_playlist_max_artist_tracks: 10,
            search_pages: 4,
            similar_artist_cap: 10,
            related_artist_cap: 10,
            draw_attempts: 20,
            max_consecutive_rejections: 5,
            artist_blacklist_threshold: 3,
            registry_like_threshold: 3,
            whitelist_fill: false,
            whitelist_profiles: 3,
            whitelist_playlists_per_profile: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionSettings {
    pub max_age_days: i64,
    /// Unfixed blacklist facts older than this are reconciled against the playlist.
    pub reconcile_after_days: i64,
    pub batch_size: usize,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_age_days: 8,
            reconcile_after_days: 14,
            batch_size: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_multiplier: f64,
    /// Added on top of the server-provided Retry-After delay.
    pub rate_limit_margin_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff_secs: 1,
            max_backoff_secs: 60,
            backoff_multiplier: 2.0,
            rate_limit_margin_secs: 1,
        }
    }
}
