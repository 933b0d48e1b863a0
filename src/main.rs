use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use playlist_curator::catalog::{CatalogService, DryRunCatalog, SpotifyClient};
use playlist_curator::config;
use playlist_curator::exclusion_store::{
    ExclusionFacts, ExclusionStore, NullExclusionStore, ReadOnlyExclusionStore,
    SqliteExclusionStore,
};
use playlist_curator::history::LastFmClient;
use playlist_curator::retry_policy::RetryPolicy;
use playlist_curator::scraper::{NoOpScraper, PlaylistScraper, ProfilePageScraper};
use playlist_curator::CurationRun;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[command(version = env!("APP_VERSION"))]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite exclusion database.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to the artist registry JSON file.
    #[clap(long, value_parser = parse_path)]
    pub registry_path: Option<PathBuf>,

    /// Destination playlist. Falls back to the PLAYLIST_ID environment variable.
    #[clap(long)]
    pub playlist_id: Option<String>,

    /// Number of tracks to add this run.
    #[clap(long)]
    pub quota: Option<usize>,

    /// Seed for the random number generator, for reproducible runs.
    #[clap(long)]
    pub seed: Option<u64>,

    /// Discover and gate tracks without changing the playlist or the exclusion database.
    #[clap(long)]
    pub dry_run: bool,

    /// Do not evict old tracks at the end of the run.
    #[clap(long)]
    pub skip_sweep: bool,

    /// Do not refresh the artist registry from liked tracks.
    #[clap(long)]
    pub skip_likes_scan: bool,

    /// Profile whose public playlists may be used by the whitelist fill. Repeatable.
    #[clap(long = "whitelist-profile", value_name = "PROFILE_ID")]
    pub whitelist_profiles: Vec<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Convert CLI args and environment secrets to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_path: args.db_path.clone(),
            registry_path: args.registry_path.clone(),
            playlist_id: args.playlist_id.clone().or_else(|| env_var("PLAYLIST_ID")),
            quota: args.quota,
            seed: args.seed,
            dry_run: args.dry_run,
            skip_sweep: args.skip_sweep,
            skip_likes_scan: args.skip_likes_scan,
            whitelisted_profile_ids: args.whitelist_profiles.clone(),
            spotify_client_id: env_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: env_var("SPOTIFY_CLIENT_SECRET"),
            spotify_refresh_token: env_var("SPOTIFY_REFRESH_TOKEN"),
            lastfm_api_key: env_var("LASTFM_API_KEY"),
            lastfm_username: env_var("LASTFM_USERNAME"),
        }
    }
}

fn open_exclusion_store(app_config: &config::AppConfig) -> Arc<dyn ExclusionStore> {
    info!(
        "Opening SQLite exclusion database at {:?}...",
        app_config.db_path
    );
    let store: Arc<dyn ExclusionStore> = match SqliteExclusionStore::new(&app_config.db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                "Exclusion database unavailable ({:#}), continuing without exclusion facts",
                e
            );
            Arc::new(NullExclusionStore)
        }
    };
    if app_config.dry_run {
        Arc::new(ReadOnlyExclusionStore::new(store))
    } else {
        store
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let version = format!("{}-{}", env!("APP_VERSION"), env!("GIT_HASH"));
    info!("Playlist curator {}", version);

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;
    info!("Configuration:");
    info!("  playlist_id: {}", app_config.playlist_id);
    info!("  db_path: {:?}", app_config.db_path);
    info!("  registry_path: {:?}", app_config.registry_path);
    info!("  quota: {}", app_config.selection.quota);
    info!("  dry_run: {}", app_config.dry_run);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            warn!("Stop requested, finishing the current draw...");
            stop.store(true, Ordering::SeqCst);
        })
        .context("Failed to install the Ctrl-C handler")?;
    }

    let user_agent = format!("playlist-curator/{}", version);
    let retry_policy = RetryPolicy::new(&app_config.retry);

    let spotify: Arc<dyn CatalogService> = Arc::new(SpotifyClient::new(
        &app_config.spotify,
        retry_policy.clone(),
        &user_agent,
    )?);
    let catalog: Arc<dyn CatalogService> = if app_config.dry_run {
        info!("Dry run: playlist changes will be logged, not applied");
        Arc::new(DryRunCatalog::new(spotify))
    } else {
        spotify
    };
    let history = LastFmClient::new(&app_config.lastfm, retry_policy)?;
    let scraper: Box<dyn PlaylistScraper> = if app_config.scraper.enabled {
        Box::new(ProfilePageScraper::new(
            app_config.scraper.clone(),
            &user_agent,
        ))
    } else {
        info!("Profile page scraping disabled");
        Box::new(NoOpScraper)
    };
    let facts = ExclusionFacts::new(open_exclusion_store(&app_config));

    let mut rng = match app_config.selection.seed {
        Some(seed) => {
            info!("Using seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };

    let run = CurationRun {
        config: &app_config,
        catalog: catalog.as_ref(),
        history: &history,
        scraper,
        facts,
        stop: stop.as_ref(),
    };
    let summary = run.execute(Utc::now(), &mut rng)?;

    println!("{}", summary);
    Ok(())
}
