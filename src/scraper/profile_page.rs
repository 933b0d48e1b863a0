use super::{PlaylistRef, PlaylistScraper};
use crate::config::ScraperSettings;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::blocking::Client;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

lazy_static! {
    static ref PLAYLIST_ANCHOR: Regex = Regex::new(
        r#"(?s)<a\b[^>]*href="(?:https://open\.spotify\.com)?/playlist/([A-Za-z0-9]+)[^"]*"[^>]*>(.*?)</a>"#
    )
    .expect("Invalid playlist anchor regex");
    static ref PLAYLIST_LINK: Regex =
        Regex::new(r#"/playlist/([A-Za-z0-9]{22})"#).expect("Invalid playlist link regex");
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").expect("Invalid tag regex");
}

/// Page-fetch session, opened on first use and closed when dropped.
struct ScraperSession {
    client: Client,
    opened_at: Instant,
    pages_fetched: usize,
}

impl Drop for ScraperSession {
    fn drop(&mut self) {
        info!(
            "Closing scraper session after {} page(s) in {:?}",
            self.pages_fetched,
            self.opened_at.elapsed()
        );
    }
}

/// Scrapes `<base_url>/artist/<id>/playlists` for playlist links.
///
/// The page renders client-side, so an empty result is re-polled a bounded
/// number of times before giving up.
pub struct ProfilePageScraper {
    settings: ScraperSettings,
    user_agent: String,
    session: Mutex<Option<ScraperSession>>,
    /// Set once opening the session failed, so it is not retried every artist.
    unavailable: Mutex<bool>,
}

impl ProfilePageScraper {
    pub fn new(settings: ScraperSettings, user_agent: &str) -> Self {
        Self {
            settings,
            user_agent: user_agent.to_string(),
            session: Mutex::new(None),
            unavailable: Mutex::new(false),
        }
    }

    fn open_session(&self) -> Option<ScraperSession> {
        match Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .build()
        {
            Ok(client) => {
                info!("Opened scraper session");
                Some(ScraperSession {
                    client,
                    opened_at: Instant::now(),
                    pages_fetched: 0,
                })
            }
            Err(e) => {
                warn!("Could not open scraper session: {}", e);
                None
            }
        }
    }

    fn fetch_page(&self, url: &str) -> Option<String> {
        let mut unavailable = self
            .unavailable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *unavailable {
            return None;
        }
        let mut guard = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            *guard = self.open_session();
            if guard.is_none() {
                *unavailable = true;
                return None;
            }
        }
        let session = guard.as_mut()?;
        session.pages_fetched += 1;

        let response = match session.client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                debug!("Fetching {} failed: {}", url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("Fetching {} returned {}", url, response.status());
            return None;
        }
        response.text().ok()
    }
}

impl PlaylistScraper for ProfilePageScraper {
    fn artist_playlists(&self, artist_id: &str) -> Vec<PlaylistRef> {
        let url = format!(
            "{}/artist/{}/playlists",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(artist_id)
        );

        for attempt in 1..=self.settings.max_poll_attempts.max(1) {
            if attempt > 1 {
                std::thread::sleep(Duration::from_millis(self.settings.poll_interval_ms));
            }
            if let Some(html) = self.fetch_page(&url) {
                let refs = extract_playlist_refs(&html);
                if !refs.is_empty() {
                    debug!("Scraped {} playlist(s) for artist {}", refs.len(), artist_id);
                    return refs;
                }
            }
        }
        debug!("No playlists scraped for artist {}", artist_id);
        vec![]
    }
}

/// Playlist references in page order, deduplicated by id.
///
/// Anchors provide names; bare links found elsewhere in the page (inline
/// JSON state) get an empty name.
pub fn extract_playlist_refs(html: &str) -> Vec<PlaylistRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for caps in PLAYLIST_ANCHOR.captures_iter(html) {
        let id = caps[1].to_string();
        if seen.insert(id.clone()) {
            let name = HTML_TAG.replace_all(&caps[2], "").trim().to_string();
            refs.push(PlaylistRef { name, id });
        }
    }
    for caps in PLAYLIST_LINK.captures_iter(html) {
        let id = caps[1].to_string();
        if seen.insert(id.clone()) {
            refs.push(PlaylistRef {
                name: String::new(),
                id,
            });
        }
    }
    refs
}
