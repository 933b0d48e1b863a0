//! Spotify Web API client.
//!
//! Authenticates with a long-lived refresh token, paces its own requests and
//! retries rate-limited or transient failures according to a [`RetryPolicy`].

use super::{
    Artist, CatalogError, CatalogService, Page, PlaylistItem, PlaylistSummary, Track, TrackArtist,
};
use crate::config::SpotifySettings;
use crate::retry_policy::RetryPolicy;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
/// Tracks per add/remove request.
const WRITE_BATCH_SIZE: usize = 100;
/// Refresh the access token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token: Mutex<Option<AccessToken>>,
    last_request: Mutex<Instant>,
    min_request_interval: Duration,
    retry_policy: RetryPolicy,
}

// Wire types. Every field is optional: the API omits or nulls fields freely,
// and one malformed item must not fail a whole page.

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct ApiFollowers {
    total: Option<u64>,
}

#[derive(Deserialize)]
struct ApiArtist {
    id: Option<String>,
    name: Option<String>,
    followers: Option<ApiFollowers>,
}

#[derive(Deserialize)]
struct ApiSimpleArtist {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ApiSimpleArtist>,
}

#[derive(Deserialize)]
struct ApiPlaylistItem {
    added_at: Option<String>,
    track: Option<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiOwner {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ApiPlaylist {
    id: Option<String>,
    name: Option<String>,
    owner: Option<ApiOwner>,
}

#[derive(Deserialize)]
struct ApiPaging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
    total: Option<usize>,
}

#[derive(Deserialize)]
struct ArtistSearchResponse {
    artists: Option<ApiPaging<ApiArtist>>,
}

#[derive(Deserialize)]
struct PlaylistSearchResponse {
    playlists: Option<ApiPaging<ApiPlaylist>>,
}

#[derive(Deserialize)]
struct TopTracksResponse {
    #[serde(default)]
    tracks: Vec<ApiTrack>,
}

#[derive(Deserialize)]
struct RelatedArtistsResponse {
    #[serde(default)]
    artists: Vec<ApiArtist>,
}

impl ApiArtist {
    fn into_artist(self) -> Option<Artist> {
        Some(Artist {
            id: self.id?,
            name: self.name.unwrap_or_default(),
            followers: self.followers.and_then(|f| f.total),
        })
    }
}

impl ApiTrack {
    fn into_track(self) -> Track {
        Track {
            id: self.id.filter(|id| !id.is_empty()),
            name: self.name.unwrap_or_default(),
            artists: self
                .artists
                .into_iter()
                .filter_map(|a| {
                    Some(TrackArtist {
                        id: a.id,
                        name: a.name?,
                    })
                })
                .collect(),
        }
    }
}

impl ApiPlaylist {
    fn into_summary(self) -> Option<PlaylistSummary> {
        Some(PlaylistSummary {
            id: self.id?,
            name: self.name.unwrap_or_default(),
            owner_id: self.owner.and_then(|o| o.id),
        })
    }
}

fn playlist_page(paging: ApiPaging<ApiPlaylistItem>) -> Page<PlaylistItem> {
    let fetched = paging.items.len();
    let items: Vec<PlaylistItem> = paging
        .items
        .into_iter()
        .flatten()
        .map(|item| PlaylistItem {
            track: item.track.map(ApiTrack::into_track),
            added_at: item.added_at,
        })
        .collect();
    Page {
        total: paging.total.unwrap_or(fetched),
        items,
        fetched,
    }
}

fn summary_page(paging: ApiPaging<ApiPlaylist>) -> Page<PlaylistSummary> {
    let fetched = paging.items.len();
    let items: Vec<PlaylistSummary> = paging
        .items
        .into_iter()
        .flatten()
        .filter_map(ApiPlaylist::into_summary)
        .collect();
    Page {
        total: paging.total.unwrap_or(fetched),
        items,
        fetched,
    }
}

fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

impl SpotifyClient {
    pub fn new(
        settings: &SpotifySettings,
        retry_policy: RetryPolicy,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let min_request_interval = Duration::from_millis(settings.min_request_interval_ms);

        Ok(Self {
            client,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            refresh_token: settings.refresh_token.clone(),
            token: Mutex::new(None),
            last_request: Mutex::new(Instant::now() - min_request_interval),
            min_request_interval,
            retry_policy,
        })
    }

    fn rate_limit(&self) {
        let mut last = lock(&self.last_request);
        let elapsed = last.elapsed();
        if elapsed < self.min_request_interval {
            std::thread::sleep(self.min_request_interval - elapsed);
        }
        *last = Instant::now();
    }

    fn refresh_access_token(&self) -> Result<AccessToken, CatalogError> {
        debug!("Refreshing Spotify access token");
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .client
            .post(SPOTIFY_TOKEN_URL)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        if let Some(err) = CatalogError::from_status(status, None, &body) {
            return Err(err);
        }
        let token: TokenResponse = serde_json::from_str(&body)?;
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    /// A valid access token, refreshed when missing, expiring or `force`d.
    fn access_token(&self, force: bool) -> Result<String, CatalogError> {
        let mut guard = lock(&self.token);
        let needs_refresh = force
            || match guard.as_ref() {
                Some(token) => token.expires_at <= Instant::now() + TOKEN_EXPIRY_MARGIN,
                None => true,
            };
        if needs_refresh {
            *guard = Some(self.refresh_access_token()?);
        }
        Ok(guard
            .as_ref()
            .map(|token| token.value.clone())
            .unwrap_or_default())
    }

    /// One HTTP exchange; a 401 triggers a single token refresh and resend.
    fn send_once(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String, CatalogError> {
        let url = format!("{}{}", SPOTIFY_API_BASE, path);
        let mut force_refresh = false;
        loop {
            let token = self.access_token(force_refresh)?;
            self.rate_limit();

            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send()?;

            let status = response.status().as_u16();
            if status == 401 && !force_refresh {
                force_refresh = true;
                continue;
            }
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text()?;
            return match CatalogError::from_status(status, retry_after, &text) {
                Some(err) => Err(err),
                None => Ok(text),
            };
        }
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String, CatalogError> {
        let what = format!("{} {}", method, path);
        self.retry_policy
            .run(&what, || self.send_once(&method, path, query, body))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let text = self.send(Method::GET, path, query, None)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn paging_query(limit: usize, offset: usize) -> Vec<(&'static str, String)> {
    vec![("limit", limit.to_string()), ("offset", offset.to_string())]
}

impl CatalogService for SpotifyClient {
    fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<Artist>, CatalogError> {
        let response: ArtistSearchResponse = self.get_json(
            "/search",
            &[
                ("q", query.to_string()),
                ("type", "artist".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        Ok(response
            .artists
            .map(|paging| {
                paging
                    .items
                    .into_iter()
                    .flatten()
                    .filter_map(ApiArtist::into_artist)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn search_playlists(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError> {
        let mut params = vec![("q", query.to_string()), ("type", "playlist".to_string())];
        params.extend(paging_query(limit, offset));
        let response: PlaylistSearchResponse = self.get_json("/search", &params)?;
        Ok(response
            .playlists
            .map(summary_page)
            .unwrap_or_else(Page::empty))
    }

    fn playlist_items(
        &self,
        playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, CatalogError> {
        let paging: ApiPaging<ApiPlaylistItem> = self.get_json(
            &format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)),
            &paging_query(limit, offset),
        )?;
        Ok(playlist_page(paging))
    }

    fn artist(&self, artist_id: &str) -> Result<Artist, CatalogError> {
        let artist: ApiArtist =
            self.get_json(&format!("/artists/{}", urlencoding::encode(artist_id)), &[])?;
        artist
            .into_artist()
            .ok_or_else(|| CatalogError::Decode(format!("artist {} has no id", artist_id)))
    }

    fn artist_top_tracks(
        &self,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>, CatalogError> {
        let response: TopTracksResponse = self.get_json(
            &format!("/artists/{}/top-tracks", urlencoding::encode(artist_id)),
            &[("market", market.to_string())],
        )?;
        Ok(response
            .tracks
            .into_iter()
            .map(ApiTrack::into_track)
            .collect())
    }

    fn related_artists(&self, artist_id: &str) -> Result<Vec<Artist>, CatalogError> {
        let response: RelatedArtistsResponse = self.get_json(
            &format!("/artists/{}/related-artists", urlencoding::encode(artist_id)),
            &[],
        )?;
        Ok(response
            .artists
            .into_iter()
            .filter_map(ApiArtist::into_artist)
            .collect())
    }

    fn add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<(), CatalogError> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        for chunk in track_ids.chunks(WRITE_BATCH_SIZE) {
            let uris: Vec<String> = chunk.iter().map(|id| track_uri(id)).collect();
            self.send(Method::POST, &path, &[], Some(&json!({ "uris": uris })))?;
        }
        Ok(())
    }

    fn remove_all_occurrences(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), CatalogError> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        for chunk in track_ids.chunks(WRITE_BATCH_SIZE) {
            let tracks: Vec<serde_json::Value> = chunk
                .iter()
                .map(|id| json!({ "uri": track_uri(id) }))
                .collect();
            self.send(Method::DELETE, &path, &[], Some(&json!({ "tracks": tracks })))?;
        }
        Ok(())
    }

    fn saved_tracks(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, CatalogError> {
        let paging: ApiPaging<ApiPlaylistItem> =
            self.get_json("/me/tracks", &paging_query(limit, offset))?;
        Ok(playlist_page(paging))
    }

    fn user_playlists(
        &self,
        profile_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistSummary>, CatalogError> {
        let paging: ApiPaging<ApiPlaylist> = self.get_json(
            &format!("/users/{}/playlists", urlencoding::encode(profile_id)),
            &paging_query(limit, offset),
        )?;
        Ok(summary_page(paging))
    }
}
