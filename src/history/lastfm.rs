//! Last.fm API client for recent plays and similar artists.
//!
//! Rate limited to 5 requests per second per Last.fm API guidelines.

use super::{HistoryError, ListeningHistory, PlayEvent, RecentPlaysPage};
use crate::config::LastFmSettings;
use crate::retry_policy::RetryPolicy;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
/// Plays per page of `user.getrecenttracks`, the API maximum.
const RECENT_TRACKS_PAGE_SIZE: u32 = 200;

pub struct LastFmClient {
    client: Client,
    api_key: String,
    last_request: Mutex<Instant>,
    min_request_interval: Duration,
    retry_policy: RetryPolicy,
}

/// Last.fm collapses single-element lists into a bare object.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<i64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct RecentTracksResponse {
    recenttracks: Option<RecentTracksContainer>,
}

#[derive(Deserialize)]
struct RecentTracksContainer {
    track: Option<OneOrMany<LastFmTrack>>,
    #[serde(rename = "@attr")]
    attr: Option<RecentTracksAttr>,
}

#[derive(Deserialize)]
struct RecentTracksAttr {
    #[serde(rename = "totalPages")]
    total_pages: Option<String>,
}

#[derive(Deserialize)]
struct LastFmTrack {
    artist: Option<LastFmTextField>,
    date: Option<LastFmDate>,
    #[serde(rename = "@attr")]
    attr: Option<LastFmTrackAttr>,
}

#[derive(Deserialize)]
struct LastFmTextField {
    #[serde(rename = "#text")]
    text: Option<String>,
}

#[derive(Deserialize)]
struct LastFmDate {
    uts: Option<String>,
}

#[derive(Deserialize)]
struct LastFmTrackAttr {
    nowplaying: Option<String>,
}

#[derive(Deserialize)]
struct SimilarArtistsResponse {
    similarartists: Option<SimilarArtistsContainer>,
}

#[derive(Deserialize)]
struct SimilarArtistsContainer {
    artist: Option<OneOrMany<LastFmArtist>>,
}

#[derive(Deserialize)]
struct LastFmArtist {
    name: Option<String>,
}

fn error_from_code(code: i64, message: String) -> HistoryError {
    match code {
        29 => HistoryError::RateLimited,
        8 | 11 | 16 => HistoryError::Transient(message),
        6 => HistoryError::NotFound(message),
        _ => HistoryError::Api { code, message },
    }
}

/// Decodes a response body, surfacing API-level errors first.
fn parse_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, HistoryError> {
    if let Ok(ErrorResponse {
        error: Some(code),
        message,
    }) = serde_json::from_str::<ErrorResponse>(body)
    {
        return Err(error_from_code(code, message.unwrap_or_default()));
    }
    match status {
        200..=299 => Ok(serde_json::from_str(body)?),
        429 => Err(HistoryError::RateLimited),
        500..=599 => Err(HistoryError::Transient(format!("status {}", status))),
        _ => Err(HistoryError::Api {
            code: status as i64,
            message: format!("HTTP status {}", status),
        }),
    }
}

fn parse_recent_tracks(response: RecentTracksResponse) -> RecentPlaysPage {
    let Some(container) = response.recenttracks else {
        return RecentPlaysPage {
            events: vec![],
            total_pages: 0,
        };
    };

    let total_pages = container
        .attr
        .and_then(|a| a.total_pages)
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);

    let events = container
        .track
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter(|t| {
            !t.attr
                .as_ref()
                .and_then(|a| a.nowplaying.as_deref())
                .is_some_and(|v| v == "true")
        })
        .filter_map(|t| {
            let artist = t.artist?.text.filter(|name| !name.is_empty())?;
            let uts: i64 = t.date?.uts?.parse().ok()?;
            let played_at = Utc.timestamp_opt(uts, 0).single()?;
            Some(PlayEvent { artist, played_at })
        })
        .collect();

    RecentPlaysPage {
        events,
        total_pages,
    }
}

impl LastFmClient {
    pub fn new(settings: &LastFmSettings, retry_policy: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let min_request_interval = Duration::from_millis(settings.min_request_interval_ms);

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            last_request: Mutex::new(Instant::now() - min_request_interval),
            min_request_interval,
            retry_policy,
        })
    }

    fn rate_limit(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let elapsed = last.elapsed();
        if elapsed < self.min_request_interval {
            std::thread::sleep(self.min_request_interval - elapsed);
        }
        *last = Instant::now();
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, HistoryError> {
        self.retry_policy.run(method, || {
            self.rate_limit();
            let response = self
                .client
                .get(LASTFM_API_BASE)
                .query(&[
                    ("method", method),
                    ("api_key", self.api_key.as_str()),
                    ("format", "json"),
                ])
                .query(params)
                .send()?;
            let status = response.status().as_u16();
            let body = response.text()?;
            parse_body(status, &body)
        })
    }
}

impl ListeningHistory for LastFmClient {
    fn recent_plays(
        &self,
        user: &str,
        page: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<RecentPlaysPage, HistoryError> {
        let mut params = vec![
            ("user", user.to_string()),
            ("limit", RECENT_TRACKS_PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(since) = since {
            params.push(("from", since.timestamp().to_string()));
        }
        let response: RecentTracksResponse = self.call("user.getrecenttracks", &params)?;
        Ok(parse_recent_tracks(response))
    }

    fn similar_artists(
        &self,
        artist_name: &str,
        limit: usize,
    ) -> Result<Vec<String>, HistoryError> {
        let response: SimilarArtistsResponse = self.call(
            "artist.getsimilar",
            &[
                ("artist", artist_name.to_string()),
                ("autocorrect", "1".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;

        Ok(response
            .similarartists
            .and_then(|sa| sa.artist)
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name.filter(|n| !n.is_empty()))
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recent_tracks_skips_now_playing() {
        let body = r##"{"recenttracks": {
            "track": [
                {"artist": {"#text": "Live Act"}, "name": "Now",
                 "@attr": {"nowplaying": "true"}},
                {"artist": {"#text": "Alpha", "mbid": ""}, "name": "One",
                 "date": {"uts": "1700000000", "#text": "14 Nov 2023"}},
                {"artist": {"#text": "Beta"}, "name": "Undated"}
            ],
            "@attr": {"page": "1", "totalPages": "3", "total": "401"}
        }}"##;
        let response: RecentTracksResponse = parse_body(200, body).unwrap();
        let page = parse_recent_tracks(response);

        assert_eq!(page.total_pages, 3);
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].artist, "Alpha");
        assert_eq!(page.events[0].played_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_recent_tracks_single_object() {
        let body = r##"{"recenttracks": {
            "track": {"artist": {"#text": "Solo"}, "date": {"uts": "1700000100"}},
            "@attr": {"totalPages": "1"}
        }}"##;
        let response: RecentTracksResponse = parse_body(200, body).unwrap();
        let page = parse_recent_tracks(response);
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].artist, "Solo");
    }

    #[test]
    fn test_api_errors_are_classified() {
        let rate_limited = parse_body::<RecentTracksResponse>(
            200,
            r#"{"error": 29, "message": "Rate Limit Exceeded"}"#,
        );
        assert!(matches!(rate_limited, Err(HistoryError::RateLimited)));

        let missing_user = parse_body::<RecentTracksResponse>(
            400,
            r#"{"error": 6, "message": "User not found"}"#,
        );
        assert!(matches!(missing_user, Err(HistoryError::NotFound(_))));

        let offline = parse_body::<RecentTracksResponse>(503, "<html>down</html>");
        assert!(matches!(offline, Err(HistoryError::Transient(_))));
    }

    #[test]
    fn test_parse_similar_artists() {
        let body = r#"{"similarartists": {"artist": [
            {"name": "Gamma", "match": "1"},
            {"name": "", "match": "0.5"},
            {"name": "Delta", "match": "0.4"}
        ]}}"#;
        let response: SimilarArtistsResponse = parse_body(200, body).unwrap();
        let names: Vec<String> = response
            .similarartists
            .and_then(|sa| sa.artist)
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name.filter(|n| !n.is_empty()))
            .collect();
        assert_eq!(names, vec!["Gamma", "Delta"]);
    }
}
