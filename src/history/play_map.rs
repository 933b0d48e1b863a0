use super::{HistoryError, ListeningHistory, PlayEvent};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Lower-cased artist name to the instants it was played.
pub type PlayMap = HashMap<String, Vec<DateTime<Utc>>>;

/// Every play of `user` within the last `lookback_days`, artist names lower-cased.
///
/// A failure on the first page is returned; a failure further in is logged and
/// the plays gathered so far are kept.
pub fn fetch_all_recent_plays(
    history: &dyn ListeningHistory,
    user: &str,
    now: DateTime<Utc>,
    lookback_days: i64,
) -> Result<Vec<PlayEvent>, HistoryError> {
    let since = now - Duration::days(lookback_days);
    let mut events = Vec::new();
    let mut page = 1;

    loop {
        let result = match history.recent_plays(user, page, Some(since)) {
            Ok(result) => result,
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!(
                    "Failed to fetch listening history page {}: {}. Keeping {} plays",
                    page,
                    e,
                    events.len()
                );
                break;
            }
        };
        debug!(
            "Fetched history page {}/{} ({} plays)",
            page,
            result.total_pages,
            result.events.len()
        );

        let fetched = result.events.len();
        events.extend(result.events.into_iter().map(|event| PlayEvent {
            artist: event.artist.to_lowercase(),
            played_at: event.played_at,
        }));

        if fetched == 0 || page >= result.total_pages {
            break;
        }
        page += 1;
    }

    info!("Fetched {} plays for {}", events.len(), user);
    Ok(events)
}

/// Groups play instants by lower-cased artist, dropping plays outside the lookback.
pub fn build_play_map(events: &[PlayEvent], now: DateTime<Utc>, lookback_days: i64) -> PlayMap {
    let cutoff = now - Duration::days(lookback_days);
    let mut map = PlayMap::new();
    for event in events.iter().filter(|e| e.played_at >= cutoff) {
        map.entry(event.artist.to_lowercase())
            .or_default()
            .push(event.played_at);
    }
    map
}
