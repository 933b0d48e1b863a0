use crate::history::PlayMap;
use crate::registry::ArtistRegistry;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Artist id to lottery weight. Ordered so seeded draws are reproducible.
pub type Weights = BTreeMap<String, f64>;

const LONG_WINDOW_DAYS: i64 = 60;
const SHORT_WINDOW_DAYS: i64 = 14;
const LONG_WINDOW_POINTS: f64 = 60.0;
const SHORT_WINDOW_POINTS: f64 = 10.0;
const LOYALTY_BONUS: f64 = 5.0;
const LOYALTY_MIN_LIKES: u32 = 6;

/// Scores every registry artist with at least one play in `play_map`.
///
/// Play counts in the last 60 and 14 days are normalized against the busiest
/// artist of each window. Artists with more than six liked tracks get a small
/// bonus. Registry and history are matched by lower-cased name.
pub fn compute_weights(
    registry: &ArtistRegistry,
    play_map: &PlayMap,
    now: DateTime<Utc>,
) -> Weights {
    let long_cutoff = now - Duration::days(LONG_WINDOW_DAYS);
    let short_cutoff = now - Duration::days(SHORT_WINDOW_DAYS);

    let counts: Vec<(&String, u32, usize, usize)> = registry
        .iter()
        .filter_map(|(artist_id, record)| {
            let plays = play_map.get(&record.name.to_lowercase())?;
            if plays.is_empty() {
                return None;
            }
            let recent60 = plays.iter().filter(|t| **t >= long_cutoff).count();
            let recent14 = plays.iter().filter(|t| **t >= short_cutoff).count();
            Some((artist_id, record.total_liked, recent60, recent14))
        })
        .collect();

    let max60 = counts.iter().map(|c| c.2).max().unwrap_or(0).max(1) as f64;
    let max14 = counts.iter().map(|c| c.3).max().unwrap_or(0).max(1) as f64;

    counts
        .into_iter()
        .map(|(artist_id, total_liked, recent60, recent14)| {
            let bonus = if total_liked > LOYALTY_MIN_LIKES {
                LOYALTY_BONUS
            } else {
                0.0
            };
            let score = recent60 as f64 / max60 * LONG_WINDOW_POINTS
                + recent14 as f64 / max14 * SHORT_WINDOW_POINTS
                + bonus;
            (artist_id.clone(), score)
        })
        .collect()
}
