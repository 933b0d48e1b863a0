use super::{Admission, DiscoveryCascade, TrackCandidate, Weights};
use crate::registry::ArtistRegistry;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Samples one artist not in `drawn`, proportionally to its weight.
///
/// Artists with a zero weight are never returned. `None` once nothing is left.
pub fn draw_artist<R: Rng + ?Sized>(
    weights: &Weights,
    drawn: &HashSet<String>,
    rng: &mut R,
) -> Option<String> {
    let (ids, pool): (Vec<&String>, Vec<f64>) = weights
        .iter()
        .filter(|(id, weight)| **weight > 0.0 && !drawn.contains(*id))
        .map(|(id, weight)| (id, *weight))
        .unzip();
    if ids.is_empty() {
        return None;
    }
    let dist = WeightedIndex::new(&pool).ok()?;
    Some(ids[dist.sample(rng)].clone())
}

#[derive(Debug, Default)]
pub struct LotteryOutcome {
    pub added: Vec<TrackCandidate>,
    /// Artist ids in draw order.
    pub drawn: Vec<String>,
    pub stopped: bool,
}

/// Draws artists until the quota is met or every artist has been drawn.
pub struct LotteryDriver<'a> {
    cascade: &'a DiscoveryCascade<'a>,
    admission: &'a Admission<'a>,
    registry: &'a ArtistRegistry,
    stop: &'a AtomicBool,
}

impl<'a> LotteryDriver<'a> {
    pub fn new(
        cascade: &'a DiscoveryCascade<'a>,
        admission: &'a Admission<'a>,
        registry: &'a ArtistRegistry,
        stop: &'a AtomicBool,
    ) -> Self {
        Self {
            cascade,
            admission,
            registry,
            stop,
        }
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        weights: &Weights,
        quota: usize,
        run_artist_ids: &mut HashSet<String>,
        rng: &mut R,
    ) -> LotteryOutcome {
        let mut outcome = LotteryOutcome::default();
        let mut drawn = HashSet::new();

        while outcome.added.len() < quota {
            if self.stop.load(Ordering::SeqCst) {
                info!("Stop requested, ending the lottery");
                outcome.stopped = true;
                break;
            }

            let Some(artist_id) = draw_artist(weights, &drawn, rng) else {
                info!("Every weighted artist has been drawn");
                break;
            };
            drawn.insert(artist_id.clone());
            outcome.drawn.push(artist_id.clone());

            let Some(artist_name) = self.registry.get(&artist_id).map(|r| r.name.clone()) else {
                debug!("Drawn artist {} is not in the registry", artist_id);
                continue;
            };
            info!(
                "Draw #{}: '{}' ({}/{} added)",
                outcome.drawn.len(),
                artist_name,
                outcome.added.len(),
                quota
            );

            let Some(candidate) = self.cascade.discover(&artist_name, run_artist_ids, rng) else {
                continue;
            };
            if self.admission.admit(&candidate, run_artist_ids) {
                outcome.added.push(candidate);
            }
        }

        info!(
            "Lottery finished: {}/{} added after {} draws",
            outcome.added.len(),
            quota,
            outcome.drawn.len()
        );
        outcome
    }
}
