//! Tests for the discovery cascade and the uniform track draw.

mod common;

use common::{
    artist, item, memory_facts, playlist, registry, track, CountingStore, FakeCatalog,
    FakeHistory, FakeScraper,
};
use playlist_curator::catalog::PlaylistItem;
use playlist_curator::config::SelectionSettings;
use playlist_curator::exclusion_store::{ExclusionFacts, ExclusionStore};
use playlist_curator::selection::{DiscoveryCascade, DiscoverySource, ExclusionGate, TrackDrawer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;

/// `count` tracks credited to a single artist, ids prefixed with `prefix`.
fn tracks_by(
    prefix: &str,
    count: usize,
    artist_id: &str,
    artist_name: &str,
) -> Vec<PlaylistItem> {
    (0..count)
        .map(|i| item(track(&format!("{}-{}", prefix, i), &[(artist_id, artist_name)])))
        .collect()
}

#[test]
fn test_failed_scraped_playlist_blacklists_artist_once_then_searches() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.add_artist(artist("g1", "Gamma", 500));
    catalog.fail_playlist("broken");
    catalog.set_playlist("also-scraped", vec![item(track("s1", &[("g1", "Gamma")]))]);
    catalog.set_playlist_search("Alpha", vec![playlist("searched", "Alpha and friends")]);
    catalog.set_playlist(
        "searched",
        vec![
            item(track("t1", &[("a1", "Alpha")])),
            item(track("t2", &[("g1", "Gamma")])),
        ],
    );

    let scraper = FakeScraper::new().with_playlists(
        "a1",
        &[("broken", "This Is Alpha"), ("also-scraped", "Alpha Radio")],
    );
    let history = FakeHistory::new();
    let store = Arc::new(CountingStore::new());
    let facts = ExclusionFacts::new(store.clone());
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(3);

    let candidate = cascade
        .discover("Alpha", &HashSet::new(), &mut rng)
        .expect("searched playlist should provide a track");

    assert_eq!(store.scrape_blacklist_writes(), vec!["a1".to_string()]);
    assert!(store.is_artist_scrape_blacklisted("a1").unwrap());
    assert_eq!(catalog.playlist_fetches("also-scraped"), 0);
    assert_eq!(
        candidate.source,
        DiscoverySource::SearchedPlaylist {
            playlist_id: "searched".to_string(),
            name: "Alpha and friends".to_string(),
        }
    );

    // The next cascade for the artist skips scraping entirely
    cascade.discover("Alpha", &HashSet::new(), &mut rng);
    assert_eq!(scraper.calls(), vec!["a1".to_string()]);
    assert_eq!(store.scrape_blacklist_writes().len(), 1);
}

#[test]
fn test_draw_gives_up_after_consecutive_rejections() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.set_playlist(
        "taken",
        (0..30)
            .map(|i| item(track(&format!("t{}", i), &[("a1", "Alpha")])))
            .collect(),
    );
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let run_ids: HashSet<String> = ["a1".to_string()].into();
    let source = DiscoverySource::ArtistPlaylist {
        playlist_id: "taken".to_string(),
        name: "Taken".to_string(),
    };
    let mut rng = StdRng::seed_from_u64(9);

    let result = drawer.draw("taken", &source, "Alpha", 80_000, &run_ids, &mut rng);

    assert!(result.is_none());
    assert_eq!(catalog.playlist_fetches("taken"), 5);
}

#[test]
fn test_draw_skips_items_without_artists_or_id() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    let mut local = track("local", &[]);
    local.id = None;
    catalog.set_playlist(
        "mixed",
        vec![
            item(local),
            item(track("bare", &[])),
            item(track("good", &[("a1", "Alpha")])),
        ],
    );
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let source = DiscoverySource::ArtistPlaylist {
        playlist_id: "mixed".to_string(),
        name: "Mixed".to_string(),
    };
    let mut rng = StdRng::seed_from_u64(11);

    let candidate = drawer
        .draw("mixed", &source, "Alpha", 80_000, &HashSet::new(), &mut rng)
        .expect("the only usable item should eventually be drawn");
    assert_eq!(candidate.track_id, "good");
}

#[test]
fn test_searched_playlists_record_seen_and_blacklisted() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.add_artist(artist("z1", "Zeta", 10));
    catalog.set_playlist_search(
        "Alpha",
        vec![playlist("empty", "Empty"), playlist("unrelated", "Unrelated")],
    );
    catalog.set_playlist("empty", vec![]);
    catalog.set_playlist("unrelated", vec![item(track("z", &[("z1", "Zeta")]))]);

    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(5);

    assert!(cascade.discover("Alpha", &HashSet::new(), &mut rng).is_none());

    let empty = store.get_playlist_fact("empty").unwrap().unwrap();
    assert!(empty.blacklisted);
    let unrelated = store.get_playlist_fact("unrelated").unwrap().unwrap();
    assert!(!unrelated.blacklisted);

    // Blacklisted playlists are not fetched again
    cascade.discover("Alpha", &HashSet::new(), &mut rng);
    assert_eq!(catalog.playlist_fetches("empty"), 1);
    assert_eq!(catalog.playlist_fetches("unrelated"), 2);
}

#[test]
fn test_similar_artists_provide_a_top_track() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.add_artist(artist("h1", "Huge", 2_000_000));
    catalog.add_artist(artist("s1", "Small", 300));
    catalog.set_top_tracks("h1", vec![track("hit", &[("h1", "Huge")])]);
    catalog.set_top_tracks("s1", vec![track("gem", &[("s1", "Small")])]);

    let scraper = FakeScraper::new();
    let history = FakeHistory::new().with_similar("Alpha", &["Huge", "Small"]);
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(21);

    let candidate = cascade
        .discover("Alpha", &HashSet::new(), &mut rng)
        .expect("the small similar artist qualifies");
    assert_eq!(candidate.track_id, "gem");
    assert_eq!(
        candidate.source,
        DiscoverySource::SimilarArtist {
            artist_name: "Small".to_string()
        }
    );
}

#[test]
fn test_related_artists_retry_with_re_resolved_artist() {
    let catalog = FakeCatalog::new();
    // The narrow search lands on a tribute act, the broad one finds the exact name
    catalog.set_artist_search(
        "Alpha",
        vec![artist("a2", "Alpha Tribute", 50), artist("a1", "Alpha", 5_000)],
    );
    catalog.add_artist(artist("r1", "Relative", 100));
    catalog.set_related("a1", vec![artist("r1", "Relative", 100)]);
    catalog.set_top_tracks("r1", vec![track("rel", &[("r1", "Relative")])]);

    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(8);

    let candidate = cascade
        .discover("Alpha", &HashSet::new(), &mut rng)
        .expect("related artist of the re-resolved id qualifies");
    assert_eq!(candidate.track_id, "rel");
    assert_eq!(
        candidate.source,
        DiscoverySource::RelatedArtist {
            artist_name: "Relative".to_string()
        }
    );
    assert_eq!(
        catalog.artist_searches(),
        vec![("Alpha".to_string(), 1), ("Alpha".to_string(), 10)]
    );
}

#[test]
fn test_related_artists_no_retry_when_resolution_is_unchanged() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));

    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(8);

    assert!(cascade.discover("Alpha", &HashSet::new(), &mut rng).is_none());
    assert_eq!(catalog.artist_searches().len(), 2);
}

#[test]
fn test_related_artists_skip_self_matches() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.set_related(
        "a1",
        vec![
            artist("a1", "Alpha", 1_000),
            artist("a9", "ALPHA", 10),
            artist("r1", "Relative", 100),
        ],
    );
    catalog.add_artist(artist("r1", "Relative", 100));
    catalog.set_top_tracks("a9", vec![track("dup", &[("a9", "ALPHA")])]);
    catalog.set_top_tracks("a1", vec![track("own", &[("a1", "Alpha")])]);
    catalog.set_top_tracks("r1", vec![track("rel", &[("r1", "Relative")])]);

    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );

    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        let candidate = cascade
            .discover("Alpha", &HashSet::new(), &mut rng)
            .expect("the related artist qualifies");
        assert_eq!(candidate.track_id, "rel");
    }
}

#[test]
fn test_unknown_artist_aborts_cascade() {
    let catalog = FakeCatalog::new();
    let scraper = FakeScraper::new();
    let history = FakeHistory::new().with_similar("Nobody", &["Someone"]);
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(1);

    assert!(cascade.discover("Nobody", &HashSet::new(), &mut rng).is_none());
    assert!(scraper.calls().is_empty());
    assert_eq!(catalog.artist_searches().len(), 1);
}

#[test]
fn test_artist_playlists_skip_crowded_ones_and_stop_after_two_attempts() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.add_artist(artist("x1", "Taken", 1_000));
    // Six tracks by the artist: acceptable, but over the limit of five
    catalog.set_playlist("crowded", tracks_by("own", 6, "a1", "Alpha"));
    for id in ["p1", "p2", "p3"] {
        catalog.set_playlist(id, tracks_by(id, 3, "x1", "Taken"));
    }

    let scraper = FakeScraper::new().with_playlists(
        "a1",
        &[
            ("crowded", "Alpha Complete"),
            ("p1", "One"),
            ("p2", "Two"),
            ("p3", "Three"),
        ],
    );
    let history = FakeHistory::new();
    let (store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let run_ids = HashSet::from(["x1".to_string()]);
    let mut rng = StdRng::seed_from_u64(11);

    assert!(cascade.discover("Alpha", &run_ids, &mut rng).is_none());

    assert_eq!(catalog.playlist_fetches("crowded"), 1);
    // One inspection plus five rejected draws each
    assert_eq!(catalog.playlist_fetches("p1"), 6);
    assert_eq!(catalog.playlist_fetches("p2"), 6);
    assert_eq!(catalog.playlist_fetches("p3"), 0);
    assert!(!store.is_artist_scrape_blacklisted("a1").unwrap());
}

/// Searched playlists for "Alpha": `confirmed` holding one Alpha track each,
/// plus `unrelated` holding only Zeta and `broken` failing to load.
fn searched_catalog(confirmed: usize, unrelated: usize, broken: usize) -> FakeCatalog {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.add_artist(artist("z1", "Zeta", 10));
    let mut results = Vec::new();
    for i in 0..confirmed {
        let id = format!("c{}", i);
        catalog.set_playlist(&id, tracks_by(&id, 1, "a1", "Alpha"));
        results.push(playlist(&id, "Has Alpha"));
    }
    for i in 0..unrelated {
        let id = format!("u{}", i);
        catalog.set_playlist(&id, tracks_by(&id, 2, "z1", "Zeta"));
        results.push(playlist(&id, "Only Zeta"));
    }
    for i in 0..broken {
        let id = format!("b{}", i);
        catalog.fail_playlist(&id);
        results.push(playlist(&id, "Private"));
    }
    catalog.set_playlist_search("Alpha", results);
    catalog
}

fn inspected(catalog: &FakeCatalog, prefix: &str, count: usize) -> usize {
    (0..count)
        .filter(|i| catalog.playlist_fetches(&format!("{}{}", prefix, i)) > 0)
        .count()
}

#[test]
fn test_searched_playlists_stop_after_ten_confirmed() {
    let catalog = searched_catalog(12, 0, 0);
    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    // Every Alpha track is rejected, so each confirmed playlist is used up
    let run_ids = HashSet::from(["a1".to_string()]);
    let mut rng = StdRng::seed_from_u64(8);

    assert!(cascade.discover("Alpha", &run_ids, &mut rng).is_none());
    assert_eq!(inspected(&catalog, "c", 12), 10);
}

#[test]
fn test_unconfirmed_searched_playlists_do_not_use_the_budget() {
    let catalog = searched_catalog(10, 4, 3);
    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let run_ids = HashSet::from(["a1".to_string()]);
    let mut rng = StdRng::seed_from_u64(8);

    assert!(cascade.discover("Alpha", &run_ids, &mut rng).is_none());

    assert_eq!(inspected(&catalog, "c", 10), 10);
    for i in 0..10 {
        assert_eq!(catalog.playlist_fetches(&format!("c{}", i)), 6);
        assert!(store.get_playlist_fact(&format!("c{}", i)).unwrap().is_none());
    }
}

#[test]
fn test_searched_playlist_with_too_many_artist_tracks_is_skipped() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    let mut heavy = tracks_by("heavy", 11, "a1", "Alpha");
    heavy.push(item(track("heavy-guest", &[("g1", "Gamma")])));
    catalog.set_playlist("heavy", heavy);
    catalog.set_playlist("ten", tracks_by("ten", 10, "a1", "Alpha"));
    catalog.set_playlist_search("Alpha", vec![playlist("heavy", "All Alpha")]);

    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(4);

    assert!(cascade.discover("Alpha", &HashSet::new(), &mut rng).is_none());
    assert_eq!(catalog.playlist_fetches("heavy"), 1);
    assert!(store.get_playlist_fact("heavy").unwrap().is_none());

    // Ten tracks by the artist is still allowed
    catalog.set_playlist_search("Alpha", vec![playlist("ten", "Mostly Alpha")]);
    let candidate = cascade
        .discover("Alpha", &HashSet::new(), &mut rng)
        .expect("playlist at the limit should be drawn from");
    assert_eq!(
        candidate.source,
        DiscoverySource::SearchedPlaylist {
            playlist_id: "ten".to_string(),
            name: "Mostly Alpha".to_string(),
        }
    );
}

#[test]
fn test_playlist_search_pages_past_null_entries() {
    let catalog = FakeCatalog::new();
    catalog.add_artist(artist("a1", "Alpha", 1_000));
    catalog.set_playlist_search(
        "Alpha",
        (0..200)
            .map(|i| playlist(&format!("s{}", i), "Alpha mix"))
            .collect(),
    );
    // One null entry on each page of fifty
    for id in ["s0", "s50", "s100", "s150"] {
        catalog.return_as_null(id);
    }

    let scraper = FakeScraper::new();
    let history = FakeHistory::new();
    let (_store, facts) = memory_facts();
    let registry = registry(&[]);
    let settings = SelectionSettings::default();
    let gate = ExclusionGate::new(&catalog, &facts, &registry, &settings);
    let drawer = TrackDrawer::new(&catalog, &gate, &settings);
    let cascade = DiscoveryCascade::new(
        &catalog, &scraper, &history, &facts, &gate, &drawer, &settings, "US",
    );
    let mut rng = StdRng::seed_from_u64(2);

    assert!(cascade.discover("Alpha", &HashSet::new(), &mut rng).is_none());

    assert_eq!(catalog.playlist_search_offsets(), vec![0, 50, 100, 150]);
    assert_eq!(catalog.playlist_fetches("s199"), 1);
    assert_eq!(catalog.playlist_fetches("s0"), 0);
}
