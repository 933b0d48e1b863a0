//! Tests for refreshing the artist registry from liked tracks.

mod common;

use common::{item_added, registry, track, FakeCatalog};
use playlist_curator::catalog::PlaylistItem;

fn liked(track_id: &str, artists: &[(&str, &str)], added_at: &str) -> PlaylistItem {
    item_added(track(track_id, artists), added_at)
}

#[test]
fn test_like_scan_counts_every_credited_artist() {
    let catalog = FakeCatalog::new();
    catalog.set_saved_tracks(vec![
        liked("t1", &[("a1", "Alpha"), ("b1", "Beta")], "2024-03-02T00:00:00Z"),
        liked("t2", &[("a1", "Alpha")], "2024-03-01T00:00:00Z"),
    ]);
    let mut registry = registry(&[("a1", "Alpha", 2)]);

    let new_artists = registry.refresh_from_likes(&catalog).unwrap();

    assert_eq!(new_artists.len(), 1);
    assert_eq!(new_artists[0].id, "b1");
    assert_eq!(registry.get("a1").unwrap().total_liked, 4);
    assert_eq!(registry.get("b1").unwrap().total_liked, 1);
}

#[test]
fn test_like_scan_pages_through_whole_library() {
    let catalog = FakeCatalog::new();
    catalog.set_saved_tracks(
        (0..120)
            .map(|i| {
                liked(
                    &format!("t{}", i),
                    &[("a1", "Alpha")],
                    "2024-03-01T00:00:00Z",
                )
            })
            .collect(),
    );
    let mut registry = registry(&[]);

    registry.refresh_from_likes(&catalog).unwrap();

    assert_eq!(registry.get("a1").unwrap().total_liked, 120);
}

#[test]
fn test_large_registry_only_scans_newest_likes() {
    let catalog = FakeCatalog::new();
    catalog.set_saved_tracks(
        (0..150)
            .map(|i| {
                liked(
                    &format!("t{}", i),
                    &[("new", "Newcomer")],
                    "2024-03-01T00:00:00Z",
                )
            })
            .collect(),
    );
    let known: Vec<(String, String)> = (0..100)
        .map(|i| (format!("k{}", i), format!("Known {}", i)))
        .collect();
    let refs: Vec<(&str, &str, u32)> = known
        .iter()
        .map(|(id, name)| (id.as_str(), name.as_str(), 1))
        .collect();
    let mut registry = registry(&refs);

    registry.refresh_from_likes(&catalog).unwrap();

    assert_eq!(registry.get("new").unwrap().total_liked, 100);
}

#[test]
fn test_rescan_skips_already_counted_likes() {
    let catalog = FakeCatalog::new();
    catalog.set_saved_tracks(vec![liked(
        "t1",
        &[("a1", "Alpha")],
        "2024-03-01T00:00:00Z",
    )]);
    let mut registry = registry(&[]);
    registry.refresh_from_likes(&catalog).unwrap();

    catalog.set_saved_tracks(vec![
        liked("t2", &[("a1", "Alpha")], "2024-03-05T00:00:00Z"),
        liked("t1", &[("a1", "Alpha")], "2024-03-01T00:00:00Z"),
    ]);
    let new_artists = registry.refresh_from_likes(&catalog).unwrap();

    assert!(new_artists.is_empty());
    assert_eq!(registry.get("a1").unwrap().total_liked, 2);
}
