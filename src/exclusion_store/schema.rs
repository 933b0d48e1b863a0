//! SQLite schema definitions for the exclusion database.
//!
//! Four logical tables: blacklisted tracks, artists whose public playlists are
//! not worth scraping, third-party playlists already inspected, and the
//! whitelisted source profiles used by the fill pass.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Initial exclusion tables
// =============================================================================

/// Fixed facts no longer block the track nor count against its artist.
const BLACKLISTED_TRACKS_TABLE_V1: Table = Table {
    name: "blacklisted_tracks",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("track_name", &SqlType::Text),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("artist_name", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!(
            "fixed",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[
        ("idx_blacklisted_tracks_artist_id", "artist_id"),
        ("idx_blacklisted_tracks_fixed_created", "fixed, created_at"),
    ],
};

const SCRAPE_BLACKLISTED_ARTISTS_TABLE_V1: Table = Table {
    name: "scrape_blacklisted_artists",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const USER_PLAYLISTS_TABLE_V1: Table = Table {
    name: "user_playlists",
    columns: &[
        sqlite_column!("playlist_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text),
        sqlite_column!(
            "blacklisted",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const WHITELISTED_PROFILES_TABLE_V1: Table = Table {
    name: "whitelisted_profiles",
    columns: &[
        sqlite_column!("profile_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

// =============================================================================
// Versioned Schema Definition
// =============================================================================

/// Version 1: exclusion tables
pub const EXCLUSION_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            BLACKLISTED_TRACKS_TABLE_V1,
            SCRAPE_BLACKLISTED_ARTISTS_TABLE_V1,
            USER_PLAYLISTS_TABLE_V1,
            WHITELISTED_PROFILES_TABLE_V1,
        ],
        migration: None,
    },
];
