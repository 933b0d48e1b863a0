use super::schema::EXCLUSION_VERSIONED_SCHEMAS;
use super::{ExclusionStore, PlaylistFact, TrackBlacklistFact};
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteExclusionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExclusionStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open exclusion database")?;

        if is_new_db {
            info!("Creating new exclusion database at {:?}", path);
            Self::latest_schema().create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;

            if db_version < 1 {
                anyhow::bail!(
                    "Exclusion database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let version_index = EXCLUSION_VERSIONED_SCHEMAS
                .iter()
                .position(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown exclusion database version {}", db_version))?;
            EXCLUSION_VERSIONED_SCHEMAS[version_index]
                .validate(&conn)
                .with_context(|| {
                    format!(
                        "Exclusion database schema validation failed for version {}",
                        db_version
                    )
                })?;

            let current_version = Self::latest_schema().version as i64;
            if db_version < current_version {
                info!(
                    "Migrating exclusion database from version {} to {}",
                    db_version, current_version
                );
                Self::migrate_if_needed(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Fresh store backed by an in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::latest_schema().create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn latest_schema() -> &'static crate::sqlite_persistence::VersionedSchema {
        // The schema list is a non-empty constant
        &EXCLUSION_VERSIONED_SCHEMAS[EXCLUSION_VERSIONED_SCHEMAS.len() - 1]
    }

    fn migrate_if_needed(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest_from = from_version;
        for schema in EXCLUSION_VERSIONED_SCHEMAS.iter() {
            if schema.version > from_version {
                info!(
                    "Running exclusion database migration from version {} to {}",
                    latest_from, schema.version
                );
                if let Some(migration_fn) = schema.migration {
                    migration_fn(&tx).with_context(|| {
                        format!("Failed to run migration to version {}", schema.version)
                    })?;
                }
                latest_from = schema.version;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Exclusion database connection lock poisoned"))
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_track_fact(row: &rusqlite::Row) -> rusqlite::Result<TrackBlacklistFact> {
        let created_at: String = row.get("created_at")?;
        let fixed: i64 = row.get("fixed")?;
        Ok(TrackBlacklistFact {
            track_id: row.get("track_id")?,
            track_name: row.get("track_name")?,
            artist_id: row.get("artist_id")?,
            artist_name: row.get("artist_name")?,
            fixed: fixed != 0,
            created_at: Self::parse_datetime(&created_at),
        })
    }
}

impl ExclusionStore for SqliteExclusionStore {
    fn is_track_blacklisted(&self, track_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM blacklisted_tracks WHERE track_id = ?1 AND fixed = 0 LIMIT 1",
                params![track_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn blacklisted_artist_count(&self, artist_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM blacklisted_tracks WHERE artist_id = ?1 AND fixed = 0",
            params![artist_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_track_blacklist_fact(&self, fact: &TrackBlacklistFact) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO blacklisted_tracks
                (track_id, track_name, artist_id, artist_name, created_at, fixed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(track_id) DO UPDATE SET
                track_name = excluded.track_name,
                artist_id = excluded.artist_id,
                artist_name = excluded.artist_name,
                created_at = excluded.created_at,
                fixed = excluded.fixed",
            params![
                fact.track_id,
                fact.track_name,
                fact.artist_id,
                fact.artist_name,
                fact.created_at.to_rfc3339(),
                fact.fixed as i64,
            ],
        )?;
        Ok(())
    }

    fn stale_unfixed_tracks(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<TrackBlacklistFact>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT track_id, track_name, artist_id, artist_name, created_at, fixed
             FROM blacklisted_tracks WHERE fixed = 0",
        )?;
        // created_at is compared in Rust: rows written by other tools may use a
        // different offset notation, which breaks lexicographic comparison.
        let facts = stmt
            .query_map([], Self::row_to_track_fact)?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|fact| fact.created_at < created_before)
            .collect();
        Ok(facts)
    }

    fn mark_track_fixed(&self, track_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE blacklisted_tracks SET fixed = 1 WHERE track_id = ?1 AND fixed = 0",
            params![track_id],
        )?;
        Ok(updated > 0)
    }

    fn is_artist_scrape_blacklisted(&self, artist_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM scrape_blacklisted_artists WHERE artist_id = ?1 LIMIT 1",
                params![artist_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn add_scrape_blacklisted_artist(&self, artist_id: &str, name: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO scrape_blacklisted_artists (artist_id, name, created_at)
             VALUES (?1, ?2, ?3)",
            params![artist_id, name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn is_playlist_blacklisted(&self, playlist_id: &str) -> Result<bool> {
        Ok(self
            .get_playlist_fact(playlist_id)?
            .map(|fact| fact.blacklisted)
            .unwrap_or(false))
    }

    fn get_playlist_fact(&self, playlist_id: &str) -> Result<Option<PlaylistFact>> {
        let conn = self.lock()?;
        let fact = conn
            .query_row(
                "SELECT playlist_id, name, blacklisted, updated_at
                 FROM user_playlists WHERE playlist_id = ?1",
                params![playlist_id],
                |row| {
                    let blacklisted: i64 = row.get("blacklisted")?;
                    let updated_at: String = row.get("updated_at")?;
                    Ok(PlaylistFact {
                        playlist_id: row.get("playlist_id")?,
                        name: row.get("name")?,
                        blacklisted: blacklisted != 0,
                        updated_at: Self::parse_datetime(&updated_at),
                    })
                },
            )
            .optional()?;
        Ok(fact)
    }

    fn upsert_playlist_fact(
        &self,
        playlist_id: &str,
        name: Option<&str>,
        blacklisted: bool,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_playlists (playlist_id, name, blacklisted, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(playlist_id) DO UPDATE SET
                name = excluded.name,
                blacklisted = excluded.blacklisted,
                updated_at = excluded.updated_at",
            params![
                playlist_id,
                name,
                blacklisted as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn whitelisted_profiles(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT profile_id FROM whitelisted_profiles ORDER BY profile_id")?;
        let profiles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(profiles)
    }

    fn add_whitelisted_profile(&self, profile_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO whitelisted_profiles (profile_id, created_at) VALUES (?1, ?2)",
            params![profile_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
