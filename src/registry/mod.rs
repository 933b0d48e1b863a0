//! The registry of known artists and how many of their tracks the user liked.
//!
//! Persisted as JSON: `{"artists": {"<id>": {"name": "...", "total_liked": N}}}`.

use crate::catalog::{same_name, CatalogError, CatalogService, SEARCH_PAGE_SIZE};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Registries at least this large only rescan the newest liked tracks.
const FULL_SCAN_BELOW: usize = 100;
const PARTIAL_SCAN_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub name: String,
    #[serde(default)]
    pub total_liked: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistRegistry {
    #[serde(default)]
    artists: BTreeMap<String, ArtistRecord>,
    /// Newest like already counted; older likes are skipped by the next scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scanned_through: Option<DateTime<Utc>>,
}

/// Artists first seen by a like scan.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArtist {
    pub id: String,
    pub name: String,
}

impl ArtistRegistry {
    /// Loads the registry, or starts an empty one when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No artist registry at {:?}, starting empty", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artist registry: {:?}", path))?;
        let registry: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artist registry: {:?}", path))?;
        info!("Loaded {} artists from {:?}", registry.len(), path);
        Ok(registry)
    }

    /// Writes the registry through a temporary file so a crash never truncates it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write artist registry: {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace artist registry: {:?}", path))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.artists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }

    pub fn get(&self, artist_id: &str) -> Option<&ArtistRecord> {
        self.artists.get(artist_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArtistRecord)> {
        self.artists.iter()
    }

    /// First record whose name matches case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<&ArtistRecord> {
        self.artists.values().find(|r| same_name(&r.name, name))
    }

    /// Record for an artist, by id first, then by name.
    pub fn lookup(&self, artist_id: Option<&str>, name: &str) -> Option<&ArtistRecord> {
        artist_id
            .and_then(|id| self.get(id))
            .or_else(|| self.find_by_name(name))
    }

    pub fn insert(&mut self, artist_id: &str, record: ArtistRecord) {
        self.artists.insert(artist_id.to_string(), record);
    }

    /// Counts one more liked track; returns true if the artist was new.
    pub fn record_like(&mut self, artist_id: &str, name: &str) -> bool {
        match self.artists.get_mut(artist_id) {
            Some(record) => {
                record.total_liked += 1;
                false
            }
            None => {
                self.artists.insert(
                    artist_id.to_string(),
                    ArtistRecord {
                        name: name.to_string(),
                        total_liked: 1,
                    },
                );
                true
            }
        }
    }

    /// Counts the artists of liked tracks added since the previous scan.
    ///
    /// Every credited artist is counted. Small registries scan the whole
    /// library; larger ones only the newest liked tracks.
    pub fn refresh_from_likes(
        &mut self,
        catalog: &dyn CatalogService,
    ) -> Result<Vec<NewArtist>, CatalogError> {
        let scan_limit = if self.len() < FULL_SCAN_BELOW {
            None
        } else {
            Some(PARTIAL_SCAN_LIMIT)
        };
        info!(
            "Scanning liked tracks ({} known artists, limit {:?})",
            self.len(),
            scan_limit
        );

        let previous_watermark = self.scanned_through;
        let mut newest_seen = previous_watermark;
        let mut new_artists = Vec::new();
        let mut processed = 0;
        let mut offset = 0;

        loop {
            let batch = match scan_limit {
                Some(limit) if processed >= limit => break,
                Some(limit) => SEARCH_PAGE_SIZE.min(limit - processed),
                None => SEARCH_PAGE_SIZE,
            };
            let page = catalog.saved_tracks(batch, offset)?;
            if page.fetched == 0 {
                break;
            }
            offset += page.fetched;

            for item in page.items {
                processed += 1;
                let added_at = item
                    .added_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                if let (Some(added), Some(mark)) = (added_at, previous_watermark) {
                    if added <= mark {
                        continue;
                    }
                }
                if let Some(added) = added_at {
                    newest_seen = newest_seen.max(Some(added));
                }
                let Some(track) = item.track else { continue };
                for artist in &track.artists {
                    let Some(artist_id) = artist.id.as_deref() else {
                        continue;
                    };
                    if self.record_like(artist_id, &artist.name) {
                        new_artists.push(NewArtist {
                            id: artist_id.to_string(),
                            name: artist.name.clone(),
                        });
                    }
                }
            }
            debug!("Processed {} liked tracks so far", processed);

            if offset >= page.total {
                break;
            }
        }

        self.scanned_through = newest_seen;
        info!(
            "Like scan done: {} tracks, {} new artists, {} total",
            processed,
            new_artists.len(),
            self.len()
        );
        Ok(new_artists)
    }
}
