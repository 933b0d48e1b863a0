//! Common test infrastructure
//!
//! In-memory stand-ins for the catalog, the scraper and the listening history,
//! plus builders for the catalog models. Tests should only import from this
//! module, not from internal submodules.

#![allow(dead_code)]

mod fakes;
mod fixtures;

pub use fakes::{CountingStore, FakeCatalog, FakeHistory, FakeScraper};
pub use fixtures::*;

use playlist_curator::exclusion_store::{ExclusionFacts, SqliteExclusionStore};
use std::sync::Arc;

/// Facts backed by a fresh in-memory database, plus the database itself.
pub fn memory_facts() -> (Arc<SqliteExclusionStore>, ExclusionFacts) {
    let store = Arc::new(SqliteExclusionStore::open_in_memory().unwrap());
    let facts = ExclusionFacts::new(store.clone());
    (store, facts)
}
