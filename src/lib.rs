//! Playlist Curator Library
//!
//! Exposes the curation engine and its collaborators for the binary and for testing.

pub mod catalog;
pub mod config;
pub mod exclusion_store;
pub mod history;
pub mod registry;
pub mod retention;
pub mod retry_policy;
pub mod run;
pub mod scraper;
pub mod selection;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog::{CatalogError, CatalogService};
pub use exclusion_store::{ExclusionFacts, ExclusionStore, SqliteExclusionStore};
pub use run::{CurationRun, RunSummary};
