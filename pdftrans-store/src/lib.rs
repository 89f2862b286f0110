//! # pdftrans-store
//!
//! Persistent stores the agent runtime depends on: a per-domain glossary
//! store with timestamped backups, a SQLite+FTS5 paper metadata repository,
//! and a filesystem-backed translation result store.

pub mod glossary;
pub mod papers;
pub mod translations;

pub use glossary::GlossaryStore;
pub use papers::{PaperRecord, PaperRepository};
pub use translations::{IndexEntry, SaveRequest, TranslationMeta, TranslationStore};
