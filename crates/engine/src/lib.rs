mod document;
mod error;
mod journal;
mod persist;
mod search;
mod store;

pub use document::DocumentStore;
pub use error::StoreError;
pub use journal::{JOURNAL_FILE, JournalStore, SNAPSHOT_FILE};
pub use search::{match_score, query_terms, record_terms};
pub use store::{IndexStore, UpsertOutcome, is_stale};
