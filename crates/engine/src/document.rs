use backdex_protocol::FileRecord;

use crate::StoreError;

/// Keyed record storage the index is built on.
///
/// `path` and `parent_path` are exact keys. Implementations must be safe to
/// call from many handler threads at once; read-modify-write sequences are
/// linearized by the caller, not by the store.
pub trait DocumentStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<FileRecord>, StoreError>;

    /// Insert or replace the record stored under `record.path`.
    fn put(&self, record: FileRecord) -> Result<(), StoreError>;

    /// Returns whether a record existed.
    fn delete(&self, path: &str) -> Result<bool, StoreError>;

    /// Records in path order, skipping `offset`, at most `limit`.
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<FileRecord>, StoreError>;

    /// Every record whose `parent_path` equals `parent_path` exactly.
    fn children(&self, parent_path: &str) -> Result<Vec<FileRecord>, StoreError>;

    /// Records matching any of the lowercased prefix `terms`, best first.
    /// Returns the requested window and the total number of matches.
    fn search(
        &self,
        terms: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<FileRecord>, usize), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every accepted mutation durable.
    fn sync(&self) -> Result<(), StoreError>;
}
