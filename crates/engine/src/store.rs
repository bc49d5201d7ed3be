use std::{
    hash::BuildHasher,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use backdex_fs::Snapshot;
use backdex_protocol::{BackupState, DirListing, FilePage, FileRecord, SearchResult};
use backdex_runtime::SEARCH_PAGE_SIZE;
use hashbrown::DefaultHashBuilder;

use crate::{DocumentStore, JournalStore, StoreError, search::query_terms};

const KEY_LOCK_STRIPES: usize = 64;

/// What an upsert did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    MarkedStale,
    Unchanged,
}

/// Striped mutexes keyed by path hash. Two paths may share a stripe; the
/// same path always maps to the same one.
struct KeyLocks {
    stripes: Box<[Mutex<()>]>,
    hasher: DefaultHashBuilder,
}

impl KeyLocks {
    fn new(n: usize) -> Self {
        Self {
            stripes: (0..n.max(1)).map(|_| Mutex::new(())).collect(),
            hasher: DefaultHashBuilder::default(),
        }
    }

    fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        let idx = (self.hasher.hash_one(key) as usize) % self.stripes.len();
        self.stripes[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The file index: staleness-aware upserts over a [`DocumentStore`].
pub struct IndexStore {
    docs: Box<dyn DocumentStore>,
    locks: KeyLocks,
}

/// A record differs from disk when its size or its mtime (whole seconds)
/// does.
pub fn is_stale(record: &FileRecord, snap: &Snapshot) -> bool {
    record.size != snap.size || record.mod_time.timestamp() != snap.mod_time.timestamp()
}

fn record_from(snap: &Snapshot, backup_state: BackupState, revision: u64) -> FileRecord {
    FileRecord {
        path: snap.path.clone(),
        name: snap.name.clone(),
        parent_path: snap.parent_path.clone(),
        size: snap.size,
        is_dir: snap.is_dir,
        mod_time: snap.mod_time,
        mode: snap.mode,
        mode_string: snap.mode_string.clone(),
        backup_state,
        revision,
    }
}

impl IndexStore {
    pub fn new(docs: impl DocumentStore + 'static) -> Self {
        Self {
            docs: Box::new(docs),
            locks: KeyLocks::new(KEY_LOCK_STRIPES),
        }
    }

    /// Open (or create) a journaled index in `dir`.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(JournalStore::open(dir)?))
    }

    pub fn in_memory() -> Self {
        Self::new(JournalStore::in_memory())
    }

    /// Record `snap`. New paths start as `NoBackup`; a size or mtime change
    /// replaces the record and marks it `Stale`; anything else is left alone.
    pub fn upsert(&self, snap: &Snapshot) -> Result<UpsertOutcome, StoreError> {
        let _key = self.locks.lock(&snap.path);

        match self.docs.get(&snap.path)? {
            None => {
                self.docs
                    .put(record_from(snap, BackupState::NoBackup, 1))?;
                log::trace!("[index] created {}", snap.path);
                Ok(UpsertOutcome::Created)
            }
            Some(existing) if is_stale(&existing, snap) => {
                self.docs
                    .put(record_from(snap, BackupState::Stale, existing.revision + 1))?;
                log::debug!("[index] {} is stale", snap.path);
                Ok(UpsertOutcome::MarkedStale)
            }
            Some(_) => Ok(UpsertOutcome::Unchanged),
        }
    }

    pub fn get(&self, path: &str) -> Result<FileRecord, StoreError> {
        self.docs
            .get(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    /// Page `page` (1-based; lower values mean 1) of `page_size` records in
    /// path order. `has_more` is exact.
    pub fn list_paged(&self, page: usize, page_size: usize) -> Result<FilePage, StoreError> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = (page - 1).saturating_mul(page_size);

        let mut files = self.docs.list(offset, page_size + 1)?;
        let has_more = files.len() > page_size;
        files.truncate(page_size);

        Ok(FilePage {
            files,
            page,
            has_more,
        })
    }

    pub fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let _key = self.locks.lock(path);
        self.docs.delete(path)
    }

    /// Direct children of an indexed directory.
    pub fn directory_listing(&self, parent_path: &str) -> Result<DirListing, StoreError> {
        if self.docs.get(parent_path)?.is_none() {
            return Err(StoreError::NotFound(parent_path.to_string()));
        }

        let items = self
            .docs
            .children(parent_path)?
            .into_iter()
            // "/" is its own parent
            .filter(|r| r.path != parent_path)
            .collect();
        Ok(DirListing::from_items(items))
    }

    pub fn search(&self, query: &str, page: usize) -> Result<SearchResult, StoreError> {
        let page = page.max(1);
        let terms = query_terms(query);
        let offset = (page - 1).saturating_mul(SEARCH_PAGE_SIZE);
        let (files, total) = self.docs.search(&terms, offset, SEARCH_PAGE_SIZE)?;
        Ok(SearchResult { files, total, page })
    }

    /// Record a successful backup of `path`.
    pub fn mark_backed_up(&self, path: &str) -> Result<(), StoreError> {
        let _key = self.locks.lock(path);
        let mut record = self
            .docs
            .get(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        if record.backup_state != BackupState::Latest {
            record.backup_state = BackupState::Latest;
            record.revision += 1;
            self.docs.put(record)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn sync(&self) -> Result<(), StoreError> {
        self.docs.sync()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
