use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use backdex_protocol::FileRecord;
use hashbrown::{HashMap, HashSet};

use crate::{
    DocumentStore, StoreError,
    persist::{
        JournalEntry, decode_frames, encode_frame, read_snapshot, write_snapshot_atomic,
    },
    search::{match_score, rank, record_terms},
};

pub const SNAPSHOT_FILE: &str = "snapshot.bin";
pub const JOURNAL_FILE: &str = "journal.log";

#[derive(Default)]
struct Tables {
    records: BTreeMap<String, FileRecord>,
    /// parent_path -> child paths
    by_parent: HashMap<String, HashSet<String>>,
}

impl Tables {
    fn insert(&mut self, record: FileRecord) {
        if let Some(old) = self.records.get(&record.path)
            && old.parent_path != record.parent_path
        {
            let (old_parent, path) = (old.parent_path.clone(), record.path.clone());
            self.unlink(&old_parent, &path);
        }
        self.by_parent
            .entry(record.parent_path.clone())
            .or_default()
            .insert(record.path.clone());
        self.records.insert(record.path.clone(), record);
    }

    fn remove(&mut self, path: &str) -> bool {
        match self.records.remove(path) {
            Some(old) => {
                self.unlink(&old.parent_path, path);
                true
            }
            None => false,
        }
    }

    fn unlink(&mut self, parent: &str, path: &str) {
        if let Some(children) = self.by_parent.get_mut(parent) {
            children.remove(path);
            if children.is_empty() {
                self.by_parent.remove(parent);
            }
        }
    }

    fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Put(record) => self.insert(record),
            JournalEntry::Delete(path) => {
                self.remove(&path);
            }
        }
    }
}

struct Journal {
    file: File,
    path: PathBuf,
    snapshot_path: PathBuf,
    /// End of the last whole frame
    len: u64,
}

impl Journal {
    /// Append one frame. Bytes past `len` belong to no acknowledged write
    /// (a failed append left them there) and are cut before appending, so a
    /// later replay never stops short of a frame that was acknowledged.
    fn append(&mut self, frame: &[u8]) -> std::io::Result<()> {
        if self.file.metadata()?.len() != self.len {
            log::warn!(
                "[index] journal {} has bytes past its last frame; truncating to {}",
                self.path.display(),
                self.len
            );
            self.file.set_len(self.len)?;
        }

        if let Err(err) = self.file.write_all(frame) {
            // retried by the length check on the next append if this fails too
            if let Err(trunc) = self.file.set_len(self.len) {
                log::warn!("[index] cannot roll back journal {}: {trunc}", self.path.display());
            }
            return Err(err);
        }
        self.len += frame.len() as u64;
        Ok(())
    }
}

/// Document store backed by an in-memory ordered map, a snapshot file and an
/// append-only journal of mutations since that snapshot.
///
/// Lock order: journal mutex, then the table lock.
pub struct JournalStore {
    tables: RwLock<Tables>,
    /// `None` for in-memory stores
    journal: Mutex<Option<Journal>>,
}

impl JournalStore {
    /// Open the store in `dir`, creating it if absent. The journal is
    /// replayed over the snapshot, a torn tail is truncated, and the result
    /// is compacted into a fresh snapshot.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let journal_path = dir.join(JOURNAL_FILE);

        let mut tables = Tables::default();
        for record in read_snapshot(&snapshot_path)? {
            tables.insert(record);
        }

        let bytes = match fs::read(&journal_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let replay = decode_frames(&bytes);
        let replayed = replay.entries.len();
        for entry in replay.entries {
            tables.apply(entry);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)?;

        if let Some(reason) = replay.torn {
            log::warn!(
                "[index] journal {} has a damaged tail ({reason}); dropping {} bytes",
                journal_path.display(),
                bytes.len() - replay.valid_len
            );
            file.set_len(replay.valid_len as u64)?;
        }
        let len = replay.valid_len as u64;

        log::info!(
            "[index] opened {} ({} records, {replayed} journal entries replayed)",
            dir.display(),
            tables.records.len()
        );

        let store = Self {
            tables: RwLock::new(tables),
            journal: Mutex::new(Some(Journal {
                file,
                path: journal_path,
                snapshot_path,
                len,
            })),
        };
        store.sync()?;
        Ok(store)
    }

    /// A store with no backing files.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            journal: Mutex::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `entry` to the journal (if any), then apply it to the tables.
    fn commit(&self, key: &str, entry: JournalEntry) -> Result<(), StoreError> {
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(journal) = journal.as_mut() {
            let frame = encode_frame(&entry).map_err(|source| StoreError::Write {
                path: key.to_string(),
                source,
            })?;
            journal
                .append(&frame)
                .map_err(|source| StoreError::Write {
                    path: key.to_string(),
                    source,
                })?;
        }

        self.write().apply(entry);
        Ok(())
    }
}

impl DocumentStore for JournalStore {
    fn get(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.read().records.get(path).cloned())
    }

    fn put(&self, record: FileRecord) -> Result<(), StoreError> {
        let key = record.path.clone();
        self.commit(&key, JournalEntry::Put(record))
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        if !self.read().records.contains_key(path) {
            return Ok(false);
        }
        self.commit(path, JournalEntry::Delete(path.to_string()))?;
        Ok(true)
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<FileRecord>, StoreError> {
        Ok(self
            .read()
            .records
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn children(&self, parent_path: &str) -> Result<Vec<FileRecord>, StoreError> {
        let tables = self.read();
        let Some(paths) = tables.by_parent.get(parent_path) else {
            return Ok(Vec::new());
        };

        let mut children: Vec<FileRecord> = paths
            .iter()
            .filter_map(|p| tables.records.get(p))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    fn search(
        &self,
        terms: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<FileRecord>, usize), StoreError> {
        if terms.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let mut hits: Vec<(usize, FileRecord)> = self
            .read()
            .records
            .values()
            .filter_map(|record| {
                let score = match_score(&record_terms(record), terms);
                (score > 0).then(|| (score, record.clone()))
            })
            .collect();

        let total = hits.len();
        rank(&mut hits);
        let page = hits
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, r)| r)
            .collect();
        Ok((page, total))
    }

    fn len(&self) -> usize {
        self.read().records.len()
    }

    /// Compact: write a fresh snapshot and truncate the journal.
    fn sync(&self) -> Result<(), StoreError> {
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(journal) = journal.as_mut() else {
            return Ok(());
        };

        {
            let tables = self.read();
            write_snapshot_atomic(&journal.snapshot_path, tables.records.values())?;
        }

        journal.file.set_len(0)?;
        journal.file.seek(SeekFrom::Start(0))?;
        journal.file.sync_all()?;
        journal.len = 0;

        log::debug!(
            "[index] compacted into {}, journal {} truncated",
            journal.snapshot_path.display(),
            journal.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
