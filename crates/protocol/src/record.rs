use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a file stands relative to its last backup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupState {
    /// Indexed but never backed up
    #[default]
    NoBackup,
    /// Changed on disk since it was first indexed or last backed up
    Stale,
    /// Backed up and unchanged since
    Latest,
}

impl BackupState {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupState::NoBackup => "no_backup",
            BackupState::Stale => "stale",
            BackupState::Latest => "latest",
        }
    }
}

/// One indexed filesystem entry, keyed by `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub parent_path: String,
    pub size: u64,
    pub is_dir: bool,
    pub mod_time: DateTime<Utc>,
    pub mode: u32,
    pub mode_string: String,
    pub backup_state: BackupState,
    /// 1 when created, bumped on every replacement
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePage {
    pub files: Vec<FileRecord>,
    pub page: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub files: Vec<FileRecord>,
    /// Matches across all pages
    pub total: usize,
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirListing {
    pub items: Vec<FileRecord>,
    pub num_dirs: usize,
    pub num_files: usize,
}

impl DirListing {
    pub fn from_items(items: Vec<FileRecord>) -> Self {
        let num_dirs = items.iter().filter(|r| r.is_dir).count();
        let num_files = items.len() - num_dirs;
        Self {
            items,
            num_dirs,
            num_files,
        }
    }
}
