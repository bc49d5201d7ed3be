pub mod codec;
mod record;

use serde::{Deserialize, Serialize};

pub use record::{BackupState, DirListing, FilePage, FileRecord, SearchResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescanSummary {
    pub path: String,
    pub dispatched: usize,
    pub created: usize,
    pub marked_stale: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Set when the walk stopped early
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub root: String,
    pub index_path: String,
    pub records: usize,
    /// "scan", "sweep" or `None` when idle
    pub busy_with: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum DaemonRequest {
    Ping,
    Status,
    ListFiles { page: usize },
    Search { query: String, page: usize },
    Backup,
    GetFile { path: String },
    ListDir { path: String },
    Rescan { path: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub enum DaemonResponse {
    Pong,
    Status(DaemonStatus),
    Files(FilePage),
    Search(SearchResult),
    Backup(String),
    File(FileRecord),
    Dir(DirListing),
    Rescan(RescanSummary),
    Error(String),
}
