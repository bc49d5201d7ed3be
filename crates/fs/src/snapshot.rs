use std::{
    fs::{self, Metadata},
    io,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};

use crate::mode::{mode_bits, render_mode};

/// Observable attributes of one filesystem entry at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Path as produced by the walk (absolute when the scan root is)
    pub path: String,
    /// Final path component
    pub name: String,
    /// Everything before the final component
    pub parent_path: String,
    pub size: u64,
    pub is_dir: bool,
    pub mod_time: DateTime<Utc>,
    /// Raw mode bits (st_mode on unix)
    pub mode: u32,
    /// `ls -l` style rendering of `mode`
    pub mode_string: String,
}

impl Snapshot {
    /// Build a snapshot from metadata that was already fetched.
    ///
    /// Returns `None` when the path is not valid UTF-8; the index is keyed by
    /// string paths and such entries are skipped.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Option<Self> {
        let path_str = path.to_str()?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path_str)
            .to_owned();

        // "/" is its own parent; a bare relative name lives in ".".
        let parent_path = match path.parent().and_then(|p| p.to_str()) {
            None => path_str.to_owned(),
            Some("") => ".".to_owned(),
            Some(parent) => parent.to_owned(),
        };

        let mode = mode_bits(metadata);

        Some(Self {
            path: path_str.to_owned(),
            name,
            parent_path,
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            mod_time: to_utc(metadata.modified().ok()),
            mode,
            mode_string: render_mode(mode),
        })
    }

    /// Stat `path` without following a trailing symlink.
    pub fn capture(path: &Path) -> io::Result<Option<Self>> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(Self::from_metadata(path, &metadata))
    }
}

/// Modification times that cannot be read collapse to the Unix epoch.
pub(crate) fn to_utc(t: Option<SystemTime>) -> DateTime<Utc> {
    DateTime::<Utc>::from(t.unwrap_or(UNIX_EPOCH))
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
