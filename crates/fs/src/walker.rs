use std::{
    fs::{self, read_dir},
    io,
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};
use thiserror::Error;

use crate::{excludes::IgnoreEngine, snapshot::Snapshot};

/// What to do when a single entry cannot be read during a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkErrorPolicy {
    /// Stop the whole walk at the first unreadable entry.
    #[default]
    Abort,
    /// Log the entry, count it, and keep walking.
    Skip,
}

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("cannot stat scan root {}: {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {}: {source}", path.display())]
    Entry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("walk interrupted by visitor")]
    Interrupted,
}

#[derive(Clone, Default)]
pub struct WalkOptions {
    /// Deepest level visited; the root is level 0.
    pub max_depth: usize,
    pub on_error: WalkErrorPolicy,
    pub ignore: Option<Arc<IgnoreEngine>>,
    /// Exact paths left out of the walk, subtree included.
    pub skip_paths: Vec<PathBuf>,
}

impl WalkOptions {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Entries handed to the visitor
    pub visited: usize,
    /// Entries dropped under `WalkErrorPolicy::Skip`
    pub skipped: usize,
}

/// Depth-first walk of `root`, handing a [`Snapshot`] of every entry
/// (the root included) to `visit`.
///
/// Symlinks are reported but never followed. Children of one directory are
/// visited in name order. Returning `ControlFlow::Break` from the visitor
/// stops the walk with [`WalkError::Interrupted`].
pub fn walk<F>(root: &Path, opts: &WalkOptions, mut visit: F) -> Result<WalkSummary, WalkError>
where
    F: FnMut(Snapshot) -> ControlFlow<()>,
{
    let mut summary = WalkSummary::default();

    // The root itself is resolved through symlinks so a linked scope works.
    let root_meta = fs::metadata(root).map_err(|source| WalkError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    let root_snapshot = Snapshot::from_metadata(root, &root_meta).ok_or_else(|| WalkError::Root {
        path: root.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
    })?;

    summary.visited += 1;
    if visit(root_snapshot).is_break() {
        return Err(WalkError::Interrupted);
    }

    let mut stack: Vec<(PathBuf, usize)> = Vec::new();
    if root_meta.is_dir() && opts.max_depth > 0 {
        stack.push((root.to_path_buf(), 0));
    }

    while let Some((dir, depth)) = stack.pop() {
        let entries = match read_sorted(&dir) {
            Ok(entries) => entries,
            Err(source) => {
                on_entry_error(opts.on_error, WalkError::Entry { path: dir, source }, &mut summary)?;
                continue;
            }
        };

        let child_depth = depth + 1;
        let mut subdirs = Vec::new();

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    on_entry_error(opts.on_error, err, &mut summary)?;
                    continue;
                }
            };

            if opts.skip_paths.contains(&path) {
                debug!("[walk] leaving out {}", path.display());
                continue;
            }

            let snapshot = match Snapshot::capture(&path) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    debug!("[walk] skipping non UTF-8 path {:?}", path);
                    continue;
                }
                Err(source) => {
                    on_entry_error(opts.on_error, WalkError::Entry { path, source }, &mut summary)?;
                    continue;
                }
            };

            let is_dir = snapshot.is_dir;
            if let Some(ignore) = &opts.ignore
                && ignore.is_ignored(&path, is_dir)
            {
                continue;
            }

            summary.visited += 1;
            if visit(snapshot).is_break() {
                return Err(WalkError::Interrupted);
            }

            if is_dir && child_depth < opts.max_depth {
                subdirs.push((path, child_depth));
            }
        }

        // Reverse so the stack pops subdirectories in name order.
        stack.extend(subdirs.into_iter().rev());
    }

    Ok(summary)
}

/// List a directory, sorted by file name. Per-entry read errors are kept in
/// place so the caller can apply its error policy to them.
fn read_sorted(dir: &Path) -> io::Result<Vec<Result<PathBuf, WalkError>>> {
    let mut entries: Vec<Result<PathBuf, WalkError>> = read_dir(dir)?
        .map(|res| {
            res.map(|e| e.path()).map_err(|source| WalkError::Entry {
                path: dir.to_path_buf(),
                source,
            })
        })
        .collect();

    entries.sort_by(|a, b| match (a, b) {
        (Ok(a), Ok(b)) => a.file_name().cmp(&b.file_name()),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => std::cmp::Ordering::Equal,
    });

    Ok(entries)
}

fn on_entry_error(
    policy: WalkErrorPolicy,
    err: WalkError,
    summary: &mut WalkSummary,
) -> Result<(), WalkError> {
    match policy {
        WalkErrorPolicy::Abort => Err(err),
        WalkErrorPolicy::Skip => {
            warn!("[walk] skipping entry: {err}");
            summary.skipped += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
