use std::{
    fs, io,
    sync::Arc,
    time::{Duration, Instant},
};

use backdex_engine::{IndexStore, StoreError};
use backdex_runtime::SWEEP_PAGE_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub removed: usize,
    /// Records kept because their path could not be checked
    pub unverified: usize,
    pub failed_deletes: usize,
    pub elapsed: Duration,
}

/// Only a definite absence justifies dropping a record.
fn is_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Prunes index records whose files have disappeared.
pub struct Reconciler {
    store: Arc<IndexStore>,
    page_size: usize,
}

impl Reconciler {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self {
            store,
            page_size: SWEEP_PAGE_SIZE,
        }
    }

    /// Check every record against disk and delete the dangling ones.
    ///
    /// Deletions happen after the listing pass so paging offsets stay valid.
    /// The caller is expected to hold the scan guard.
    pub fn sweep(&self) -> Result<SweepReport, StoreError> {
        let started = Instant::now();
        let mut report = SweepReport::default();
        let mut doomed = Vec::new();

        log::info!("[sweep] scanning index");
        let mut page = 1;
        loop {
            let listing = self.store.list_paged(page, self.page_size)?;

            for record in listing.files {
                report.checked += 1;
                match fs::symlink_metadata(&record.path) {
                    Ok(_) => {}
                    Err(err) if is_gone(&err) => doomed.push(record.path),
                    Err(err) => {
                        report.unverified += 1;
                        log::warn!("[sweep] cannot check {}: {err}; keeping it", record.path);
                    }
                }
            }

            if !listing.has_more {
                break;
            }
            page += 1;
        }

        for path in doomed {
            match self.store.delete(&path) {
                Ok(true) => {
                    report.removed += 1;
                    log::info!("[sweep] removed {path}");
                }
                Ok(false) => {}
                Err(err) => {
                    report.failed_deletes += 1;
                    log::warn!("[sweep] error deleting {path} from index: {err}");
                }
            }
        }

        report.elapsed = started.elapsed();
        log::info!(
            "[sweep] checked {} records, removed {} in {:?}",
            report.checked,
            report.removed,
            report.elapsed
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
