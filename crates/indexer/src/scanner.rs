use std::{
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use backdex_engine::UpsertOutcome;
use backdex_fs::{IgnoreEngine, WalkError, WalkErrorPolicy, WalkOptions, walk};
use backdex_runtime::PROGRESS_LOG_INTERVAL;
use crossbeam::channel;

use crate::{
    dispatcher::{Command, DispatchError, DispatcherHandle, Reply, UpsertAck},
    guard::{Activity, ScanGuard},
};

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub on_error: WalkErrorPolicy,
    pub ignore: Option<Arc<IgnoreEngine>>,
    /// Dispatched-but-unacknowledged upserts allowed at once; `None` is
    /// unbounded.
    pub max_in_flight: Option<usize>,
    /// Paths never indexed, such as the index's own directory when it lives
    /// under the scanned root. A directory listed here is not descended.
    pub private_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub root: PathBuf,
    pub dispatched: usize,
    pub created: usize,
    pub marked_stale: usize,
    pub unchanged: usize,
    /// Upserts that failed or were never answered
    pub failed: usize,
    /// Entries dropped under [`WalkErrorPolicy::Skip`]
    pub skipped_entries: usize,
    /// Why the walk stopped early
    pub aborted: Option<String>,
    pub elapsed: Duration,
}

impl ScanReport {
    fn acknowledged(&self) -> usize {
        self.created + self.marked_stale + self.unchanged + self.failed
    }

    fn absorb(&mut self, ack: UpsertAck) {
        match ack {
            Ok(UpsertOutcome::Created) => self.created += 1,
            Ok(UpsertOutcome::MarkedStale) => self.marked_stale += 1,
            Ok(UpsertOutcome::Unchanged) => self.unchanged += 1,
            Err(_) => self.failed += 1,
        }

        let acked = self.acknowledged();
        if acked % PROGRESS_LOG_INTERVAL == 0 {
            log::info!("[scanner] {acked}/{} paths processed", self.dispatched);
        }
    }
}

/// Walks a tree and fans each entry out to the dispatcher as an upsert,
/// then waits for every one of them to be acknowledged.
pub struct Scanner {
    dispatcher: DispatcherHandle,
    guard: Arc<ScanGuard>,
    guard_poll: Duration,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(
        dispatcher: DispatcherHandle,
        guard: Arc<ScanGuard>,
        guard_poll: Duration,
        options: ScanOptions,
    ) -> Self {
        Self {
            dispatcher,
            guard,
            guard_poll,
            options,
        }
    }

    pub fn guard(&self) -> &Arc<ScanGuard> {
        &self.guard
    }

    /// Scan `root` down to `max_depth` levels (the root itself is level 0).
    ///
    /// The caller is expected to hold the scan guard. A root that cannot be
    /// read is an error; a walk that stops part way is reported in
    /// [`ScanReport::aborted`] after the entries dispatched so far are
    /// acknowledged.
    pub fn scan(&self, root: &Path, max_depth: usize) -> Result<ScanReport> {
        let started = Instant::now();
        log::info!("[scanner] walking {}", root.display());

        let walk_opts = WalkOptions {
            max_depth,
            on_error: self.options.on_error,
            ignore: self.options.ignore.clone(),
            skip_paths: self.options.private_paths.clone(),
        };

        let mut report = ScanReport {
            root: root.to_path_buf(),
            ..ScanReport::default()
        };
        let (ack_tx, ack_rx) = channel::unbounded::<UpsertAck>();
        let mut stopped_by: Option<String> = None;

        let walked = walk(root, &walk_opts, |snapshot| {
            if let Some(limit) = self.options.max_in_flight {
                while report.dispatched - report.acknowledged() >= limit.max(1) {
                    match ack_rx.recv() {
                        Ok(ack) => report.absorb(ack),
                        Err(_) => break,
                    }
                }
            }

            // Every reply answers exactly once, even when its command is
            // rejected, discarded or panics, so the entry counts as
            // dispatched before it is submitted.
            let cmd = Command::UpdateFileInfo {
                snapshot,
                reply: Reply::or_else(ack_tx.clone(), || Err(DispatchError::Dropped)),
            };
            report.dispatched += 1;
            match self.dispatcher.submit(cmd) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => {
                    log::warn!("[scanner] {err}; stopping walk");
                    stopped_by = Some(err.to_string());
                    ControlFlow::Break(())
                }
            }
        });

        match walked {
            Ok(summary) => {
                report.skipped_entries = summary.skipped;
                log::info!("[scanner] {} paths scheduled for processing", report.dispatched);
            }
            Err(err @ WalkError::Root { .. }) => {
                return Err(err).with_context(|| format!("cannot scan {}", root.display()));
            }
            Err(err) => {
                let reason = stopped_by.unwrap_or_else(|| err.to_string());
                log::warn!("[scanner] walk of {} aborted: {reason}", root.display());
                report.aborted = Some(reason);
            }
        }

        // only replies hold senders now, so a lost reply cannot hang the join
        drop(ack_tx);
        while report.acknowledged() < report.dispatched {
            match ack_rx.recv() {
                Ok(ack) => report.absorb(ack),
                Err(_) => {
                    let missing = report.dispatched - report.acknowledged();
                    log::warn!("[scanner] {missing} updates were dropped without a reply");
                    report.failed += missing;
                }
            }
        }

        report.elapsed = started.elapsed();
        log::info!(
            "[scanner] {} paths processed in {:?} ({} new, {} stale, {} failed)",
            report.dispatched,
            report.elapsed,
            report.created,
            report.marked_stale,
            report.failed
        );
        Ok(report)
    }

    /// Refresh `path` and its direct children, waiting for the guard first.
    pub fn rescan(&self, path: &Path) -> Result<ScanReport> {
        let _permit = self.guard.acquire(Activity::Scan, self.guard_poll);
        self.scan(path, 1)
    }
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
