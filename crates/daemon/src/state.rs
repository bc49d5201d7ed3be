use std::{path::Path, sync::Arc};

use anyhow::{Result, bail};
use backdex_engine::IndexStore;
use backdex_indexer::{
    Dispatcher, DispatcherHandle, Handlers, Reconciler, RequestLog, ScanGuard, ScanOptions,
    ScanReport, Scanner, WatchConfig, Watcher,
};
use backdex_protocol::{DaemonStatus, RescanSummary};

use crate::config::DaemonConfig;

pub struct DaemonState {
    pub config: DaemonConfig,
    pub store: Arc<IndexStore>,
    pub dispatcher: DispatcherHandle,
    scanner: Arc<Scanner>,
}

impl DaemonState {
    /// Wire the dispatcher and scanner around `store`. The returned
    /// [`Dispatcher`] owns the worker threads and must be shut down by the
    /// caller.
    pub fn new(config: DaemonConfig, store: Arc<IndexStore>) -> Result<(Self, Dispatcher)> {
        let options = ScanOptions {
            on_error: config.on_walk_error,
            ignore: config.ignore_engine()?,
            max_in_flight: config.max_in_flight,
            private_paths: config.private_paths(),
        };

        let handlers = Handlers {
            store: Arc::clone(&store),
            backup: Arc::new(RequestLog::new()),
        };
        let dispatcher = Dispatcher::start(handlers, config.workers);
        let scanner = Arc::new(Scanner::new(
            dispatcher.handle(),
            Arc::new(ScanGuard::new()),
            config.guard_poll,
            options,
        ));

        let state = Self {
            config,
            store,
            dispatcher: dispatcher.handle(),
            scanner,
        };
        Ok((state, dispatcher))
    }

    /// Start the periodic scan and sweep loops.
    pub fn spawn_watcher(&self) -> Watcher {
        let config = WatchConfig {
            root: self.config.root.clone(),
            max_depth: self.config.max_depth,
            scan_interval: self.config.scan_interval,
            sweep_interval: self.config.sweep_interval,
            guard_poll: self.config.guard_poll,
        };
        Watcher::spawn(
            config,
            Arc::clone(&self.scanner),
            Arc::new(Reconciler::new(Arc::clone(&self.store))),
            Arc::clone(&self.store),
        )
    }

    pub fn status(&self) -> DaemonStatus {
        DaemonStatus {
            root: self.config.root.display().to_string(),
            index_path: self.config.index_path.display().to_string(),
            records: self.store.len(),
            busy_with: self
                .scanner
                .guard()
                .holder()
                .map(|a| a.as_str().to_string()),
        }
    }

    /// Refresh one path and its direct children.
    pub fn rescan(&self, path: &str) -> Result<RescanSummary> {
        let target = Path::new(path);
        if !target.is_absolute() {
            bail!("rescan path must be absolute: {path}");
        }

        let report = self.scanner.rescan(target)?;
        Ok(summarize(path, report))
    }
}

fn summarize(path: &str, report: ScanReport) -> RescanSummary {
    RescanSummary {
        path: path.to_string(),
        dispatched: report.dispatched,
        created: report.created,
        marked_stale: report.marked_stale,
        unchanged: report.unchanged,
        failed: report.failed,
        aborted: report.aborted,
    }
}
