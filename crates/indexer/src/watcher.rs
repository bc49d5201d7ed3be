use std::{
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use backdex_engine::IndexStore;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::{
    guard::{Activity, ScanGuard},
    reconciler::Reconciler,
    scanner::Scanner,
};

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub root: PathBuf,
    pub max_depth: usize,
    pub scan_interval: Duration,
    pub sweep_interval: Duration,
    pub guard_poll: Duration,
}

/// Periodic scan and sweep loops sharing one scan guard.
pub struct Watcher {
    stop: Option<Sender<()>>,
    threads: Vec<JoinHandle<()>>,
}

impl Watcher {
    /// Start both loops. Each runs once immediately, then every interval.
    pub fn spawn(
        config: WatchConfig,
        scanner: Arc<Scanner>,
        reconciler: Arc<Reconciler>,
        store: Arc<IndexStore>,
    ) -> Self {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let guard = Arc::clone(scanner.guard());
        let scan_loop = {
            let stop = stop_rx.clone();
            let store = Arc::clone(&store);
            let config = config.clone();
            thread::spawn(move || run_scan_loop(&config, &scanner, &store, &stop))
        };

        let sweep_loop = thread::spawn(move || {
            run_sweep_loop(&config, &guard, &reconciler, &store, &stop_rx)
        });

        Self {
            stop: Some(stop_tx),
            threads: vec![scan_loop, sweep_loop],
        }
    }

    /// Ask both loops to stop and wait for them. A pass already running is
    /// finished first.
    pub fn stop(mut self) {
        // receivers observe the disconnect
        drop(self.stop.take());
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("[watcher] periodic loop panicked");
            }
        }
    }
}

/// Wait out `interval`; `false` once a stop was requested.
fn pause(stop: &Receiver<()>, interval: Duration) -> bool {
    matches!(stop.recv_timeout(interval), Err(RecvTimeoutError::Timeout))
}

fn sync_store(store: &IndexStore) {
    if let Err(err) = store.sync() {
        log::warn!("[watcher] failed to persist index: {err}");
    }
}

fn run_scan_loop(config: &WatchConfig, scanner: &Scanner, store: &IndexStore, stop: &Receiver<()>) {
    loop {
        let Some(permit) = scanner
            .guard()
            .acquire_or_stop(Activity::Scan, config.guard_poll, stop)
        else {
            break;
        };

        if let Err(err) = scanner.scan(&config.root, config.max_depth) {
            log::warn!("[watcher] scan failed: {err:#}");
        }
        sync_store(store);
        drop(permit);

        if !pause(stop, config.scan_interval) {
            break;
        }
    }
    log::debug!("[watcher] scan loop stopped");
}

fn run_sweep_loop(
    config: &WatchConfig,
    guard: &ScanGuard,
    reconciler: &Reconciler,
    store: &IndexStore,
    stop: &Receiver<()>,
) {
    loop {
        let Some(permit) = guard.acquire_or_stop(Activity::Sweep, config.guard_poll, stop) else {
            break;
        };

        if let Err(err) = reconciler.sweep() {
            log::warn!("[watcher] sweep failed: {err}");
        }
        sync_store(store);
        drop(permit);

        if !pause(stop, config.sweep_interval) {
            break;
        }
    }
    log::debug!("[watcher] sweep loop stopped");
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
