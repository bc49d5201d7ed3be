use super::*;
use crate::{
    backup::RequestLog,
    dispatcher::{Dispatcher, Handlers},
    scanner::ScanOptions,
};
use std::{fs, time::Instant};

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn start(root: PathBuf, interval: Duration) -> (Watcher, Dispatcher, Arc<IndexStore>) {
    let store = Arc::new(IndexStore::in_memory());
    let dispatcher = Dispatcher::start(
        Handlers {
            store: Arc::clone(&store),
            backup: Arc::new(RequestLog::new()),
        },
        2,
    );
    let guard_poll = Duration::from_millis(5);
    let scanner = Arc::new(Scanner::new(
        dispatcher.handle(),
        Arc::new(ScanGuard::new()),
        guard_poll,
        ScanOptions::default(),
    ));
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&store)));

    let config = WatchConfig {
        root,
        max_depth: usize::MAX,
        scan_interval: interval,
        sweep_interval: interval,
        guard_poll,
    };
    let watcher = Watcher::spawn(config, scanner, reconciler, Arc::clone(&store));
    (watcher, dispatcher, store)
}

#[test]
fn loops_index_new_files_and_prune_deleted_ones() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("a.txt");
    fs::write(&file, b"hello").unwrap();
    let key = file.to_str().unwrap().to_string();

    let (watcher, dispatcher, store) = start(tmp.path().to_path_buf(), Duration::from_millis(20));

    assert!(wait_until(Duration::from_secs(5), || store.get(&key).is_ok()));

    fs::remove_file(&file).unwrap();
    assert!(wait_until(Duration::from_secs(5), || store
        .get(&key)
        .is_err_and(|e| e.is_not_found())));

    watcher.stop();
    dispatcher.shutdown();
}

#[test]
fn stop_does_not_wait_out_the_interval() {
    let tmp = tempfile::tempdir().unwrap();
    let (watcher, dispatcher, store) = start(tmp.path().to_path_buf(), Duration::from_secs(3600));

    assert!(wait_until(Duration::from_secs(5), || !store.is_empty()));

    let started = Instant::now();
    watcher.stop();
    assert!(started.elapsed() < Duration::from_secs(5));

    dispatcher.shutdown();
}
