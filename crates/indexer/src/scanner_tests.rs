use super::*;
use crate::{
    backup::RequestLog,
    dispatcher::{Dispatcher, Handlers},
    reconciler::Reconciler,
};
use backdex_engine::{DocumentStore, IndexStore, JournalStore, StoreError};
use backdex_protocol::{BackupState, FileRecord};
use std::{fs, thread};

const POLL: Duration = Duration::from_millis(5);

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<IndexStore>,
    scanner: Scanner,
}

fn harness(options: ScanOptions) -> Harness {
    harness_over(IndexStore::in_memory(), options)
}

fn harness_over(store: IndexStore, options: ScanOptions) -> Harness {
    let store = Arc::new(store);
    let dispatcher = Dispatcher::start(
        Handlers {
            store: Arc::clone(&store),
            backup: Arc::new(RequestLog::new()),
        },
        4,
    );
    let scanner = Scanner::new(dispatcher.handle(), Arc::new(ScanGuard::new()), POLL, options);
    Harness {
        dispatcher,
        store,
        scanner,
    }
}

fn key(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

#[test]
fn scan_edit_delete_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let file = root.join("a.txt");
    fs::write(&file, [b'x'; 10]).unwrap();

    let h = harness(ScanOptions::default());
    let reconciler = Reconciler::new(Arc::clone(&h.store));

    let first = h.scanner.scan(root, usize::MAX).unwrap();
    assert_eq!(first.dispatched, 2, "root and a.txt");
    assert_eq!(first.created, 2);
    let record = h.store.get(&key(&file)).unwrap();
    assert_eq!(record.backup_state, BackupState::NoBackup);
    assert_eq!(record.size, 10);
    assert!(!record.is_dir);

    fs::write(&file, [b'y'; 20]).unwrap();
    let second = h.scanner.scan(root, usize::MAX).unwrap();
    assert!(second.marked_stale >= 1);
    let record = h.store.get(&key(&file)).unwrap();
    assert_eq!(record.backup_state, BackupState::Stale);
    assert_eq!(record.size, 20);

    fs::remove_file(&file).unwrap();
    // nothing is pruned until a sweep runs
    assert!(h.store.get(&key(&file)).is_ok());

    let sweep = reconciler.sweep().unwrap();
    assert_eq!(sweep.removed, 1);
    let listed = h.store.list_paged(1, 100).unwrap();
    assert!(listed.files.iter().all(|r| r.path != key(&file)));
    assert_eq!(listed.files.len(), 1);

    h.dispatcher.shutdown();
}

#[test]
fn rescanning_an_unchanged_tree_mutates_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/b.txt"), b"bb").unwrap();
    fs::write(root.join("c.txt"), b"c").unwrap();

    let h = harness(ScanOptions::default());
    h.scanner.scan(root, usize::MAX).unwrap();
    let before = h.store.list_paged(1, 100).unwrap().files;

    let again = h.scanner.scan(root, usize::MAX).unwrap();
    assert_eq!(again.dispatched, 4);
    assert_eq!(again.unchanged, 4);
    assert_eq!(again.created + again.marked_stale + again.failed, 0);

    let after = h.store.list_paged(1, 100).unwrap().files;
    assert_eq!(before, after, "revisions and states must be untouched");

    h.dispatcher.shutdown();
}

#[test]
fn max_depth_bounds_the_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::write(root.join("a/b/deep.txt"), b"d").unwrap();

    let h = harness(ScanOptions::default());
    let report = h.scanner.scan(root, 1).unwrap();

    assert_eq!(report.dispatched, 2, "root and a/");
    assert!(h.store.get(&key(&root.join("a/b"))).unwrap_err().is_not_found());

    h.dispatcher.shutdown();
}

#[test]
fn in_flight_bound_still_acknowledges_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    for i in 0..50 {
        fs::write(root.join(format!("f{i:02}")), b"x").unwrap();
    }

    let h = harness(ScanOptions {
        max_in_flight: Some(1),
        ..ScanOptions::default()
    });
    let report = h.scanner.scan(root, usize::MAX).unwrap();

    assert_eq!(report.dispatched, 51);
    assert_eq!(report.created, 51);
    assert_eq!(h.store.len(), 51);

    h.dispatcher.shutdown();
}

#[test]
fn unreadable_root_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(ScanOptions::default());

    let err = h.scanner.scan(&tmp.path().join("missing"), usize::MAX).unwrap_err();
    assert!(format!("{err:#}").contains("cannot scan"), "{err:#}");

    h.dispatcher.shutdown();
}

#[test]
fn closed_dispatcher_aborts_the_walk() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a"), b"a").unwrap();

    let h = harness(ScanOptions::default());
    h.dispatcher.shutdown();

    let report = h.scanner.scan(tmp.path(), usize::MAX).unwrap();
    assert_eq!(report.dispatched, 1, "the root was handed over before the refusal");
    assert_eq!(report.failed, 1);
    assert_eq!(report.aborted.as_deref(), Some("dispatcher is shut down"));
}

#[test]
fn rescan_covers_path_and_direct_children_only() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("docs/old")).unwrap();
    fs::write(root.join("docs/new.txt"), b"n").unwrap();
    fs::write(root.join("docs/old/x.txt"), b"x").unwrap();

    let h = harness(ScanOptions::default());
    let report = h.scanner.rescan(&root.join("docs")).unwrap();

    assert_eq!(report.dispatched, 3, "docs, docs/new.txt, docs/old");
    assert!(h.store.get(&key(&root.join("docs/new.txt"))).is_ok());
    assert!(h.store.get(&key(&root.join("docs/old/x.txt"))).is_err());
    assert_eq!(h.scanner.guard().holder(), None);

    h.dispatcher.shutdown();
}

#[test]
fn rescan_waits_for_a_running_sweep() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(ScanOptions::default());
    let guard = Arc::clone(h.scanner.guard());

    let sweep = guard.try_acquire(Activity::Sweep).unwrap();
    thread::scope(|s| {
        let rescan = s.spawn(|| h.scanner.rescan(tmp.path()));
        thread::sleep(Duration::from_millis(40));
        assert!(!rescan.is_finished());

        drop(sweep);
        let report = rescan.join().unwrap().unwrap();
        assert_eq!(report.dispatched, 1);
    });

    h.dispatcher.shutdown();
}

#[test]
fn index_inside_the_root_is_left_out() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(root.join("notes.txt"), b"notes").unwrap();
    let index_dir = root.join(".cache/backdex/files.index");

    let h = harness_over(
        IndexStore::open(&index_dir).unwrap(),
        ScanOptions {
            private_paths: vec![index_dir.clone()],
            ..ScanOptions::default()
        },
    );

    let first = h.scanner.scan(root, usize::MAX).unwrap();
    assert_eq!(first.created, 4, "root, .cache, .cache/backdex, notes.txt");
    h.store.sync().unwrap();

    // each pass rewrites snapshot.bin; none of that may reach the index
    for _ in 0..2 {
        let again = h.scanner.scan(root, usize::MAX).unwrap();
        h.store.sync().unwrap();
        assert_eq!(again.created + again.marked_stale, 0, "{again:?}");
        assert_eq!(again.unchanged, 4);
    }
    assert!(h.store.get(&key(&index_dir)).unwrap_err().is_not_found());

    h.dispatcher.shutdown();
}

/// root/
///   a_locked/    (mode 000)
///     hidden.txt
///   b/
///     inner.txt
///
/// Returns `None` when permissions are not enforced (running as root).
#[cfg(unix)]
fn tree_with_locked_dir() -> Option<(tempfile::TempDir, PathBuf)> {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let locked = root.join("a_locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("hidden.txt"), b"h").unwrap();
    fs::create_dir(root.join("b")).unwrap();
    fs::write(root.join("b/inner.txt"), b"i").unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return None;
    }
    Some((tmp, locked))
}

#[cfg(unix)]
fn unlock(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn abort_policy_stops_at_the_unreadable_dir() {
    let Some((tmp, locked)) = tree_with_locked_dir() else {
        return;
    };
    let root = tmp.path();

    let h = harness(ScanOptions::default());
    let report = h.scanner.scan(root, usize::MAX).unwrap();
    unlock(&locked);

    // root, a_locked and b were handed out before a_locked failed to list
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.created, 3);
    assert_eq!(report.failed, 0);
    let reason = report.aborted.expect("walk should have stopped");
    assert!(reason.contains("a_locked"), "{reason}");

    assert_eq!(h.store.len(), 3);
    assert!(h.store.get(&key(&root.join("b/inner.txt"))).unwrap_err().is_not_found());

    h.dispatcher.shutdown();
}

#[cfg(unix)]
#[test]
fn skip_policy_keeps_walking_past_the_unreadable_dir() {
    let Some((tmp, locked)) = tree_with_locked_dir() else {
        return;
    };
    let root = tmp.path();

    let h = harness(ScanOptions {
        on_error: WalkErrorPolicy::Skip,
        ..ScanOptions::default()
    });
    let report = h.scanner.scan(root, usize::MAX).unwrap();
    unlock(&locked);

    assert_eq!(report.aborted, None);
    assert_eq!(report.skipped_entries, 1);
    assert_eq!(report.dispatched, 4);
    assert_eq!(report.created, 4);
    assert!(h.store.get(&key(&root.join("b/inner.txt"))).is_ok());
    assert!(h.store.get(&key(&locked.join("hidden.txt"))).is_err());

    h.dispatcher.shutdown();
}

/// Panics when asked to store any path ending in `poison`.
struct PanicOnPoison(JournalStore);

impl DocumentStore for PanicOnPoison {
    fn get(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        self.0.get(path)
    }
    fn put(&self, record: FileRecord) -> Result<(), StoreError> {
        assert!(!record.path.ends_with("poison"), "refusing {}", record.path);
        self.0.put(record)
    }
    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        self.0.delete(path)
    }
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<FileRecord>, StoreError> {
        self.0.list(offset, limit)
    }
    fn children(&self, parent: &str) -> Result<Vec<FileRecord>, StoreError> {
        self.0.children(parent)
    }
    fn search(
        &self,
        terms: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<FileRecord>, usize), StoreError> {
        self.0.search(terms, offset, limit)
    }
    fn len(&self) -> usize {
        self.0.len()
    }
    fn sync(&self) -> Result<(), StoreError> {
        self.0.sync()
    }
}

#[test]
fn panicking_handler_still_acknowledges_under_in_flight_bound() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(root.join("a"), b"a").unwrap();
    fs::write(root.join("b.poison"), b"b").unwrap();
    fs::write(root.join("c"), b"c").unwrap();

    let h = harness_over(
        IndexStore::new(PanicOnPoison(JournalStore::in_memory())),
        ScanOptions {
            max_in_flight: Some(1),
            ..ScanOptions::default()
        },
    );

    // the panicking upsert drops its reply; without an answer the bound
    // of one would wait forever before dispatching `c`
    let report = h.scanner.scan(root, usize::MAX).unwrap();

    assert_eq!(report.dispatched, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 3);
    assert!(h.store.get(&key(&root.join("c"))).is_ok());

    h.dispatcher.shutdown();
}
