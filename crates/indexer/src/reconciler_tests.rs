use super::*;
use backdex_fs::Snapshot;
use std::path::Path;

fn index(store: &IndexStore, path: &Path) {
    let snap = Snapshot::capture(path).unwrap().unwrap();
    store.upsert(&snap).unwrap();
}

#[test]
fn only_vanished_paths_are_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let store = Arc::new(IndexStore::in_memory());

    for name in ["keep.txt", "gone.txt", "also-gone.txt"] {
        fs::write(root.join(name), name).unwrap();
        index(&store, &root.join(name));
    }
    fs::remove_file(root.join("gone.txt")).unwrap();
    fs::remove_file(root.join("also-gone.txt")).unwrap();

    let report = Reconciler::new(Arc::clone(&store)).sweep().unwrap();

    assert_eq!(report.checked, 3);
    assert_eq!(report.removed, 2);
    assert_eq!(report.unverified, 0);
    assert_eq!(store.len(), 1);
    assert!(store.get(root.join("keep.txt").to_str().unwrap()).is_ok());
}

#[test]
fn sweep_spans_pages_without_skipping_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let store = Arc::new(IndexStore::in_memory());

    for i in 0..25 {
        let path = root.join(format!("f{i:02}"));
        fs::write(&path, b"x").unwrap();
        index(&store, &path);
        // every other file disappears
        if i % 2 == 0 {
            fs::remove_file(&path).unwrap();
        }
    }

    let reconciler = Reconciler {
        page_size: 4,
        ..Reconciler::new(Arc::clone(&store))
    };
    let report = reconciler.sweep().unwrap();

    assert_eq!(report.checked, 25);
    assert_eq!(report.removed, 13);
    assert_eq!(store.len(), 12);
}

#[test]
fn a_file_where_a_directory_was_counts_as_gone() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let store = Arc::new(IndexStore::in_memory());

    fs::create_dir(root.join("d")).unwrap();
    fs::write(root.join("d/inner"), b"x").unwrap();
    index(&store, &root.join("d/inner"));

    fs::remove_dir_all(root.join("d")).unwrap();
    fs::write(root.join("d"), b"now a file").unwrap();

    let report = Reconciler::new(Arc::clone(&store)).sweep().unwrap();
    assert_eq!(report.removed, 1);
    assert!(store.is_empty());
}

#[cfg(unix)]
#[test]
fn dangling_symlinks_are_kept() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let store = Arc::new(IndexStore::in_memory());

    std::os::unix::fs::symlink(root.join("nowhere"), root.join("link")).unwrap();
    index(&store, &root.join("link"));

    let report = Reconciler::new(Arc::clone(&store)).sweep().unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(store.len(), 1);
}

#[test]
fn only_absence_means_gone() {
    let cases = [
        (io::ErrorKind::NotFound, true),
        (io::ErrorKind::NotADirectory, true),
        (io::ErrorKind::PermissionDenied, false),
        (io::ErrorKind::Other, false),
    ];

    for (kind, expected) in cases {
        assert_eq!(is_gone(&io::Error::from(kind)), expected, "{kind:?}");
    }
}

#[test]
fn empty_index_sweeps_cleanly() {
    let store = Arc::new(IndexStore::in_memory());
    let report = Reconciler::new(store).sweep().unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(report.removed, 0);
}
