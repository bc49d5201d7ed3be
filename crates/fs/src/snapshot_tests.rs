use super::*;

use std::{
    fs::{File, create_dir, write},
    time::Duration,
};

#[test]
fn to_utc_handles_missing_and_known_times() {
    let cases: &[(Option<SystemTime>, i64)] = &[
        (None, 0),
        (Some(UNIX_EPOCH), 0),
        (Some(UNIX_EPOCH + Duration::from_secs(42)), 42),
        (Some(UNIX_EPOCH + Duration::from_millis(1_500)), 1),
    ];

    for (input, expected) in cases {
        let got = to_utc(*input).timestamp();
        assert_eq!(got, *expected, "to_utc({:?})", input);
    }
}

#[test]
fn capture_regular_file() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let file_path = tmp.path().join("a.txt");
    write(&file_path, b"0123456789").expect("write file");

    let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    File::options()
        .write(true)
        .open(&file_path)
        .and_then(|f| f.set_modified(mtime))
        .expect("set mtime");

    let snap = Snapshot::capture(&file_path)
        .expect("stat file")
        .expect("utf-8 path");

    assert_eq!(snap.path, file_path.to_str().unwrap());
    assert_eq!(snap.name, "a.txt");
    assert_eq!(snap.parent_path, tmp.path().to_str().unwrap());
    assert_eq!(snap.size, 10);
    assert!(!snap.is_dir);
    assert_eq!(snap.mod_time.timestamp(), 1_700_000_000);
    assert!(snap.mode_string.starts_with('-'));
}

#[test]
fn capture_directory() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let dir = tmp.path().join("sub");
    create_dir(&dir).expect("create dir");

    let snap = Snapshot::capture(&dir).expect("stat dir").expect("utf-8 path");

    assert!(snap.is_dir);
    assert_eq!(snap.name, "sub");
    assert!(snap.mode_string.starts_with('d'));
}

#[test]
fn capture_missing_path_is_not_found() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let err = Snapshot::capture(&tmp.path().join("nope")).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}

#[cfg(unix)]
#[test]
fn capture_does_not_follow_symlinks() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let target = tmp.path().join("target");
    create_dir(&target).expect("create target");
    let link = tmp.path().join("link");
    std::os::unix::fs::symlink(&target, &link).expect("symlink");

    let snap = Snapshot::capture(&link).expect("stat link").expect("utf-8 path");
    assert!(!snap.is_dir);
    assert!(snap.mode_string.starts_with('l'));
}

#[cfg(unix)]
#[test]
fn root_path_is_its_own_parent() {
    let meta = fs::metadata("/").expect("stat /");
    let snap = Snapshot::from_metadata(Path::new("/"), &meta).expect("utf-8");
    assert_eq!(snap.name, "/");
    assert_eq!(snap.parent_path, "/");
}
