use super::*;
use std::fs;
use tempfile::tempdir;

fn engine_with(root: &Path, patterns: &[&str]) -> IgnoreEngine {
    let opts = IgnoreOptions {
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        extra_ignore_files: Box::new([]),
    };
    IgnoreEngine::new(root, opts).expect("build ignore engine")
}

#[test]
fn empty_engine_ignores_nothing() {
    let tmp = tempdir().expect("create temp dir");
    let engine = IgnoreEngine::empty(tmp.path());

    assert!(engine.is_empty());
    assert!(!engine.is_ignored(&tmp.path().join("a.txt"), false));
}

#[test]
fn inline_patterns_match_files_and_directories() {
    let tmp = tempdir().expect("create temp dir");
    let root = tmp.path();
    let engine = engine_with(root, &["*.tmp", "node_modules/"]);

    assert!(engine.is_ignored(&root.join("scratch.tmp"), false));
    assert!(engine.is_ignored(&root.join("web/node_modules"), true));
    assert!(
        engine.is_ignored(&root.join("web/node_modules/pkg/index.js"), false),
        "children of an excluded directory are excluded too"
    );
    assert!(!engine.is_ignored(&root.join("notes.txt"), false));
}

#[test]
fn paths_outside_root_are_never_ignored() {
    let tmp = tempdir().expect("create temp dir");
    let engine = engine_with(&tmp.path().join("scope"), &["*.tmp"]);

    assert!(!engine.is_ignored(Path::new("/elsewhere/x.tmp"), false));
}

#[test]
fn extra_ignore_file_is_loaded() {
    let tmp = tempdir().expect("create temp dir");
    let root = tmp.path();
    let ignore_file = root.join("excludes");
    fs::write(&ignore_file, "*.bak\n").expect("write ignore file");

    let opts = IgnoreOptions {
        patterns: Vec::new(),
        extra_ignore_files: vec![ignore_file].into_boxed_slice(),
    };
    let engine = IgnoreEngine::new(root, opts).expect("build ignore engine");

    assert!(engine.is_ignored(&root.join("old.bak"), false));
    assert!(!engine.is_ignored(&root.join("old.txt"), false));
}

#[test]
fn invalid_pattern_is_reported() {
    let tmp = tempdir().expect("create temp dir");
    let opts = IgnoreOptions {
        patterns: vec!["a[".to_string()],
        extra_ignore_files: Box::new([]),
    };
    assert!(IgnoreEngine::new(tmp.path(), opts).is_err());
}
