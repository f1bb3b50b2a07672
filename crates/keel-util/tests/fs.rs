use keel_util::fs::{ensure_dir, find_ancestor_with, relative_files};

#[test]
fn finds_marker_in_ancestor() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("keel.toml"), "").unwrap();
    let nested = tmp.path().join("src").join("deep");
    std::fs::create_dir_all(&nested).unwrap();

    let found = find_ancestor_with(&nested, "keel.toml").unwrap();
    assert_eq!(found, tmp.path());
}

#[test]
fn missing_marker_returns_none() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(find_ancestor_with(tmp.path(), "keel.toml").is_none());
}

#[test]
fn ensure_dir_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("a").join("b");
    ensure_dir(&dir).unwrap();
    ensure_dir(&dir).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn relative_files_sorted_with_forward_slashes() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("lib/net45")).unwrap();
    std::fs::write(tmp.path().join("lib/net45/A.dll"), b"x").unwrap();
    std::fs::write(tmp.path().join("A.pkgspec"), b"x").unwrap();

    let files = relative_files(tmp.path()).unwrap();
    assert_eq!(files, vec!["A.pkgspec", "lib/net45/A.dll"]);
}
