//! Integration tests for the file-backed store.

use std::fs;

use tokenward_store::{FileStore, KeyValueStore, StoreError};

#[test]
fn test_missing_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("session.json"));
    assert_eq!(store.get_item("tokenward.loginToken").unwrap(), None);
    // Reading must not create the file.
    assert!(!store.path().exists());
}

#[test]
fn test_set_get_remove_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("session.json"));

    store.set_item("tokenward.userId", "u1").unwrap();
    store.set_item("tokenward.loginToken", "tok1").unwrap();
    assert_eq!(store.get_item("tokenward.userId").unwrap().as_deref(), Some("u1"));
    assert_eq!(store.get_item("tokenward.loginToken").unwrap().as_deref(), Some("tok1"));

    store.remove_item("tokenward.loginToken").unwrap();
    assert_eq!(store.get_item("tokenward.loginToken").unwrap(), None);
    assert_eq!(store.get_item("tokenward.userId").unwrap().as_deref(), Some("u1"));
}

#[test]
fn test_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("a").join("b").join("session.json"));
    store.set_item("k", "v").unwrap();
    assert!(store.path().exists());
}

#[test]
fn test_two_handles_observe_each_others_writes() {
    // Two processes (tabs) pointed at the same file.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let tab_a = FileStore::open(&path);
    let tab_b = FileStore::open(&path);

    tab_a.set_item("tokenward.loginToken", "tokA").unwrap();
    assert_eq!(tab_b.get_item("tokenward.loginToken").unwrap().as_deref(), Some("tokA"));

    tab_b.remove_item("tokenward.loginToken").unwrap();
    assert_eq!(tab_a.get_item("tokenward.loginToken").unwrap(), None);
}

#[test]
fn test_no_temp_files_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("session.json"));
    for i in 0..5 {
        store.set_item("k", &i.to_string()).unwrap();
    }
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["session.json".to_string()]);
}

#[test]
fn test_corrupt_document_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    fs::write(&path, b"{ this is not json").unwrap();

    let store = FileStore::open(&path);
    let err = store.get_item("k").unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}

#[test]
fn test_empty_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    fs::write(&path, b"\n").unwrap();

    let store = FileStore::open(&path);
    assert_eq!(store.get_item("k").unwrap(), None);
    store.set_item("k", "v").unwrap();
    assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v"));
}
