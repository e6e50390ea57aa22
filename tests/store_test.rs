mod helpers;

use helpers::{file_store, test_store};
use memoryd::memory::{content_id, StoreError};
use tempfile::TempDir;

#[test]
fn store_saves_one_record() {
    let store = test_store();
    let stored = store.store("the deploy script lives in ops/deploy.sh").unwrap();
    assert_eq!(stored.id, content_id("the deploy script lives in ops/deploy.sh"));
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn storing_the_same_text_twice_keeps_one_record() {
    let store = test_store();
    let a = store.store("standup moved to ten thirty").unwrap();
    let b = store.store("  standup moved to ten thirty\n").unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn rejected_input_is_not_stored() {
    let store = test_store();

    assert!(matches!(store.store("   "), Err(StoreError::EmptyInput)));
    assert!(matches!(
        store.store("where is the deploy script?"),
        Err(StoreError::InterrogativeInput)
    ));
    assert!(matches!(store.store("two words"), Err(StoreError::TooShort)));

    assert!(store.is_empty().unwrap());
}

#[test]
fn memories_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("memory.db");

    {
        let store = file_store(&db_path);
        store.store("the staging database is read only").unwrap();
    }

    let store = file_store(&db_path);
    assert_eq!(store.len().unwrap(), 1);
    let found = store.retrieve("the staging database is read only", 1).unwrap();
    assert_eq!(found, vec!["the staging database is read only".to_string()]);
}
