mod helpers;

use helpers::test_store;

#[test]
fn exact_text_finds_itself() {
    let store = test_store();
    store.store("the cat sat on the mat").unwrap();

    let found = store.retrieve("the cat sat on the mat", 1).unwrap();
    assert_eq!(found, vec!["the cat sat on the mat".to_string()]);
}

#[test]
fn unrelated_query_finds_nothing() {
    let store = test_store();
    store.store("the cat sat on the mat").unwrap();

    let found = store.retrieve("quarterly revenue projections spreadsheet", 1).unwrap();
    assert!(found.is_empty());
}

#[test]
fn empty_query_finds_nothing() {
    let store = test_store();
    store.store("the cat sat on the mat").unwrap();
    assert!(store.retrieve("", 3).unwrap().is_empty());
    assert!(store.retrieve("   ", 3).unwrap().is_empty());
}

#[test]
fn empty_store_finds_nothing() {
    let store = test_store();
    assert!(store.retrieve("the cat sat on the mat", 5).unwrap().is_empty());
}

#[test]
fn top_k_bounds_the_result() {
    let store = test_store();
    store.store("the cat sat on the mat").unwrap();
    store.store("the cat sat on the mat today").unwrap();
    store.store("the cat sat on the red mat").unwrap();

    assert_eq!(store.retrieve("the cat sat on the mat", 1).unwrap().len(), 1);

    let found = store.retrieve("the cat sat on the mat", 3).unwrap();
    assert!(!found.is_empty() && found.len() <= 3);
    // nearest first
    assert_eq!(found[0], "the cat sat on the mat");
}
