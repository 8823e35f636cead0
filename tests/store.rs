//! Integration Tests for the jsonkv store
//!
//! These tests drive the public API against real files in a temporary
//! directory and check what ends up on disk.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use jsonkv::{DbConfig, DbError, DbOptions, Store};

/// Test configuration helper
fn test_config(location: &Path) -> DbConfig {
    DbConfig::resolve(Some(&DbOptions {
        location: Some(location.to_path_buf()),
        idle_timeout_ms: Some(-1),
        flush_interval_ms: Some(-1),
        fallback: None,
    }))
}

fn read_file(path: &Path) -> Value {
    let bytes = std::fs::read(path).expect("database file missing");
    serde_json::from_slice(&bytes).expect("database file is not JSON")
}

#[tokio::test]
async fn test_unknown_database_reads_default_and_persists_empty_document() {
    let temp_dir = tempfile::tempdir().unwrap();
    let location = temp_dir.path().join("databases");
    let store = Store::new(test_config(&location));

    let value = store.read("new", "k", json!(42)).await.unwrap();
    assert_eq!(value, json!(42));

    let path = location.join("new.db.json");
    assert_eq!(store.path_for("new"), path);
    assert_eq!(std::fs::read(&path).unwrap(), b"{}");
}

#[tokio::test]
async fn test_write_read_and_file_layout() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::new(test_config(temp_dir.path()));

    store.write("inventory", "apples", &12).await.unwrap();
    store
        .write("inventory", "tags", &vec!["red", "green"])
        .await
        .unwrap();

    assert_eq!(
        store.read("inventory", "apples", Value::Null).await.unwrap(),
        json!(12)
    );
    assert_eq!(
        read_file(&temp_dir.path().join("inventory.db.json")),
        json!({"apples": 12, "tags": ["red", "green"]})
    );
}

#[tokio::test]
async fn test_reopen_in_fresh_store_sees_last_writes() {
    let temp_dir = tempfile::tempdir().unwrap();

    let store = Store::new(test_config(temp_dir.path()));
    store.write("db", "a", &1).await.unwrap();
    store.write("db", "b", &2).await.unwrap();
    store.write("db", "a", &3).await.unwrap();
    store.shutdown().await.unwrap();
    drop(store);

    let store = Store::new(test_config(temp_dir.path()));
    assert_eq!(store.read("db", "a", Value::Null).await.unwrap(), json!(3));
    assert_eq!(store.read("db", "b", Value::Null).await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_writing_same_value_twice_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::new(test_config(temp_dir.path()));

    store.write("once", "k", &json!({"x": [1, 2]})).await.unwrap();
    store.write("twice", "k", &json!({"x": [1, 2]})).await.unwrap();
    store.write("twice", "k", &json!({"x": [1, 2]})).await.unwrap();

    assert_eq!(
        std::fs::read(temp_dir.path().join("once.db.json")).unwrap(),
        std::fs::read(temp_dir.path().join("twice.db.json")).unwrap()
    );
}

#[tokio::test]
async fn test_databases_are_independent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::new(test_config(temp_dir.path()));

    let (a, b) = tokio::join!(store.write("left", "k", &"l"), store.write("right", "k", &"r"));
    a.unwrap();
    b.unwrap();

    store.close("left").await.unwrap();
    assert!(!store.is_open("left").await);
    assert!(store.is_open("right").await);
    assert_eq!(store.open_databases().await, vec!["right".to_string()]);
    assert_eq!(store.read("left", "k", Value::Null).await.unwrap(), json!("l"));
}

#[tokio::test]
async fn test_clones_share_state() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::new(test_config(temp_dir.path()));
    let other = store.clone();

    store.write("shared", "k", &true).await.unwrap();
    assert_eq!(other.read("shared", "k", Value::Null).await.unwrap(), json!(true));
}

#[tokio::test]
async fn test_location_under_a_file_fails_instantiation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let store = Store::new(test_config(&blocker.join("databases")));
    let err = store.write("db", "k", &1).await.unwrap_err();
    assert!(matches!(err, DbError::Instantiation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_idle_eviction_on_disk() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::new(DbConfig {
        idle_timeout: Some(Duration::from_millis(50)),
        ..test_config(temp_dir.path())
    });

    store.write("idle", "k", &"v").await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!store.is_open("idle").await);

    // Edit the file behind the store's back; the reload must see it
    std::fs::write(temp_dir.path().join("idle.db.json"), br#"{"k":"edited"}"#).unwrap();
    assert_eq!(
        store.read("idle", "k", Value::Null).await.unwrap(),
        json!("edited")
    );
}

#[tokio::test]
async fn test_throttled_burst_persists_on_close() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::new(DbConfig {
        flush_interval: Some(Duration::from_secs(10)),
        ..test_config(temp_dir.path())
    });

    let mut busy = 0;
    for i in 0..10 {
        match store.write("burst", &format!("k{}", i), &i).await {
            Ok(()) => {}
            Err(e) if e.is_busy() => busy += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(busy, 9);
    assert_eq!(read_file(&temp_dir.path().join("burst.db.json")), json!({"k0": 0}));

    store.close("burst").await.unwrap();
    let on_disk = read_file(&temp_dir.path().join("burst.db.json"));
    assert_eq!(on_disk.as_object().unwrap().len(), 10);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
}

#[tokio::test]
async fn test_read_as_typed_values() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::new(test_config(temp_dir.path()));

    let profile = Profile {
        name: "Ada".to_string(),
        age: 36,
    };
    store.write("people", "ada", &profile).await.unwrap();

    let loaded: Profile = store
        .read_as(
            "people",
            "ada",
            Profile {
                name: String::new(),
                age: 0,
            },
        )
        .await
        .unwrap();
    assert_eq!(loaded, profile);

    let err = store.read_as("people", "ada", 0u32).await.unwrap_err();
    assert!(matches!(err, DbError::Decode { .. }), "got {:?}", err);
}

fn writes_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(("[a-e]", 1i64..1000), 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Closing and reopening yields the union of all writes, last write wins
    #[test]
    fn prop_reopen_yields_union_of_writes(writes in writes_strategy()) {
        let temp_dir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let on_disk = runtime.block_on(async {
            let store = Store::new(test_config(temp_dir.path()));
            for (key, value) in &writes {
                store.write("prop", key, value).await.unwrap();
            }
            store.close("prop").await.unwrap();
            read_file(&temp_dir.path().join("prop.db.json"))
        });

        let expected: BTreeMap<String, i64> = writes.into_iter().collect();
        prop_assert_eq!(on_disk, serde_json::to_value(expected).unwrap());
    }
}
