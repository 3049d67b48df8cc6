//! Trait contract tests for ObjectStore.
//!
//! Every backend must pass the same behavioural checks; each test runs
//! against the in-memory fake and the filesystem store.

use pricegate_store::fakes::{FaultyObjectStore, MemoryObjectStore};
use pricegate_store::storage_traits::*;
use pricegate_store::{FsObjectStore, StorageError};

fn key(s: &str) -> ObjectKey {
    ObjectKey::new(s).unwrap()
}

async fn contract_roundtrip(store: &dyn ObjectStore) {
    let k = key("models/house/v1.0.0-aaa/model.tar.gz");
    store.put(&k, b"weights").await.unwrap();
    assert_eq!(store.get(&k).await.unwrap(), b"weights");
    assert!(store.exists(&k).await.unwrap());
}

async fn contract_last_writer_wins(store: &dyn ObjectStore) {
    let k = layout::pointer_key("house").unwrap();
    store.put(&k, b"v1.0.0-aaa").await.unwrap();
    store.put(&k, b"v1.0.1-bbb").await.unwrap();
    assert_eq!(store.get(&k).await.unwrap(), b"v1.0.1-bbb");
}

async fn contract_not_found(store: &dyn ObjectStore) {
    let err = store.get(&key("models/missing/x")).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

async fn contract_listing(store: &dyn ObjectStore) {
    for version in ["v1.0.0-aaa", "v1.0.1-bbb"] {
        let k = layout::artifact_key("house", version).unwrap();
        store.put(&k, b"x").await.unwrap();
    }
    store
        .put(&layout::pointer_key("house").unwrap(), b"v1.0.1-bbb")
        .await
        .unwrap();

    let listed = store
        .list_prefixes(&layout::model_prefix("house"))
        .await
        .unwrap();
    assert_eq!(listed, vec!["latest", "v1.0.0-aaa", "v1.0.1-bbb"]);

    let empty = store
        .list_prefixes(&layout::model_prefix("nobody"))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

async fn contract_bad_prefix(store: &dyn ObjectStore) {
    let err = store.list_prefixes("models").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey { .. }));
}

// ===========================================================================
// MemoryObjectStore
// ===========================================================================

#[tokio::test]
async fn memory_store_satisfies_contract() {
    contract_roundtrip(&MemoryObjectStore::default()).await;
    contract_last_writer_wins(&MemoryObjectStore::default()).await;
    contract_not_found(&MemoryObjectStore::default()).await;
    contract_listing(&MemoryObjectStore::default()).await;
    contract_bad_prefix(&MemoryObjectStore::default()).await;
}

#[tokio::test]
async fn memory_store_uri_names_bucket() {
    let store = MemoryObjectStore::new("house-price-mlops");
    assert_eq!(
        store.uri(&key("models/m/v1/model.tar.gz")),
        "mem://house-price-mlops/models/m/v1/model.tar.gz"
    );
}

// ===========================================================================
// FsObjectStore
// ===========================================================================

#[tokio::test]
async fn fs_store_satisfies_contract() {
    for check in 0..5 {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket").unwrap();
        match check {
            0 => contract_roundtrip(&store).await,
            1 => contract_last_writer_wins(&store).await,
            2 => contract_not_found(&store).await,
            3 => contract_listing(&store).await,
            _ => contract_bad_prefix(&store).await,
        }
    }
}

#[tokio::test]
async fn fs_store_lists_only_prefixes_holding_objects() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsObjectStore::new(dir.path(), "bucket").unwrap();
    store
        .put(&layout::artifact_key("house", "v1.0.0-aaa").unwrap(), b"x")
        .await
        .unwrap();
    std::fs::create_dir_all(dir.path().join("bucket/models/house/v1.0.1-bbb")).unwrap();

    let listed = store
        .list_prefixes(&layout::model_prefix("house"))
        .await
        .unwrap();
    assert_eq!(listed, vec!["v1.0.0-aaa"]);
}

#[tokio::test]
async fn fs_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let k = key("models/m/v1.0.0-aaa/model.tar.gz");
    {
        let store = FsObjectStore::new(dir.path(), "bucket").unwrap();
        store.put(&k, b"persisted").await.unwrap();
    }
    let reopened = FsObjectStore::new(dir.path(), "bucket").unwrap();
    assert_eq!(reopened.get(&k).await.unwrap(), b"persisted");
}

// ===========================================================================
// FaultyObjectStore
// ===========================================================================

#[tokio::test]
async fn faulty_store_fails_only_matching_puts() {
    let store = FaultyObjectStore::new().fail_puts_containing("/latest/");
    let artifact = layout::artifact_key("m", "v1.0.0-aaa").unwrap();
    let pointer = layout::pointer_key("m").unwrap();

    store.put(&artifact, b"ok").await.unwrap();
    let err = store.put(&pointer, b"v1.0.0-aaa").await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));

    assert_eq!(store.inner().keys(), vec![artifact.to_string()]);
}

#[tokio::test]
async fn faulty_store_can_fail_listing() {
    let store = FaultyObjectStore::new().fail_listing();
    assert!(store.list_prefixes("models/m/").await.is_err());
}
