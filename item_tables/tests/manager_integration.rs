//! Integration tests for the table identity manager.
//!
//! Two managers over one store stand in for independent writers: each must
//! notice renames and deletes made by the other instead of serving stale ids.

mod common;

use common::init_logging;
use item_tables::tables::{InMemoryTableStore, TableManager, TableStore};
use std::sync::Arc;

fn two_managers() -> (Arc<InMemoryTableStore>, TableManager, TableManager) {
    init_logging();
    let store = Arc::new(InMemoryTableStore::new());
    let a = TableManager::new(store.clone());
    let b = TableManager::new(store.clone());
    (store, a, b)
}

#[tokio::test]
async fn test_rename_resolves_new_name_and_recreates_old() {
    let (_store, manager, _) = two_managers();
    let id = manager.get_or_create("Budget", "2026").await.unwrap();

    assert!(manager.rename(id, "Budget-2026").await);

    assert_eq!(manager.get_or_create("Budget-2026", "").await.unwrap(), id);
    let new_id = manager.get_or_create("Budget", "").await.unwrap();
    assert_ne!(new_id, id);
}

#[tokio::test]
async fn test_peer_rename_is_detected() {
    let (_store, a, b) = two_managers();
    let id = a.get_or_create("Shared", "").await.unwrap();
    assert_eq!(b.get_or_create("Shared", "").await.unwrap(), id);

    assert!(a.rename(id, "Renamed").await);

    // b still caches Shared -> id, but the store no longer agrees.
    assert_eq!(b.cached_id("Shared").await, Some(id));
    let fresh = b.get_or_create("Shared", "").await.unwrap();
    assert_ne!(fresh, id);
    assert_eq!(b.get_or_create("Renamed", "").await.unwrap(), id);
}

#[tokio::test]
async fn test_peer_delete_is_detected() {
    let (store, a, b) = two_managers();
    let id = a.get_or_create("Temp", "").await.unwrap();
    b.get_or_create("Temp", "").await.unwrap();

    assert!(a.delete(id).await);
    assert_eq!(store.count_items_in_table(id).await.unwrap(), 0);
    assert!(store.get_table(id).await.unwrap().is_none());

    assert_ne!(b.get_or_create("Temp", "").await.unwrap(), id);
}

#[tokio::test]
async fn test_one_name_per_id_after_repeated_renames() {
    let (_store, manager, _) = two_managers();
    let id = manager.get_or_create("v1", "").await.unwrap();

    assert!(manager.rename(id, "v2").await);
    assert!(manager.rename(id, "v3").await);

    assert_eq!(manager.cache_len().await, 1);
    assert_eq!(manager.cached_id("v3").await, Some(id));
}

#[tokio::test]
async fn test_delete_unknown_id_returns_false() {
    let (_store, manager, _) = two_managers();
    assert!(!manager.delete(12345).await);
}

#[tokio::test]
async fn test_store_collation_is_case_sensitive() {
    let (store, manager, _) = two_managers();
    let upper = manager.get_or_create("Stock", "").await.unwrap();
    let lower = manager.get_or_create("stock", "").await.unwrap();

    assert_ne!(upper, lower);
    assert_eq!(store.get_all_tables().await.unwrap().len(), 2);
}
