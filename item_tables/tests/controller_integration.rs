//! Integration tests for table workflows over the in-memory store.
//!
//! Covers the create / read / update / rename / delete lifecycle, the events
//! each step raises, and how partial store failures are reported.

mod common;

use common::{FlakyStore, grid, init_logging, inventory};
use item_tables::tables::{
    CreateTableRequest, InMemoryTableStore, StructureOutcome, TableController, TableEvent,
    TableManager, TableStore,
};
use std::sync::Arc;

fn setup() -> (Arc<InMemoryTableStore>, TableController) {
    init_logging();
    let store = Arc::new(InMemoryTableStore::new().with_category(7, "Warehouse"));
    let controller = TableController::new(store.clone());
    (store, controller)
}

#[tokio::test]
async fn test_inventory_scenario() {
    let (_store, controller) = setup();
    let mut events = controller.subscribe();

    let created = controller.create_table(inventory()).await;
    assert!(created.success);
    assert_eq!(created.items_created, 3);
    assert_eq!(created.filled_cells, 3);
    assert!(created.errors.is_empty());

    let again = controller.create_table(inventory()).await;
    assert!(!again.success);
    assert_eq!(again.items_created, 0);
    assert!(again.errors[0].contains("unique"));

    let updated = controller
        .update_table("INVENTORY", &grid(&[&["x", "b"], &["c", "d"]]), None)
        .await;
    assert!(updated.success);
    assert_eq!(updated.updates_count, 4);
    assert_eq!(updated.rows_updated, 2);
    assert!(updated.errors.is_empty());

    assert!(matches!(
        events.recv().await,
        Some(TableEvent::Created { items_created: 3, category_id: 7, .. })
    ));
    assert!(matches!(events.recv().await, Some(TableEvent::Error { .. })));
    assert_eq!(
        events.recv().await,
        Some(TableEvent::Updated {
            name: "INVENTORY".into(),
            category_id: Some(7),
        })
    );

    let structure = controller.get_table_structure("INVENTORY").await;
    assert_eq!(
        structure.export().unwrap().rows,
        grid(&[&["x", "b"], &["c", "d"]])
    );
}

#[tokio::test]
async fn test_round_trip_keeps_shape_and_labels() {
    let (_store, controller) = setup();
    let request = CreateTableRequest::new(
        7,
        "Contacts",
        grid(&[
            &["Ana", " ana@example.com ", ""],
            &["", "", ""],
            &["Luis", "", "https://example.com"],
        ]),
        vec!["Name".into(), "Email".into(), "Site".into()],
    )
    .with_sensitive_columns(vec![1])
    .with_url_columns(vec![2]);

    let created = controller.create_table(request).await;
    assert_eq!(created.items_created, 4);

    let StructureOutcome::Found(export) = controller.get_table_structure("Contacts").await else {
        panic!("table should exist");
    };
    assert_eq!(export.columns, vec!["Name", "Email", "Site"]);
    assert_eq!(
        export.rows,
        grid(&[
            &["Ana", "ana@example.com", ""],
            &["", "", ""],
            &["Luis", "", "https://example.com"],
        ])
    );
    assert_eq!(export.metadata.row_count, 3);
    assert_eq!(export.metadata.item_count, 4);
}

#[tokio::test]
async fn test_cells_carry_flags_tags_and_groups() {
    let (store, controller) = setup();
    let request = CreateTableRequest::new(
        7,
        "Keys",
        grid(&[&["github", "s3cret", "https://github.com"]]),
        vec!["Service".into(), "Token".into(), "Url".into()],
    )
    .with_tags(vec!["dev".into()])
    .with_sensitive_columns(vec![1])
    .with_url_columns(vec![2, 9]);

    let created = controller.create_table(request).await;
    assert!(created.success);
    assert_eq!(created.errors.len(), 1);

    let items = store.get_table_items("Keys").await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(items[1].is_sensitive && !items[0].is_sensitive);
    assert!(items[2].is_url);
    assert!(items.iter().all(|i| i.list_group() == "Keys_row_0"));
    assert!(items.iter().all(|i| i.tags == vec!["dev", "Keys"]));
    assert_eq!(
        items.iter().map(|i| i.order_in_list()).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn test_failed_validation_leaves_no_records() {
    let (store, controller) = setup();
    let request = CreateTableRequest::new(7, "bad name!", grid(&[&["x"]]), vec![]);

    let outcome = controller.create_table(request).await;

    assert!(!outcome.success);
    assert!(store.get_all_tables().await.unwrap().is_empty());
    assert!(store.get_table_items("bad name!").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_then_structure_is_not_found() {
    let (store, controller) = setup();
    controller.create_table(inventory()).await;
    let id = store
        .get_table_by_name("INVENTORY")
        .await
        .unwrap()
        .and_then(|t| t.id)
        .unwrap();

    let deleted = controller.delete_table("INVENTORY").await;
    assert!(deleted.success);
    assert_eq!(deleted.items_deleted, 3);

    assert!(matches!(
        controller.get_table_structure("INVENTORY").await,
        StructureOutcome::NotFound { .. }
    ));
    assert_eq!(store.count_items_in_table(id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_reports_partial_failures() {
    init_logging();
    let store = Arc::new(FlakyStore::new());
    let controller = TableController::new(store.clone());
    controller.create_table(inventory()).await;
    store.fail_cell(1, 1);
    let mut events = controller.subscribe();

    let outcome = controller
        .update_table("INVENTORY", &grid(&[&["x", "y"], &["z", "w"]]), None)
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.updates_count, 3);
    assert_eq!(outcome.rows_updated, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("[1, 1]"));
    assert!(!outcome.errors[0].contains("connection reset"));
    assert!(matches!(events.recv().await, Some(TableEvent::Updated { .. })));

    let export = controller.get_table_structure("INVENTORY").await;
    assert_eq!(
        export.export().unwrap().rows,
        grid(&[&["x", "y"], &["z", "d"]])
    );
}

#[tokio::test]
async fn test_store_failure_becomes_failed_outcome_and_event() {
    init_logging();
    let store = Arc::new(FlakyStore::new());
    let controller = TableController::new(store.clone());
    store.fail_listing(true);
    let mut events = controller.subscribe();

    let outcome = controller.create_table(inventory()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.items_created, 0);
    assert!(store.inner.get_table_items("INVENTORY").await.unwrap().is_empty());
    match events.recv().await {
        Some(TableEvent::Error { message }) => assert!(!message.contains("connection reset")),
        other => panic!("expected error event, got {:?}", other),
    }
    assert!(controller.validate_table_name("Fresh", None).await.is_err());
}

#[tokio::test]
async fn test_rename_keeps_cells_and_frees_old_name() {
    let (store, controller) = setup();
    controller.create_table(inventory()).await;

    let renamed = controller.rename_table("INVENTORY", "STOCK").await;
    assert!(renamed.success && renamed.changed);

    let items = store.get_table_items("STOCK").await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.name_table == "STOCK"));
    assert!(items.iter().all(|i| i.list_group().starts_with("STOCK_row_")));

    let recreated = controller.create_table(inventory()).await;
    assert!(recreated.success);
}

#[tokio::test]
async fn test_controller_and_manager_stay_coherent() {
    init_logging();
    let store = Arc::new(InMemoryTableStore::new());
    let manager = Arc::new(TableManager::new(store.clone()));
    let controller = TableController::new(store.clone()).with_manager(manager.clone());

    controller.create_table(inventory()).await;
    let id = manager.get_or_create("INVENTORY", "").await.unwrap();

    assert!(controller.rename_table("INVENTORY", "STOCK").await.success);
    assert_eq!(manager.cached_id("INVENTORY").await, None);
    assert_eq!(manager.get_or_create("STOCK", "").await.unwrap(), id);

    let fresh = manager.get_or_create("INVENTORY", "").await.unwrap();
    assert_ne!(fresh, id);
}

#[tokio::test]
async fn test_summary_per_category() {
    let (store, controller) = setup();
    store.add_category(8, "Personal").unwrap();
    controller.create_table(inventory()).await;
    controller
        .create_table(CreateTableRequest::new(
            8,
            "Notes",
            grid(&[&["one"], &["two"], &["three"]]),
            vec!["Text".into()],
        ))
        .await;

    let all = controller.get_tables_summary(None).await;
    let names: Vec<_> = all
        .iter()
        .map(|s| (s.table_name.as_str(), s.category_name.as_str()))
        .collect();
    assert_eq!(names, vec![("INVENTORY", "Warehouse"), ("Notes", "Personal")]);

    let personal = controller.get_tables_summary(Some(8)).await;
    assert_eq!(personal.len(), 1);
    assert_eq!((personal[0].rows, personal[0].cols), (3, 1));
    assert_eq!(personal[0].item_count, 3);
}

#[tokio::test]
async fn test_blanked_table_can_be_deleted_and_recreated() {
    let (store, controller) = setup();
    controller.create_table(inventory()).await;

    let blanked = controller
        .update_table("INVENTORY", &grid(&[&["", ""], &["", ""]]), None)
        .await;
    assert!(blanked.success);
    assert_eq!(blanked.updates_count, 4);
    assert!(blanked.errors.is_empty());

    let structure = controller.get_table_structure("INVENTORY").await;
    assert_eq!(
        structure.export().unwrap().rows,
        grid(&[&["", ""], &["", ""]])
    );

    let refilled = controller
        .update_table("INVENTORY", &grid(&[&["e"]]), None)
        .await;
    assert!(refilled.success && !refilled.not_found);

    let deleted = controller.delete_table("INVENTORY").await;
    assert!(deleted.success, "{:?}", deleted.error);
    assert!(!deleted.not_found);
    assert!(store.get_table_by_name("INVENTORY").await.unwrap().is_none());

    let recreated = controller.create_table(inventory()).await;
    assert!(recreated.success, "{:?}", recreated.errors);
    assert_eq!(recreated.items_created, 3);
}

#[tokio::test]
async fn test_empty_value_blanks_one_cell_in_place() {
    let (store, controller) = setup();
    controller.create_table(inventory()).await;

    let outcome = controller
        .update_table("INVENTORY", &grid(&[&["a", "  "]]), None)
        .await;
    assert_eq!(outcome.updates_count, 2);

    let items = store.get_table_items("INVENTORY").await.unwrap();
    assert_eq!(items.len(), 3);
    let blank = items.iter().find(|i| i.position() == (0, 1)).unwrap();
    assert_eq!(blank.content, "");
    assert_eq!(blank.label, "Col2");

    let export = controller.get_table_structure("INVENTORY").await;
    assert_eq!(
        export.export().unwrap().rows,
        grid(&[&["a", ""], &["", "d"]])
    );
}

#[tokio::test]
async fn test_flagged_columns_empty_at_creation_keep_their_flags() {
    let (store, controller) = setup();
    let request = CreateTableRequest::new(
        7,
        "Keys",
        grid(&[&["", "user", ""]]),
        vec!["Token".into(), "User".into(), "Site".into()],
    )
    .with_tags(vec!["dev".into()])
    .with_sensitive_columns(vec![0])
    .with_url_columns(vec![2]);
    assert!(controller.create_table(request).await.success);

    let outcome = controller
        .update_table("Keys", &grid(&[&["n3w", "user", "https://example.com"]]), None)
        .await;
    assert_eq!(outcome.updates_count, 3);

    let items = store.get_table_items("Keys").await.unwrap();
    let token = items.iter().find(|i| i.col == 0).unwrap();
    let site = items.iter().find(|i| i.col == 2).unwrap();
    assert!(token.is_sensitive && !token.is_url);
    assert!(site.is_url && !site.is_sensitive);
    assert_eq!(token.label, "Token");
    assert_eq!(site.category_id, Some(7));
    assert_eq!(site.tags, vec!["dev", "Keys"]);
}

#[tokio::test]
async fn test_sensitive_cell_blanked_then_refilled_stays_sensitive() {
    let (store, controller) = setup();
    let request = CreateTableRequest::new(
        7,
        "Keys",
        grid(&[&["s3cret", "user"]]),
        vec!["Token".into(), "User".into()],
    )
    .with_sensitive_columns(vec![0]);
    controller.create_table(request).await;

    controller
        .update_table("Keys", &grid(&[&["", "user"]]), None)
        .await;
    controller
        .update_table("Keys", &grid(&[&["n3w", "user"]]), None)
        .await;

    let items = store.get_table_items("Keys").await.unwrap();
    let token = items.iter().find(|i| i.col == 0).unwrap();
    assert_eq!(token.content, "n3w");
    assert!(token.is_sensitive);

    let summary = controller.get_tables_summary(Some(7)).await;
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].table_name, "Keys");
}
