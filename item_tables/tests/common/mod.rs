//! Shared helpers for the table integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use item_tables::tables::{
    Category, CategoryId, CategoryTable, CellRecord, CreateTableRequest, InMemoryTableStore,
    Table, TableError, TableExport, TableId, TableResult, TableStore, models::InsertOutcome,
};
use std::collections::HashSet;
use std::sync::Mutex;

/// Build a grid from string literals
pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

/// The INVENTORY table used across scenarios
pub fn inventory() -> CreateTableRequest {
    CreateTableRequest::new(
        7,
        "INVENTORY",
        grid(&[&["a", "b"], &["", "d"]]),
        vec!["Col1".into(), "Col2".into()],
    )
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory store that fails chosen cell writes and, on demand, listings
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryTableStore,
    failing_cells: Mutex<HashSet<(usize, usize)>>,
    fail_listing: Mutex<bool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_cell(&self, row: usize, col: usize) {
        self.failing_cells.lock().unwrap().insert((row, col));
    }

    pub fn fail_listing(&self, fail: bool) {
        *self.fail_listing.lock().unwrap() = fail;
    }

    fn unavailable() -> TableError {
        TableError::Store("connection reset by peer".to_string())
    }
}

#[async_trait]
impl TableStore for FlakyStore {
    async fn add_table_items(&self, request: &CreateTableRequest) -> TableResult<InsertOutcome> {
        self.inner.add_table_items(request).await
    }

    async fn get_table_items(&self, name: &str) -> TableResult<Vec<CellRecord>> {
        self.inner.get_table_items(name).await
    }

    async fn update_table_cell(
        &self,
        name: &str,
        row: usize,
        col: usize,
        content: &str,
    ) -> TableResult<bool> {
        if self.failing_cells.lock().unwrap().contains(&(row, col)) {
            return Err(Self::unavailable());
        }
        self.inner.update_table_cell(name, row, col, content).await
    }

    async fn update_column_label(&self, name: &str, col: usize, label: &str) -> TableResult<bool> {
        self.inner.update_column_label(name, col, label).await
    }

    async fn delete_table(&self, id: TableId) -> TableResult<bool> {
        self.inner.delete_table(id).await
    }

    async fn delete_table_by_name(&self, name: &str) -> TableResult<bool> {
        self.inner.delete_table_by_name(name).await
    }

    async fn get_table(&self, id: TableId) -> TableResult<Option<Table>> {
        self.inner.get_table(id).await
    }

    async fn get_table_by_name(&self, name: &str) -> TableResult<Option<Table>> {
        self.inner.get_table_by_name(name).await
    }

    async fn add_table(&self, name: &str, description: &str) -> TableResult<TableId> {
        self.inner.add_table(name, description).await
    }

    async fn update_table(
        &self,
        id: TableId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> TableResult<()> {
        self.inner.update_table(id, name, description).await
    }

    async fn get_all_tables(&self) -> TableResult<Vec<Table>> {
        if *self.fail_listing.lock().unwrap() {
            return Err(Self::unavailable());
        }
        self.inner.get_all_tables().await
    }

    async fn get_tables_by_category(
        &self,
        category_id: CategoryId,
    ) -> TableResult<Vec<CategoryTable>> {
        self.inner.get_tables_by_category(category_id).await
    }

    async fn count_items_in_table(&self, id: TableId) -> TableResult<usize> {
        self.inner.count_items_in_table(id).await
    }

    async fn export_table(&self, name: &str) -> TableResult<Option<TableExport>> {
        self.inner.export_table(name).await
    }

    async fn get_categories(&self) -> TableResult<Vec<Category>> {
        self.inner.get_categories().await
    }
}
