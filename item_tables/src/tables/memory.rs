//! In-memory table store.
//!
//! Implements the whole [`TableStore`] contract over mutex-guarded maps. Every
//! operation takes the lock once and never awaits while holding it, so a
//! multi-cell insert is all-or-nothing exactly like a database transaction.
//! Name lookups are exact (case-sensitive) and names are unique.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::encoding::{cell_tags, decode_structure, encode_cells};
use super::errors::{TableError, TableResult};
use super::models::{
    Category, CategoryId, CategoryTable, CellRecord, CreateTableRequest, InsertOutcome, Table,
    TableExport, TableId, TableLayout,
};
use super::store::TableStore;

#[derive(Debug, Clone)]
struct StoredCell {
    label: String,
    content: String,
    category_id: Option<CategoryId>,
    is_sensitive: bool,
    is_url: bool,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<TableId, Table>,
    layouts: HashMap<TableId, TableLayout>,
    /// Keyed by `(table_id, row, col)`, so one position holds at most one cell
    cells: BTreeMap<(TableId, usize, usize), StoredCell>,
    categories: BTreeMap<CategoryId, Category>,
    last_id: TableId,
}

impl MemoryState {
    fn allocate_id(&mut self) -> TableId {
        self.last_id += 1;
        self.last_id
    }

    fn id_by_name(&self, name: &str) -> Option<TableId> {
        self.tables
            .values()
            .find(|t| t.name == name)
            .and_then(|t| t.id)
    }

    fn table_cells(
        &self,
        id: TableId,
    ) -> impl Iterator<Item = (&(TableId, usize, usize), &StoredCell)> {
        self.cells
            .range((id, 0, 0)..=(id, usize::MAX, usize::MAX))
    }

    fn records(&self, id: TableId) -> Vec<CellRecord> {
        let name = self
            .tables
            .get(&id)
            .map(|t| t.name.clone())
            .unwrap_or_default();

        self.table_cells(id)
            .map(|(&(table_id, row, col), cell)| CellRecord {
                table_id,
                name_table: name.clone(),
                row,
                col,
                label: cell.label.clone(),
                content: cell.content.clone(),
                category_id: cell.category_id,
                is_sensitive: cell.is_sensitive,
                is_url: cell.is_url,
                tags: cell.tags.clone(),
                created_at: cell.created_at,
            })
            .collect()
    }

    fn remove_table(&mut self, id: TableId) -> bool {
        if self.tables.remove(&id).is_none() {
            return false;
        }
        self.layouts.remove(&id);
        self.cells.retain(|&(table_id, _, _), _| table_id != id);
        true
    }

    fn touch(&mut self, id: TableId) {
        if let Some(table) = self.tables.get_mut(&id) {
            table.updated_at = Utc::now();
        }
    }

    /// A cell written into a position that has no record yet
    ///
    /// Flags, category and tags come from what the table was created with.
    /// The label falls back to a column sibling when the layout has none.
    fn new_cell(&self, id: TableId, name: &str, col: usize, content: &str) -> StoredCell {
        let layout = self.layouts.get(&id).cloned().unwrap_or_default();
        let label = match layout.label(col) {
            "" => self
                .table_cells(id)
                .find(|((_, _, c), _)| *c == col)
                .map(|(_, cell)| cell.label.clone())
                .unwrap_or_default(),
            declared => declared.to_string(),
        };

        StoredCell {
            label,
            content: content.to_string(),
            category_id: layout.category_id,
            is_sensitive: layout.is_sensitive(col),
            is_url: layout.is_url(col),
            tags: cell_tags(&layout.tags, name),
            created_at: Utc::now(),
        }
    }
}

/// Table store kept entirely in process memory
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    state: Mutex<MemoryState>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style category registration
    pub fn with_category(self, id: CategoryId, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.categories.insert(
                id,
                Category {
                    id,
                    name: name.to_string(),
                },
            );
        }
        self
    }

    /// Register or rename a category
    pub fn add_category(&self, id: CategoryId, name: &str) -> TableResult<()> {
        self.lock()?.categories.insert(
            id,
            Category {
                id,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    fn lock(&self) -> TableResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| TableError::Store("in-memory store lock poisoned".to_string()))
    }
}

fn checked_name(name: &str) -> TableResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TableError::InvalidName(
            "Table name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn add_table_items(&self, request: &CreateTableRequest) -> TableResult<InsertOutcome> {
        let name = checked_name(&request.name)?;
        let mut state = self.lock()?;

        if state.id_by_name(name).is_some() {
            return Err(TableError::DuplicateName(name.to_string()));
        }

        let encoded = encode_cells(request);
        let id = state.allocate_id();
        let now = Utc::now();

        state
            .tables
            .insert(id, Table::from_parts(Some(id), name, "", Some(now), Some(now)));
        state.layouts.insert(id, encoded.layout);

        let items_created = encoded.cells.len();
        for cell in encoded.cells {
            state.cells.insert(
                (id, cell.row, cell.col),
                StoredCell {
                    label: cell.label,
                    content: cell.content,
                    category_id: Some(request.category_id),
                    is_sensitive: cell.is_sensitive,
                    is_url: cell.is_url,
                    tags: cell.tags,
                    created_at: now,
                },
            );
        }

        Ok(InsertOutcome {
            table_id: id,
            items_created,
            errors: encoded.errors,
        })
    }

    async fn get_table_items(&self, name: &str) -> TableResult<Vec<CellRecord>> {
        let state = self.lock()?;
        Ok(state
            .id_by_name(name)
            .map(|id| state.records(id))
            .unwrap_or_default())
    }

    async fn update_table_cell(
        &self,
        name: &str,
        row: usize,
        col: usize,
        content: &str,
    ) -> TableResult<bool> {
        let mut state = self.lock()?;
        let Some(id) = state.id_by_name(name) else {
            return Ok(false);
        };

        // Blanking keeps the record, so a table never loses its cells to updates.
        let key = (id, row, col);
        if let Some(cell) = state.cells.get_mut(&key) {
            cell.content = content.to_string();
        } else if !content.is_empty() {
            let cell = state.new_cell(id, name, col, content);
            state.cells.insert(key, cell);
        }

        state.layouts.entry(id).or_default().include(row, col);
        state.touch(id);
        Ok(true)
    }

    async fn update_column_label(&self, name: &str, col: usize, label: &str) -> TableResult<bool> {
        let mut state = self.lock()?;
        let Some(id) = state.id_by_name(name) else {
            return Ok(false);
        };

        state.layouts.entry(id).or_default().set_label(col, label);
        for (_, cell) in state
            .cells
            .range_mut((id, 0, col)..=(id, usize::MAX, usize::MAX))
            .filter(|((_, _, c), _)| *c == col)
        {
            cell.label = label.to_string();
        }
        state.touch(id);
        Ok(true)
    }

    async fn delete_table(&self, id: TableId) -> TableResult<bool> {
        Ok(self.lock()?.remove_table(id))
    }

    async fn delete_table_by_name(&self, name: &str) -> TableResult<bool> {
        let mut state = self.lock()?;
        match state.id_by_name(name) {
            Some(id) => Ok(state.remove_table(id)),
            None => Ok(false),
        }
    }

    async fn get_table(&self, id: TableId) -> TableResult<Option<Table>> {
        Ok(self.lock()?.tables.get(&id).cloned())
    }

    async fn get_table_by_name(&self, name: &str) -> TableResult<Option<Table>> {
        let state = self.lock()?;
        Ok(state
            .id_by_name(name)
            .and_then(|id| state.tables.get(&id).cloned()))
    }

    async fn add_table(&self, name: &str, description: &str) -> TableResult<TableId> {
        let name = checked_name(name)?;
        let mut state = self.lock()?;

        if state.id_by_name(name).is_some() {
            return Err(TableError::DuplicateName(name.to_string()));
        }

        let id = state.allocate_id();
        state
            .tables
            .insert(id, Table::from_parts(Some(id), name, description, None, None));
        state.layouts.insert(id, TableLayout::default());
        Ok(id)
    }

    async fn update_table(
        &self,
        id: TableId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> TableResult<()> {
        let mut state = self.lock()?;
        if !state.tables.contains_key(&id) {
            return Err(TableError::TableIdNotFound(id));
        }

        let name = name.map(checked_name).transpose()?;
        if let Some(name) = name
            && state.id_by_name(name).is_some_and(|other| other != id)
        {
            return Err(TableError::DuplicateName(name.to_string()));
        }

        if let Some(table) = state.tables.get_mut(&id) {
            if let Some(name) = name {
                table.name = name.to_string();
            }
            if let Some(description) = description {
                table.description = description.to_string();
            }
            table.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_all_tables(&self) -> TableResult<Vec<Table>> {
        Ok(self.lock()?.tables.values().cloned().collect())
    }

    async fn get_tables_by_category(
        &self,
        category_id: CategoryId,
    ) -> TableResult<Vec<CategoryTable>> {
        let state = self.lock()?;
        let mut found = Vec::new();

        for (&id, table) in &state.tables {
            let records = state.records(id);
            if !records.iter().any(|r| r.category_id == Some(category_id)) {
                continue;
            }

            let mut shape = state.layouts.get(&id).cloned().unwrap_or_default();
            for record in &records {
                shape.include(record.row, record.col);
            }

            found.push(CategoryTable {
                id,
                name: table.name.clone(),
                rows: shape.row_count,
                cols: shape.column_count,
                item_count: records.len(),
                created_at: table.created_at,
            });
        }

        Ok(found)
    }

    async fn count_items_in_table(&self, id: TableId) -> TableResult<usize> {
        Ok(self.lock()?.table_cells(id).count())
    }

    async fn export_table(&self, name: &str) -> TableResult<Option<TableExport>> {
        let state = self.lock()?;
        let Some(id) = state.id_by_name(name) else {
            return Ok(None);
        };

        let records = state.records(id);
        Ok(decode_structure(
            name,
            state.tables.get(&id),
            state.layouts.get(&id),
            &records,
        ))
    }

    async fn get_categories(&self) -> TableResult<Vec<Category>> {
        Ok(self.lock()?.categories.values().cloned().collect())
    }
}
