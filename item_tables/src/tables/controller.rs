//! Table workflows: create, read, update, rename, delete and summarize.
//!
//! Every public operation returns an outcome value instead of an error. Store
//! failures are logged, reduced to a client-safe message and announced through
//! a [`TableEvent::Error`] notification.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{
    config::TablesConfig,
    errors::TableError,
    events::{EventBus, TableEvent},
    manager::TableManager,
    models::{CategoryId, CellRecord, CreateTableRequest, Table, TableExport, TableSummary},
    store::TableStore,
    validator::{self, ValidationError},
};

/// Category label used when a table's category is unknown
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Result of [`TableController::create_table`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateTableOutcome {
    pub success: bool,
    pub table_name: String,
    pub items_created: usize,
    /// Non-empty cells in the input, counted before sanitizing
    pub filled_cells: usize,
    pub errors: Vec<String>,
}

/// Result of [`TableController::get_table_structure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StructureOutcome {
    Found(TableExport),
    NotFound { table_name: String, message: String },
    Failed { table_name: String, error: String },
}

impl StructureOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, StructureOutcome::Found(_))
    }

    pub fn export(&self) -> Option<&TableExport> {
        match self {
            StructureOutcome::Found(export) => Some(export),
            _ => None,
        }
    }
}

/// Result of [`TableController::update_table`]
///
/// Updates are best effort: `success` means at least one cell was written, and
/// `errors` lists the cells that were not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub table_name: String,
    /// Cells written
    pub updates_count: usize,
    /// Distinct rows with at least one cell written
    pub rows_updated: usize,
    pub errors: Vec<String>,
    pub not_found: bool,
}

/// Result of [`TableController::delete_table`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub table_name: String,
    pub items_deleted: usize,
    pub error: Option<String>,
    pub not_found: bool,
}

/// Result of [`TableController::rename_table`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub success: bool,
    pub old_name: String,
    pub new_name: String,
    /// `false` when the new name equals the old one
    pub changed: bool,
    pub error: Option<String>,
    pub not_found: bool,
}

/// Orchestrates table workflows over a [`TableStore`]
pub struct TableController {
    store: Arc<dyn TableStore>,
    config: TablesConfig,
    events: EventBus,
    /// Name cache to keep coherent when tables are renamed or deleted here
    manager: Option<Arc<TableManager>>,
}

impl TableController {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self::with_config(store, TablesConfig::default())
    }

    pub fn with_config(store: Arc<dyn TableStore>, config: TablesConfig) -> Self {
        Self {
            store,
            config,
            events: EventBus::new(),
            manager: None,
        }
    }

    /// Invalidate `manager`'s cache whenever this controller renames or
    /// deletes a table
    pub fn with_manager(mut self, manager: Arc<TableManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn config(&self) -> &TablesConfig {
        &self.config
    }

    /// Receive every event this controller emits from now on
    pub fn subscribe(&self) -> mpsc::Receiver<TableEvent> {
        self.events.subscribe(self.config.event_buffer)
    }

    /// Check `name` against the current table names
    ///
    /// `exclude` names a table the candidate may collide with, as when a table
    /// keeps its own name during an edit. A failure to list names is reported
    /// as an invalid result.
    pub async fn validate_table_name(
        &self,
        name: &str,
        exclude: Option<&str>,
    ) -> Result<(), String> {
        let existing = match self.existing_names().await {
            Ok(names) => names,
            Err(e) => {
                log::error!("Failed to list table names: {}", e);
                return Err(e.client_message());
            }
        };

        validator::validate_table_name_with_max(
            name,
            &existing,
            exclude,
            self.config.max_name_length,
        )
        .map_err(|e| e.to_string())
    }

    /// Count filled cells, requiring the configured minimum
    pub fn validate_table_data<S: AsRef<str>>(
        &self,
        data: &[Vec<S>],
    ) -> Result<usize, ValidationError> {
        validator::validate_table_data(data, self.config.min_filled_cells)
    }

    pub fn sanitize_cell_content(&self, content: &str) -> String {
        validator::sanitize_cell_content(content)
    }

    /// Create a table from a grid
    ///
    /// The name must be unique and the grid must hold enough filled cells.
    /// Every cell is then written in one atomic store call, so a failed create
    /// leaves no records behind.
    pub async fn create_table(&self, mut request: CreateTableRequest) -> CreateTableOutcome {
        let name = request.name.trim().to_string();
        let filled_cells = validator::count_filled_cells(&request.data);
        log::info!("Creating table '{}' ({} filled cells)", name, filled_cells);

        let failed = |error: String| {
            self.events.emit(TableEvent::Error {
                message: error.clone(),
            });
            CreateTableOutcome {
                success: false,
                table_name: name.clone(),
                items_created: 0,
                filled_cells,
                errors: vec![error],
            }
        };

        let existing = match self.existing_names().await {
            Ok(names) => names,
            Err(e) => {
                log::error!("Failed to list table names before creating '{}': {}", name, e);
                return failed(e.client_message());
            }
        };

        if let Err(e) = validator::validate_table_name_with_max(
            &name,
            &existing,
            None,
            self.config.max_name_length,
        ) {
            log::warn!("Rejected table name '{}': {}", name, e);
            return failed(e.to_string());
        }

        if let Err(e) = self.validate_table_data(&request.data) {
            log::warn!("Rejected data for table '{}': {}", name, e);
            return failed(e.to_string());
        }

        request.name = name.clone();
        request.data = validator::sanitize_table_data(&request.data);

        match self.store.add_table_items(&request).await {
            Ok(outcome) => {
                log::info!(
                    "Table '{}' created with {} items",
                    name,
                    outcome.items_created
                );
                self.events.emit(TableEvent::Created {
                    name: name.clone(),
                    items_created: outcome.items_created,
                    category_id: request.category_id,
                });

                CreateTableOutcome {
                    success: true,
                    table_name: name.clone(),
                    items_created: outcome.items_created,
                    filled_cells,
                    errors: outcome.errors,
                }
            }
            Err(TableError::DuplicateName(_)) => {
                log::warn!("Table '{}' was created concurrently", name);
                failed(ValidationError::DuplicateName(name.clone()).to_string())
            }
            Err(e) => {
                log::error!("Failed to create table '{}': {}", name, e);
                failed(e.client_message())
            }
        }
    }

    /// Rebuild a table's grid from its records
    pub async fn get_table_structure(&self, name: &str) -> StructureOutcome {
        let name = name.trim();

        match self.store.export_table(name).await {
            Ok(Some(export)) => {
                log::debug!(
                    "Loaded structure of '{}' ({}x{})",
                    name,
                    export.metadata.row_count,
                    export.metadata.column_count
                );
                StructureOutcome::Found(export)
            }
            Ok(None) => {
                log::warn!("Table '{}' not found or empty", name);
                StructureOutcome::NotFound {
                    table_name: name.to_string(),
                    message: format!("Table '{}' not found or has no data", name),
                }
            }
            Err(e) => {
                log::error!("Failed to load structure of '{}': {}", name, e);
                let error = e.client_message();
                self.events.emit(TableEvent::Error {
                    message: error.clone(),
                });
                StructureOutcome::Failed {
                    table_name: name.to_string(),
                    error,
                }
            }
        }
    }

    /// Write a new grid over an existing table, cell by cell
    ///
    /// Not atomic: each cell is an independent write and failures are
    /// collected while the rest proceed. Writes overwrite by position, so
    /// retrying a partial update is safe. When `column_names` is given the
    /// column labels are rewritten as well.
    pub async fn update_table(
        &self,
        name: &str,
        data: &[Vec<String>],
        column_names: Option<&[String]>,
    ) -> UpdateOutcome {
        let name = name.trim();
        log::info!("Updating table '{}'", name);

        let existing = match self.existing_items(name).await {
            Ok(items) => items,
            Err(error) => {
                return UpdateOutcome {
                    table_name: name.to_string(),
                    not_found: matches!(error, LookupError::NotFound(_)),
                    errors: vec![error.into_message(&self.events)],
                    ..Default::default()
                };
            }
        };

        let mut updates_count = 0;
        let mut rows = BTreeSet::new();
        let mut errors = Vec::new();

        for (row, values) in data.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                let content = validator::sanitize_cell_content(value);
                match self.store.update_table_cell(name, row, col, &content).await {
                    Ok(true) => {
                        updates_count += 1;
                        rows.insert(row);
                    }
                    Ok(false) => errors.push(format!("Error updating cell [{}, {}]", row, col)),
                    Err(e) => {
                        log::warn!("Failed to update '{}' [{}, {}]: {}", name, row, col, e);
                        errors.push(format!(
                            "Error updating cell [{}, {}]: {}",
                            row,
                            col,
                            e.client_message()
                        ));
                    }
                }
            }
        }

        for (col, label) in column_names.unwrap_or_default().iter().enumerate() {
            match self.store.update_column_label(name, col, label.trim()).await {
                Ok(true) => {}
                Ok(false) => errors.push(format!("Error renaming column {}", col)),
                Err(e) => {
                    log::warn!("Failed to relabel '{}' column {}: {}", name, col, e);
                    errors.push(format!(
                        "Error renaming column {}: {}",
                        col,
                        e.client_message()
                    ));
                }
            }
        }

        let category_id = category_of(&existing);
        if updates_count > 0
            && let Some(category_id) = category_id
        {
            self.events.emit(TableEvent::Updated {
                name: name.to_string(),
                category_id: Some(category_id),
            });
        }

        log::info!(
            "Table '{}' updated: {} cells in {} rows, {} errors",
            name,
            updates_count,
            rows.len(),
            errors.len()
        );

        UpdateOutcome {
            success: updates_count > 0,
            table_name: name.to_string(),
            updates_count,
            rows_updated: rows.len(),
            errors,
            not_found: false,
        }
    }

    /// Delete a table and all of its records
    pub async fn delete_table(&self, name: &str) -> DeleteOutcome {
        let name = name.trim();
        log::info!("Deleting table '{}'", name);

        // The identity row decides existence; a table may hold no records.
        let table_id = match self.store.get_table_by_name(name).await {
            Ok(Some(Table { id: Some(id), .. })) => id,
            Ok(_) => {
                log::warn!("Table '{}' not found", name);
                return DeleteOutcome {
                    table_name: name.to_string(),
                    error: Some(format!("Table '{}' not found", name)),
                    not_found: true,
                    ..Default::default()
                };
            }
            Err(e) => return self.delete_failed(name, &e),
        };
        let existing = match self.store.get_table_items(name).await {
            Ok(items) => items,
            Err(e) => return self.delete_failed(name, &e),
        };
        let category_id = category_of(&existing);

        let result = self.store.delete_table_by_name(name).await;
        if let Some(manager) = &self.manager {
            manager.invalidate(table_id).await;
        }

        match result {
            Ok(true) => {
                log::info!("Table '{}' deleted ({} items)", name, existing.len());
                if let Some(category_id) = category_id {
                    self.events.emit(TableEvent::Deleted {
                        name: name.to_string(),
                        category_id: Some(category_id),
                    });
                }
                DeleteOutcome {
                    success: true,
                    table_name: name.to_string(),
                    items_deleted: existing.len(),
                    error: None,
                    not_found: false,
                }
            }
            Ok(false) => {
                let error = format!("Error deleting table '{}'", name);
                log::error!("{}", error);
                self.events.emit(TableEvent::Error {
                    message: error.clone(),
                });
                DeleteOutcome {
                    table_name: name.to_string(),
                    error: Some(error),
                    ..Default::default()
                }
            }
            Err(e) => self.delete_failed(name, &e),
        }
    }

    /// Rename a table; its cells follow without being rewritten
    pub async fn rename_table(&self, old_name: &str, new_name: &str) -> RenameOutcome {
        let old_name = old_name.trim();
        let new_name = new_name.trim();
        let outcome = |error: Option<String>| RenameOutcome {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            error,
            ..Default::default()
        };

        if new_name.is_empty() {
            return outcome(Some(ValidationError::EmptyName.to_string()));
        }
        if new_name == old_name {
            return RenameOutcome {
                success: true,
                ..outcome(None)
            };
        }

        if let Err(error) = self.validate_table_name(new_name, Some(old_name)).await {
            log::warn!("Rejected new name '{}' for '{}': {}", new_name, old_name, error);
            return outcome(Some(error));
        }

        let table = match self.store.get_table_by_name(old_name).await {
            Ok(Some(table)) => table,
            Ok(None) => {
                log::warn!("Cannot rename '{}': not found", old_name);
                return RenameOutcome {
                    not_found: true,
                    ..outcome(Some(format!("Table '{}' not found", old_name)))
                };
            }
            Err(e) => return self.rename_failed(old_name, new_name, &e),
        };
        let Some(table_id) = table.id else {
            return RenameOutcome {
                not_found: true,
                ..outcome(Some(format!("Table '{}' not found", old_name)))
            };
        };

        if let Err(e) = self.store.update_table(table_id, Some(new_name), None).await {
            return self.rename_failed(old_name, new_name, &e);
        }
        if let Some(manager) = &self.manager {
            manager.invalidate(table_id).await;
        }

        let category_id = match self.store.get_table_items(new_name).await {
            Ok(items) => category_of(&items),
            Err(e) => {
                log::warn!("Could not resolve category of '{}': {}", new_name, e);
                None
            }
        };

        log::info!("Table renamed: '{}' -> '{}'", old_name, new_name);
        self.events.emit(TableEvent::Renamed {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            category_id,
        });

        RenameOutcome {
            success: true,
            changed: true,
            ..outcome(None)
        }
    }

    /// One summary row per table, optionally restricted to one category
    pub async fn get_tables_summary(&self, category_id: Option<CategoryId>) -> Vec<TableSummary> {
        match self.collect_summary(category_id).await {
            Ok(summary) => {
                log::info!("Found {} tables", summary.len());
                summary
            }
            Err(e) => {
                log::error!("Failed to summarize tables: {}", e);
                Vec::new()
            }
        }
    }

    async fn collect_summary(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<TableSummary>, TableError> {
        let category_names: HashMap<CategoryId, String> = self
            .store
            .get_categories()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let wanted: Vec<CategoryId> = match category_id {
            Some(id) => vec![id],
            None => {
                let mut ids: Vec<_> = category_names.keys().copied().collect();
                ids.sort_unstable();
                ids
            }
        };

        let mut summary = Vec::new();
        for id in wanted {
            let category_name = category_names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| UNCATEGORIZED.to_string());

            for table in self.store.get_tables_by_category(id).await? {
                summary.push(TableSummary {
                    table_name: table.name,
                    category_name: category_name.clone(),
                    rows: table.rows,
                    cols: table.cols,
                    item_count: table.item_count,
                    created_at: table.created_at,
                });
            }
        }

        Ok(summary)
    }

    async fn existing_names(&self) -> Result<Vec<String>, TableError> {
        let tables = self.store.get_all_tables().await?;
        Ok(tables.into_iter().map(|t| t.name).collect())
    }

    /// Records of `name`, which must have at least one
    async fn existing_items(&self, name: &str) -> Result<Vec<CellRecord>, LookupError> {
        match self.store.get_table_items(name).await {
            Ok(items) if items.is_empty() => {
                log::error!("Table '{}' not found", name);
                Err(LookupError::NotFound(format!("Table '{}' not found", name)))
            }
            Ok(items) => Ok(items),
            Err(e) => {
                log::error!("Failed to read items of '{}': {}", name, e);
                Err(LookupError::Store(e))
            }
        }
    }

    fn delete_failed(&self, name: &str, error: &TableError) -> DeleteOutcome {
        log::error!("Failed to delete table '{}': {}", name, error);
        let message = error.client_message();
        self.events.emit(TableEvent::Error {
            message: message.clone(),
        });
        DeleteOutcome {
            table_name: name.to_string(),
            error: Some(message),
            ..Default::default()
        }
    }

    fn rename_failed(&self, old_name: &str, new_name: &str, error: &TableError) -> RenameOutcome {
        log::error!("Failed to rename '{}' to '{}': {}", old_name, new_name, error);
        let message = match error {
            TableError::DuplicateName(name) => {
                ValidationError::DuplicateName(name.clone()).to_string()
            }
            other => other.client_message(),
        };
        self.events.emit(TableEvent::Error {
            message: message.clone(),
        });
        RenameOutcome {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            error: Some(message),
            not_found: error.is_not_found(),
            ..Default::default()
        }
    }
}

/// Why an existing table could not be loaded
enum LookupError {
    NotFound(String),
    Store(TableError),
}

impl LookupError {
    /// Client-facing message, announced as an error event
    fn into_message(self, events: &EventBus) -> String {
        let message = match self {
            LookupError::NotFound(message) => message,
            LookupError::Store(e) => e.client_message(),
        };
        events.emit(TableEvent::Error {
            message: message.clone(),
        });
        message
    }
}

/// Owning category of a table, taken from the first record that carries one
fn category_of(records: &[CellRecord]) -> Option<CategoryId> {
    records.iter().find_map(|r| r.category_id)
}
