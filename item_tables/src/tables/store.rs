//! Record store contract.
//!
//! The controller and the manager only talk to storage through [`TableStore`],
//! which keeps them testable against [`super::memory::InMemoryTableStore`] and
//! lets [`super::postgres::PgTableStore`] own every SQL detail.

use async_trait::async_trait;

use super::errors::TableResult;
use super::models::{
    CategoryId, CategoryTable, CellRecord, Category, CreateTableRequest, InsertOutcome, Table,
    TableExport, TableId,
};

/// Flat item store holding table identities and their cell records
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create the table identity and every cell record of `request` as one
    /// unit: either all of them exist afterwards or none do.
    ///
    /// # Errors
    ///
    /// * `TableError::DuplicateName` - a table with this name already exists
    async fn add_table_items(&self, request: &CreateTableRequest) -> TableResult<InsertOutcome>;

    /// All cell records of the named table, ordered by row then column.
    /// Empty when the table is unknown or has no cells.
    async fn get_table_items(&self, name: &str) -> TableResult<Vec<CellRecord>>;

    /// Write one cell addressed by `(name, row, col)`
    ///
    /// Overwrites an existing record, even with empty content. A non-empty
    /// write to a position that held no record inserts one carrying the flags,
    /// category and tags the table was created with. Returns `false` when the
    /// table does not exist.
    async fn update_table_cell(
        &self,
        name: &str,
        row: usize,
        col: usize,
        content: &str,
    ) -> TableResult<bool>;

    /// Relabel column `col` of the named table. Returns `false` when the table
    /// does not exist.
    async fn update_column_label(&self, name: &str, col: usize, label: &str) -> TableResult<bool>;

    /// Delete a table and, by cascade, all of its cells. Returns `false` when
    /// there was nothing to delete.
    async fn delete_table(&self, id: TableId) -> TableResult<bool>;

    /// Delete a table by name and, by cascade, all of its cells
    async fn delete_table_by_name(&self, name: &str) -> TableResult<bool>;

    /// Find table by ID
    async fn get_table(&self, id: TableId) -> TableResult<Option<Table>>;

    /// Find table by name, using the store's collation
    async fn get_table_by_name(&self, name: &str) -> TableResult<Option<Table>>;

    /// Create an empty table identity
    ///
    /// # Errors
    ///
    /// * `TableError::DuplicateName` - a table with this name already exists
    async fn add_table(&self, name: &str, description: &str) -> TableResult<TableId>;

    /// Change a table's name and/or description
    ///
    /// # Errors
    ///
    /// * `TableError::TableIdNotFound` - no table has this id
    /// * `TableError::DuplicateName` - another table already uses `name`
    async fn update_table(
        &self,
        id: TableId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> TableResult<()>;

    /// Every table identity, ordered by id
    async fn get_all_tables(&self) -> TableResult<Vec<Table>>;

    /// Tables holding at least one cell in `category_id`, with their extent
    async fn get_tables_by_category(
        &self,
        category_id: CategoryId,
    ) -> TableResult<Vec<CategoryTable>>;

    /// Number of cell records of a table; zero for unknown ids
    async fn count_items_in_table(&self, id: TableId) -> TableResult<usize>;

    /// Rebuild the named table's grid. `None` when it has no records.
    async fn export_table(&self, name: &str) -> TableResult<Option<TableExport>>;

    /// Every category known to the store
    async fn get_categories(&self) -> TableResult<Vec<Category>>;
}
