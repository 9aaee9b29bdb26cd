//! Table identity and cell record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Table ID type
pub type TableId = i64;

/// Category ID type
pub type CategoryId = i64;

/// A cell matrix, rows of free-text cells
pub type Matrix = Vec<Vec<String>>;

/// Table identity
///
/// Equality is defined on the identifier alone: two tables are equal only when
/// both have been assigned an id by the store and the ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub id: Option<TableId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Table {
    /// Create a table identity that has not been persisted yet
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a table from stored parts, stamping missing timestamps with now
    pub fn from_parts(
        id: Option<TableId>,
        name: impl Into<String>,
        description: impl Into<String>,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: description.into(),
            created_at: created_at.unwrap_or(now),
            updated_at: updated_at.unwrap_or(now),
        }
    }

    /// Name must be non-empty after trimming
    pub fn validate(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Serialize to a JSON object
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "created_at": self.created_at.to_rfc3339(),
            "updated_at": self.updated_at.to_rfc3339(),
        })
    }

    /// Deserialize from a JSON object; absent fields take their defaults
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Table(id={}, name='{}')", id, self.name),
            None => write!(f, "Table(id=None, name='{}')", self.name),
        }
    }
}

/// Table identity enriched with its cell count
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    #[serde(flatten)]
    pub table: Table,
    pub items_count: usize,
}

/// Stored cell record
///
/// Cells reference their table by id; `name_table` is resolved from the table
/// identity when the record is read, so renaming a table rewrites no cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub table_id: TableId,
    pub name_table: String,
    pub row: usize,
    pub col: usize,
    /// Column name
    pub label: String,
    pub content: String,
    pub category_id: Option<CategoryId>,
    pub is_sensitive: bool,
    pub is_url: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CellRecord {
    /// Matrix placement as `(row, column)`
    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Row grouping key, shared by every cell of one row
    pub fn list_group(&self) -> String {
        list_group(&self.name_table, self.row)
    }

    /// Intra-row ordering
    pub fn order_in_list(&self) -> usize {
        self.col
    }

    /// Table-membership marker
    pub fn is_table(&self) -> bool {
        true
    }

    /// List/group marker
    pub fn is_list(&self) -> bool {
        true
    }
}

/// Row grouping key for `table_name` and `row`
pub fn list_group(table_name: &str, row: usize) -> String {
    format!("{}_row_{}", table_name, row)
}

/// Declared grid shape and column metadata of a table
///
/// Kept by the store next to the table identity so a grid whose last rows or
/// columns are empty still comes back at its declared size, and so cells
/// written later into such positions get the flags their column was created
/// with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub row_count: usize,
    pub column_count: usize,
    pub column_names: Vec<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub sensitive_columns: Vec<usize>,
    #[serde(default)]
    pub url_columns: Vec<usize>,
    /// Caller tags, without the table name
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TableLayout {
    pub fn is_sensitive(&self, col: usize) -> bool {
        self.sensitive_columns.contains(&col)
    }

    pub fn is_url(&self, col: usize) -> bool {
        self.url_columns.contains(&col)
    }

    /// Grow the declared shape so that `(row, col)` lies inside it
    pub fn include(&mut self, row: usize, col: usize) {
        self.row_count = self.row_count.max(row + 1);
        if col >= self.column_count {
            self.column_count = col + 1;
            self.column_names.resize(self.column_count, String::new());
        }
    }

    /// Label of column `col`, empty when unnamed
    pub fn label(&self, col: usize) -> &str {
        self.column_names.get(col).map_or("", String::as_str)
    }

    /// Set the label of column `col`, growing the shape if needed
    pub fn set_label(&mut self, col: usize, label: &str) {
        if col >= self.column_names.len() {
            self.column_names.resize(col + 1, String::new());
            self.column_count = self.column_count.max(col + 1);
        }
        self.column_names[col] = label.to_string();
    }
}

/// A cell ready to be persisted, before the store assigns it to a table id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCell {
    pub row: usize,
    pub col: usize,
    pub label: String,
    pub content: String,
    pub is_sensitive: bool,
    pub is_url: bool,
    pub tags: Vec<String>,
}

/// Request to create a whole table from a grid
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub category_id: CategoryId,
    pub name: String,
    pub data: Matrix,
    pub column_names: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sensitive_columns: Vec<usize>,
    #[serde(default)]
    pub url_columns: Vec<usize>,
}

impl CreateTableRequest {
    pub fn new(
        category_id: CategoryId,
        name: impl Into<String>,
        data: Matrix,
        column_names: Vec<String>,
    ) -> Self {
        Self {
            category_id,
            name: name.into(),
            data,
            column_names,
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_sensitive_columns(mut self, columns: Vec<usize>) -> Self {
        self.sensitive_columns = columns;
        self
    }

    pub fn with_url_columns(mut self, columns: Vec<usize>) -> Self {
        self.url_columns = columns;
        self
    }
}

/// What the store reports after an atomic multi-insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub table_id: TableId,
    pub items_created: usize,
    /// Non-fatal encoding problems (skipped indices and the like)
    pub errors: Vec<String>,
}

/// Metadata reconstructed alongside a table's grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub row_count: usize,
    pub column_count: usize,
    pub item_count: usize,
    pub category_id: Option<CategoryId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A table rebuilt from its flat records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableExport {
    pub table_name: String,
    pub columns: Vec<String>,
    pub rows: Matrix,
    pub metadata: ExportMetadata,
}

/// Category as exposed by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Per-table statistics within one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub id: TableId,
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Summary row for listing tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table_name: String,
    pub category_name: String,
    pub rows: usize,
    pub cols: usize,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
}
