//! PostgreSQL table store.
//!
//! Cells reference their table through a real foreign key and a composite
//! primary key `(table_id, row_index, column_index)`. Renaming a table touches
//! one row; deleting it cascades to its cells.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;

use super::encoding::{decode_structure, encode_cells};
use super::errors::{TableError, TableResult};
use super::models::{
    Category, CategoryId, CategoryTable, CellRecord, CreateTableRequest, InsertOutcome, Table,
    TableExport, TableId, TableLayout,
};
use super::store::TableStore;
use super::config::TablesConfig;
use crate::db::timeouts::{
    DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, TimeoutError, with_timeout,
};

/// Schema owned by this store. Every statement is idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS item_tables (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    row_count INTEGER NOT NULL DEFAULT 0,
    column_count INTEGER NOT NULL DEFAULT 0,
    column_names TEXT[] NOT NULL DEFAULT '{}',
    category_id BIGINT,
    sensitive_columns INTEGER[] NOT NULL DEFAULT '{}',
    url_columns INTEGER[] NOT NULL DEFAULT '{}',
    tags TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS table_cells (
    table_id BIGINT NOT NULL REFERENCES item_tables(id) ON DELETE CASCADE,
    row_index INTEGER NOT NULL,
    column_index INTEGER NOT NULL,
    label TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    category_id BIGINT,
    is_sensitive BOOLEAN NOT NULL DEFAULT FALSE,
    is_url BOOLEAN NOT NULL DEFAULT FALSE,
    tags TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    PRIMARY KEY (table_id, row_index, column_index)
);

CREATE INDEX IF NOT EXISTS idx_table_cells_category ON table_cells(category_id);
"#;

const TABLE_COLUMNS: &str = "id, name, description, created_at, updated_at";

const CELL_SELECT: &str = r#"
SELECT c.table_id, t.name AS name_table, c.row_index, c.column_index, c.label, c.content,
       c.category_id, c.is_sensitive, c.is_url, c.tags, c.created_at
FROM table_cells c
JOIN item_tables t ON t.id = c.table_id
"#;

/// PostgreSQL implementation of [`TableStore`]
#[derive(Clone)]
pub struct PgTableStore {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PgTableStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Store whose per-call timeout is `config.query_timeout()`
    pub fn with_config(pool: Arc<PgPool>, config: &TablesConfig) -> Self {
        Self::new(pool).with_query_timeout(config.query_timeout())
    }

    /// Override the per-call timeout
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create the store's tables and indexes if they are missing
    pub async fn ensure_schema(&self) -> TableResult<()> {
        with_timeout(self.timeout, sqlx::raw_sql(SCHEMA).execute(self.pool.as_ref())).await?;
        Ok(())
    }

    /// Multi-statement transactions get at least the default transaction budget
    fn transaction_timeout(&self) -> Duration {
        self.timeout.max(DEFAULT_TRANSACTION_TIMEOUT)
    }

    async fn table_id_by_name(&self, name: &str) -> TableResult<Option<TableId>> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT id FROM item_tables WHERE name = $1")
                .bind(name)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn layout(&self, id: TableId) -> TableResult<Option<TableLayout>> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                SELECT row_count, column_count, column_names,
                       category_id, sensitive_columns, url_columns, tags
                FROM item_tables
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.as_ref().map(layout_from_row))
    }

    async fn cells_where(&self, clause: &str, id: TableId) -> TableResult<Vec<CellRecord>> {
        let sql = format!("{CELL_SELECT} WHERE {clause} ORDER BY c.row_index, c.column_index");
        let rows = with_timeout(
            self.timeout,
            sqlx::query(&sql).bind(id).fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows.iter().map(cell_from_row).collect())
    }
}

fn to_db_index(value: usize) -> TableResult<i32> {
    i32::try_from(value).map_err(|_| TableError::Store(format!("index {} out of range", value)))
}

fn from_db_index(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

fn to_db_indices(values: &[usize]) -> TableResult<Vec<i32>> {
    values.iter().copied().map(to_db_index).collect()
}

fn from_db_count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

fn table_from_row(r: &PgRow) -> Table {
    Table::from_parts(
        Some(r.get("id")),
        r.get::<String, _>("name"),
        r.get::<String, _>("description"),
        Some(r.get::<chrono::NaiveDateTime, _>("created_at").and_utc()),
        Some(r.get::<chrono::NaiveDateTime, _>("updated_at").and_utc()),
    )
}

fn layout_from_row(r: &PgRow) -> TableLayout {
    let indices = |column: &str| -> Vec<usize> {
        r.get::<Vec<i32>, _>(column)
            .into_iter()
            .map(from_db_index)
            .collect()
    };

    TableLayout {
        row_count: from_db_index(r.get("row_count")),
        column_count: from_db_index(r.get("column_count")),
        column_names: r.get("column_names"),
        category_id: r.get("category_id"),
        sensitive_columns: indices("sensitive_columns"),
        url_columns: indices("url_columns"),
        tags: r.get("tags"),
    }
}

fn cell_from_row(r: &PgRow) -> CellRecord {
    CellRecord {
        table_id: r.get("table_id"),
        name_table: r.get("name_table"),
        row: from_db_index(r.get("row_index")),
        col: from_db_index(r.get("column_index")),
        label: r.get("label"),
        content: r.get("content"),
        category_id: r.get("category_id"),
        is_sensitive: r.get("is_sensitive"),
        is_url: r.get("is_url"),
        tags: r.get("tags"),
        created_at: r.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn add_table_items(&self, request: &CreateTableRequest) -> TableResult<InsertOutcome> {
        let name = request.name.trim();
        let encoded = encode_cells(request);
        let layout = &encoded.layout;

        let mut cells = Vec::with_capacity(encoded.cells.len());
        for cell in &encoded.cells {
            cells.push((to_db_index(cell.row)?, to_db_index(cell.col)?, cell));
        }
        let row_count = to_db_index(layout.row_count)?;
        let column_count = to_db_index(layout.column_count)?;
        let sensitive_columns = to_db_indices(&layout.sensitive_columns)?;
        let url_columns = to_db_indices(&layout.url_columns)?;

        // Identity and cells share one transaction; dropping it on error or
        // timeout rolls everything back.
        let insert = async {
            let mut tx = self.pool.begin().await?;

            let row = sqlx::query(
                r#"
                INSERT INTO item_tables (
                    name, row_count, column_count, column_names,
                    category_id, sensitive_columns, url_columns, tags
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(name)
            .bind(row_count)
            .bind(column_count)
            .bind(&layout.column_names)
            .bind(layout.category_id)
            .bind(&sensitive_columns)
            .bind(&url_columns)
            .bind(&layout.tags)
            .fetch_one(&mut *tx)
            .await?;
            let table_id: TableId = row.get("id");

            for (row_index, column_index, cell) in &cells {
                sqlx::query(
                    r#"
                    INSERT INTO table_cells (
                        table_id, row_index, column_index, label, content,
                        category_id, is_sensitive, is_url, tags
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(table_id)
                .bind(*row_index)
                .bind(*column_index)
                .bind(&cell.label)
                .bind(&cell.content)
                .bind(request.category_id)
                .bind(cell.is_sensitive)
                .bind(cell.is_url)
                .bind(&cell.tags)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<_, sqlx::Error>(table_id)
        };

        let table_id = match with_timeout(self.transaction_timeout(), insert).await {
            Ok(id) => id,
            Err(TimeoutError::Database(e)) => {
                return Err(TableError::from_sqlx_for_name(e, name));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(InsertOutcome {
            table_id,
            items_created: cells.len(),
            errors: encoded.errors,
        })
    }

    async fn get_table_items(&self, name: &str) -> TableResult<Vec<CellRecord>> {
        match self.table_id_by_name(name).await? {
            Some(id) => self.cells_where("c.table_id = $1", id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn update_table_cell(
        &self,
        name: &str,
        row: usize,
        col: usize,
        content: &str,
    ) -> TableResult<bool> {
        let Some(id) = self.table_id_by_name(name).await? else {
            return Ok(false);
        };
        let (row_index, column_index) = (to_db_index(row)?, to_db_index(col)?);

        if content.is_empty() {
            // Blanking keeps the record; an empty position stays without one.
            with_timeout(
                self.timeout,
                sqlx::query(
                    "UPDATE table_cells SET content = '' WHERE table_id = $1 AND row_index = $2 AND column_index = $3",
                )
                .bind(id)
                .bind(row_index)
                .bind(column_index)
                .execute(self.pool.as_ref()),
            )
            .await?;
        } else {
            // A position that held no record takes its flags, category and
            // tags from what the table was created with.
            with_timeout(
                self.timeout,
                sqlx::query(
                    r#"
                    INSERT INTO table_cells (
                        table_id, row_index, column_index, label, content,
                        category_id, is_sensitive, is_url, tags
                    )
                    SELECT t.id, $2, $3,
                        COALESCE(
                            NULLIF(t.column_names[$3 + 1], ''),
                            (SELECT label FROM table_cells WHERE table_id = $1 AND column_index = $3 LIMIT 1),
                            ''
                        ),
                        $4,
                        t.category_id,
                        $3 = ANY(t.sensitive_columns),
                        $3 = ANY(t.url_columns),
                        array_append(array_remove(t.tags, $5), $5)
                    FROM item_tables t
                    WHERE t.id = $1
                    ON CONFLICT (table_id, row_index, column_index)
                    DO UPDATE SET content = EXCLUDED.content
                    "#,
                )
                .bind(id)
                .bind(row_index)
                .bind(column_index)
                .bind(content)
                .bind(name)
                .execute(self.pool.as_ref()),
            )
            .await?;
        }

        with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                UPDATE item_tables
                SET row_count = GREATEST(row_count, $2 + 1),
                    column_count = GREATEST(column_count, $3 + 1),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(row_index)
            .bind(column_index)
            .execute(self.pool.as_ref()),
        )
        .await?;

        Ok(true)
    }

    async fn update_column_label(&self, name: &str, col: usize, label: &str) -> TableResult<bool> {
        let Some(id) = self.table_id_by_name(name).await? else {
            return Ok(false);
        };
        let mut layout = self.layout(id).await?.unwrap_or_default();
        layout.set_label(col, label);
        let column_index = to_db_index(col)?;
        let column_count = to_db_index(layout.column_count)?;

        let relabel = async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "UPDATE item_tables SET column_names = $2, column_count = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(&layout.column_names)
            .bind(column_count)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE table_cells SET label = $3 WHERE table_id = $1 AND column_index = $2",
            )
            .bind(id)
            .bind(column_index)
            .bind(label)
            .execute(&mut *tx)
            .await?;

            tx.commit().await
        };
        with_timeout(self.transaction_timeout(), relabel).await?;

        Ok(true)
    }

    async fn delete_table(&self, id: TableId) -> TableResult<bool> {
        let result = with_timeout(
            self.timeout,
            sqlx::query("DELETE FROM item_tables WHERE id = $1")
                .bind(id)
                .execute(self.pool.as_ref()),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_table_by_name(&self, name: &str) -> TableResult<bool> {
        let result = with_timeout(
            self.timeout,
            sqlx::query("DELETE FROM item_tables WHERE name = $1")
                .bind(name)
                .execute(self.pool.as_ref()),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_table(&self, id: TableId) -> TableResult<Option<Table>> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM item_tables WHERE id = $1");
        let row = with_timeout(
            self.timeout,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.as_ref().map(table_from_row))
    }

    async fn get_table_by_name(&self, name: &str) -> TableResult<Option<Table>> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM item_tables WHERE name = $1");
        let row = with_timeout(
            self.timeout,
            sqlx::query(&sql).bind(name).fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.as_ref().map(table_from_row))
    }

    async fn add_table(&self, name: &str, description: &str) -> TableResult<TableId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TableError::InvalidName(
                "Table name cannot be empty".to_string(),
            ));
        }

        let result = with_timeout(
            self.timeout,
            sqlx::query("INSERT INTO item_tables (name, description) VALUES ($1, $2) RETURNING id")
                .bind(name)
                .bind(description)
                .fetch_one(self.pool.as_ref()),
        )
        .await;

        match result {
            Ok(row) => Ok(row.get("id")),
            Err(TimeoutError::Database(e)) => Err(TableError::from_sqlx_for_name(e, name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_table(
        &self,
        id: TableId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> TableResult<()> {
        let name = name.map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(TableError::InvalidName(
                "Table name cannot be empty".to_string(),
            ));
        }

        let result = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                UPDATE item_tables
                SET name = COALESCE($2, name),
                    description = COALESCE($3, description),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(name)
            .bind(description)
            .execute(self.pool.as_ref()),
        )
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(TableError::TableIdNotFound(id)),
            Ok(_) => Ok(()),
            Err(TimeoutError::Database(e)) => {
                Err(TableError::from_sqlx_for_name(e, name.unwrap_or_default()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all_tables(&self) -> TableResult<Vec<Table>> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM item_tables ORDER BY id ASC");
        let rows = with_timeout(
            self.timeout,
            sqlx::query(&sql).fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows.iter().map(table_from_row).collect())
    }

    async fn get_tables_by_category(
        &self,
        category_id: CategoryId,
    ) -> TableResult<Vec<CategoryTable>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                SELECT t.id, t.name, t.created_at,
                       GREATEST(t.row_count, MAX(c.row_index) + 1) AS row_total,
                       GREATEST(t.column_count, MAX(c.column_index) + 1) AS column_total,
                       COUNT(c.*) AS item_count
                FROM item_tables t
                JOIN table_cells c ON c.table_id = t.id
                WHERE t.id IN (SELECT table_id FROM table_cells WHERE category_id = $1)
                GROUP BY t.id
                ORDER BY t.id ASC
                "#,
            )
            .bind(category_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows
            .iter()
            .map(|r| CategoryTable {
                id: r.get("id"),
                name: r.get("name"),
                rows: from_db_index(r.get("row_total")),
                cols: from_db_index(r.get("column_total")),
                item_count: from_db_count(r.get("item_count")),
                created_at: r.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            })
            .collect())
    }

    async fn count_items_in_table(&self, id: TableId) -> TableResult<usize> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT COUNT(*) AS count FROM table_cells WHERE table_id = $1")
                .bind(id)
                .fetch_one(self.pool.as_ref()),
        )
        .await?;

        Ok(from_db_count(row.get("count")))
    }

    async fn export_table(&self, name: &str) -> TableResult<Option<TableExport>> {
        let Some(table) = self.get_table_by_name(name).await? else {
            return Ok(None);
        };
        let Some(id) = table.id else {
            return Ok(None);
        };

        let layout = self.layout(id).await?;
        let records = self.cells_where("c.table_id = $1", id).await?;
        Ok(decode_structure(name, Some(&table), layout.as_ref(), &records))
    }

    async fn get_categories(&self) -> TableResult<Vec<Category>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query("SELECT id, name FROM categories ORDER BY id ASC")
                .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows
            .iter()
            .map(|r| Category {
                id: r.get("id"),
                name: r.get("name"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> Arc<PgPool> {
        Arc::new(
            PgPoolOptions::new()
                .connect_lazy("postgres://postgres@localhost/item_tables")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_default_and_configured_timeouts() {
        let store = PgTableStore::new(lazy_pool());
        assert_eq!(store.timeout, DEFAULT_QUERY_TIMEOUT);
        assert_eq!(store.transaction_timeout(), DEFAULT_TRANSACTION_TIMEOUT);

        let config = TablesConfig {
            query_timeout_secs: 30,
            ..TablesConfig::default()
        };
        let store = PgTableStore::with_config(lazy_pool(), &config);
        assert_eq!(store.timeout, Duration::from_secs(30));
        assert_eq!(store.transaction_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_index_conversion() {
        assert_eq!(to_db_indices(&[0, 3]).unwrap(), vec![0, 3]);
        assert!(to_db_index(usize::MAX).is_err());
        assert_eq!(from_db_index(-1), 0);
    }
}
