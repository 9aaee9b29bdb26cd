//! # Item Tables
//!
//! Tabular data (rows × columns of free-text cells) kept in a store whose unit
//! is a flat item record.
//!
//! Each non-empty cell becomes one record addressed by `(table_id, row, column)`
//! and carrying its column label, sensitivity and URL flags, category and tags.
//! Tables are created atomically, updated cell by cell, renamed without
//! touching their cells, and deleted with all of their records.
//!
//! ## Core Modules
//!
//! - [`tables`]: Validation, encoding, record stores, identity cache and workflows
//! - [`db`]: PostgreSQL connection pool, configuration and query timeouts
//!
//! ## Example
//!
//! ```
//! use item_tables::tables::{CreateTableRequest, InMemoryTableStore, TableController};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let controller = TableController::new(Arc::new(InMemoryTableStore::new()));
//! let outcome = controller
//!     .create_table(CreateTableRequest::new(
//!         7,
//!         "INVENTORY",
//!         vec![vec!["a".into(), "b".into()], vec!["".into(), "d".into()]],
//!         vec!["Col1".into(), "Col2".into()],
//!     ))
//!     .await;
//!
//! assert!(outcome.success);
//! assert_eq!(outcome.items_created, 3);
//! # }
//! ```

/// PostgreSQL pool, configuration and timeouts.
pub mod db;

/// Table storage, validation and workflows.
pub mod tables;

pub use tables::{
    CreateTableRequest, InMemoryTableStore, PgTableStore, TableController, TableError,
    TableEvent, TableManager, TableStore,
};
