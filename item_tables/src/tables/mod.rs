//! Tables module storing user-entered grids as flat cell records.
//!
//! This module implements:
//! - Grid to record encoding keyed by `(table_id, row, column)`
//! - Name and content validation
//! - Atomic table creation and best-effort cell-by-cell updates
//! - Rename without rewriting cells, and cascade delete
//! - A verified name to id cache for identity lookups
//! - Change notifications over bounded channels
//!
//! ## Example
//!
//! ```no_run
//! use item_tables::db::{Database, DatabaseConfig};
//! use item_tables::tables::{CreateTableRequest, PgTableStore, TableController, TablesConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let config = TablesConfig::from_env();
//!     let store = PgTableStore::with_config(Arc::new(db.pool().clone()), &config);
//!     store.ensure_schema().await?;
//!
//!     let controller = TableController::with_config(Arc::new(store), config);
//!     let outcome = controller
//!         .create_table(CreateTableRequest::new(
//!             1,
//!             "INVENTORY",
//!             vec![vec!["bolts".into(), "40".into()]],
//!             vec!["Item".into(), "Qty".into()],
//!         ))
//!         .await;
//!     println!("Created {} items", outcome.items_created);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod encoding;
pub mod errors;
pub mod events;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
pub mod validator;

pub use config::TablesConfig;
pub use controller::{
    CreateTableOutcome, DeleteOutcome, RenameOutcome, StructureOutcome, TableController,
    UpdateOutcome,
};
pub use errors::{TableError, TableResult};
pub use events::{EventBus, TableEvent};
pub use manager::TableManager;
pub use memory::InMemoryTableStore;
pub use models::{
    Category, CategoryId, CategoryTable, CellRecord, CreateTableRequest, Matrix, Table,
    TableExport, TableId, TableInfo, TableLayout, TableSummary,
};
pub use postgres::PgTableStore;
pub use store::TableStore;
pub use validator::ValidationError;
