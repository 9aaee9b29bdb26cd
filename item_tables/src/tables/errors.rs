//! Table store error types.

use super::models::TableId;
use crate::db::TimeoutError;
use std::time::Duration;
use thiserror::Error;

/// SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// Table errors
#[derive(Debug, Error)]
pub enum TableError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store call did not complete in time
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Table name failed validation
    #[error("Invalid table name: {0}")]
    InvalidName(String),

    /// Another live table already uses this name
    #[error("Table name already exists: {0}")]
    DuplicateName(String),

    /// No table (or no cell records) for this name
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// No table for this identifier
    #[error("Table not found for id {0}")]
    TableIdNotFound(TableId),

    /// Any other store-side failure
    #[error("Store error: {0}")]
    Store(String),
}

impl TableError {
    /// Get a client-safe error message
    ///
    /// Database and store errors are reduced to a generic message so SQL details
    /// never reach the user.
    pub fn client_message(&self) -> String {
        match self {
            TableError::Database(_) | TableError::Store(_) => {
                "The table store could not complete the operation".to_string()
            }
            TableError::Timeout(_) => "The table store did not respond in time".to_string(),
            TableError::TableIdNotFound(_) => "Table not found".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether this error means the table simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TableError::TableNotFound(_) | TableError::TableIdNotFound(_)
        )
    }

    /// Map a sqlx error, turning a unique-name violation into `DuplicateName`.
    pub(crate) fn from_sqlx_for_name(err: sqlx::Error, name: &str) -> Self {
        let is_unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == UNIQUE_VIOLATION);

        if is_unique_violation {
            TableError::DuplicateName(name.to_string())
        } else {
            TableError::Database(err)
        }
    }
}

impl From<TimeoutError> for TableError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(d) => TableError::Timeout(d),
            TimeoutError::Database(e) => TableError::Database(e),
        }
    }
}

/// Result type for table store operations
pub type TableResult<T> = Result<T, TableError>;
