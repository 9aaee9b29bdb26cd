//! Table name and cell content validation.
//!
//! Everything here is pure: no I/O and no shared state. Callers supply the set
//! of existing names they want a candidate checked against.

use thiserror::Error;

/// Maximum table name length, in characters
pub const MAX_TABLE_NAME_LENGTH: usize = 100;

/// Names the store refuses as table names (compared case-insensitively)
pub const RESERVED_TABLE_NAMES: &[&str] = &[
    "add", "all", "alter", "and", "as", "categories", "category", "column", "create", "delete",
    "drop", "from", "index", "insert", "items", "join", "key", "not", "null", "or", "order",
    "primary", "select", "table", "tables", "tags", "update", "view", "where",
];

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Table name cannot be empty")]
    EmptyName,

    #[error("Table name cannot exceed {max} characters (got {len})")]
    NameTooLong { max: usize, len: usize },

    #[error("Table name '{0}' may only contain letters, digits, hyphens and underscores")]
    InvalidCharacters(String),

    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    #[error("A table named '{0}' already exists; table names must be unique")]
    DuplicateName(String),

    #[error("At least {required} cell(s) must contain data (found {filled})")]
    InsufficientData { filled: usize, required: usize },
}

/// Validate a table name against the default length limit
///
/// `exclude` names an existing table that the candidate may collide with, which
/// lets an edit keep its own name.
pub fn validate_table_name<S: AsRef<str>>(
    name: &str,
    existing: &[S],
    exclude: Option<&str>,
) -> Result<(), ValidationError> {
    validate_table_name_with_max(name, existing, exclude, MAX_TABLE_NAME_LENGTH)
}

/// Validate a table name with an explicit length limit
pub fn validate_table_name_with_max<S: AsRef<str>>(
    name: &str,
    existing: &[S],
    exclude: Option<&str>,
    max_length: usize,
) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let len = name.chars().count();
    if len > max_length {
        return Err(ValidationError::NameTooLong {
            max: max_length,
            len,
        });
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidCharacters(name.to_string()));
    }

    if RESERVED_TABLE_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(ValidationError::ReservedName(name.to_string()));
    }

    let lowered = name.to_lowercase();
    let excluded = exclude.map(|e| e.trim().to_lowercase());
    let taken = existing.iter().any(|candidate| {
        let candidate = candidate.as_ref().trim().to_lowercase();
        candidate == lowered && excluded.as_deref() != Some(candidate.as_str())
    });

    if taken {
        return Err(ValidationError::DuplicateName(name.to_string()));
    }

    Ok(())
}

/// Count non-empty cells and require at least `min_filled`
///
/// Rows may have different lengths; every cell present is counted.
pub fn validate_table_data<S: AsRef<str>>(
    data: &[Vec<S>],
    min_filled: usize,
) -> Result<usize, ValidationError> {
    let filled = count_filled_cells(data);
    if filled < min_filled {
        return Err(ValidationError::InsufficientData {
            filled,
            required: min_filled,
        });
    }
    Ok(filled)
}

/// Number of cells whose trimmed content is non-empty
pub fn count_filled_cells<S: AsRef<str>>(data: &[Vec<S>]) -> usize {
    data.iter()
        .flatten()
        .filter(|cell| !cell.as_ref().trim().is_empty())
        .count()
}

/// Trim a cell; whitespace-only content becomes empty. Idempotent.
pub fn sanitize_cell_content(content: &str) -> String {
    content.trim().to_string()
}

/// Sanitize every cell, keeping the matrix shape
pub fn sanitize_table_data<S: AsRef<str>>(data: &[Vec<S>]) -> Vec<Vec<String>> {
    data.iter()
        .map(|row| {
            row.iter()
                .map(|cell| sanitize_cell_content(cell.as_ref()))
                .collect()
        })
        .collect()
}
