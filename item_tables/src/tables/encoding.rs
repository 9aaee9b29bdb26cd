//! Grid to flat record encoding, and back.
//!
//! A table of `M x N` cells is stored as one record per non-empty cell, each
//! carrying its `(row, column)` position, the column label and its metadata.
//! Both store implementations encode through [`encode_cells`] and rebuild grids
//! through [`decode_structure`], so the record layout is defined in one place.
//!
//! Column names shorter than the widest row are padded with empty labels; extra
//! names beyond the widest row are ignored.

use super::models::{
    CellRecord, CreateTableRequest, ExportMetadata, NewCell, Table, TableExport, TableLayout,
};
use super::validator::sanitize_cell_content;
use std::collections::BTreeMap;

/// Encoded cells plus the non-fatal problems found while encoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedTable {
    pub cells: Vec<NewCell>,
    pub layout: TableLayout,
    pub errors: Vec<String>,
}

/// Number of columns of a possibly ragged matrix
pub fn column_count<S>(data: &[Vec<S>]) -> usize {
    data.iter().map(Vec::len).max().unwrap_or(0)
}

/// Caller tags plus the table name, trimmed and deduplicated in order
pub fn cell_tags(tags: &[String], table_name: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len() + 1);
    for tag in tags.iter().map(|t| t.trim()).chain(std::iter::once(table_name)) {
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Encode a table creation request into flat cells
///
/// Empty cells produce no record. Sensitive or URL column indices outside the
/// matrix are skipped and reported in `errors`.
pub fn encode_cells(request: &CreateTableRequest) -> EncodedTable {
    let columns = column_count(&request.data);
    let mut errors = Vec::new();

    let sensitive =
        checked_columns(&request.sensitive_columns, columns, "Sensitive", &mut errors);
    let urls = checked_columns(&request.url_columns, columns, "URL", &mut errors);
    let tags = cell_tags(&request.tags, &request.name);
    let layout = TableLayout {
        row_count: request.data.len(),
        column_count: columns,
        column_names: (0..columns)
            .map(|col| request.column_names.get(col).cloned().unwrap_or_default())
            .collect(),
        category_id: Some(request.category_id),
        sensitive_columns: sensitive,
        url_columns: urls,
        tags: cell_tags(&request.tags, ""),
    };

    let mut cells = Vec::new();
    for (row, values) in request.data.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            let content = sanitize_cell_content(value);
            if content.is_empty() {
                continue;
            }

            cells.push(NewCell {
                row,
                col,
                label: layout.label(col).to_string(),
                content,
                is_sensitive: layout.is_sensitive(col),
                is_url: layout.is_url(col),
                tags: tags.clone(),
            });
        }
    }

    EncodedTable {
        cells,
        layout,
        errors,
    }
}

fn checked_columns(
    indices: &[usize],
    columns: usize,
    kind: &str,
    errors: &mut Vec<String>,
) -> Vec<usize> {
    let mut valid = Vec::with_capacity(indices.len());
    for &index in indices {
        if index < columns {
            valid.push(index);
        } else {
            log::warn!("{} column index {} out of range, skipped", kind, index);
            errors.push(format!(
                "{} column index {} is out of range (table has {} columns)",
                kind, index, columns
            ));
        }
    }
    valid
}

/// Rebuild a table's grid from its records
///
/// Returns `None` when there are no records. The grid spans the declared
/// layout, grown to cover any record outside it; positions with no record come
/// back as empty strings. Column labels come from the layout, falling back to
/// the first record label seen in that column.
pub fn decode_structure(
    table_name: &str,
    table: Option<&Table>,
    layout: Option<&TableLayout>,
    records: &[CellRecord],
) -> Option<TableExport> {
    if records.is_empty() {
        return None;
    }

    let mut shape = layout.cloned().unwrap_or_default();
    for record in records {
        shape.include(record.row, record.col);
    }

    // Rows keyed by row index, grouped the way `list_group` groups them.
    let mut grouped: BTreeMap<usize, Vec<&CellRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.row).or_default().push(record);
    }

    let columns = (0..shape.column_count)
        .map(|col| {
            let declared = shape.label(col);
            if declared.is_empty() {
                records
                    .iter()
                    .find(|r| r.col == col)
                    .map(|r| r.label.clone())
                    .unwrap_or_default()
            } else {
                declared.to_string()
            }
        })
        .collect();

    let mut rows = vec![vec![String::new(); shape.column_count]; shape.row_count];
    for (row, mut cells) in grouped {
        cells.sort_by_key(|c| c.order_in_list());
        for cell in cells {
            rows[row][cell.col] = cell.content.clone();
        }
    }

    Some(TableExport {
        table_name: table_name.to_string(),
        columns,
        rows,
        metadata: ExportMetadata {
            row_count: shape.row_count,
            column_count: shape.column_count,
            item_count: records.len(),
            category_id: layout
                .and_then(|l| l.category_id)
                .or_else(|| records.iter().find_map(|r| r.category_id)),
            created_at: table
                .map(|t| t.created_at)
                .or_else(|| records.iter().map(|r| r.created_at).min()),
            updated_at: table.map(|t| t.updated_at),
        },
    })
}
