#![forbid(unsafe_code)]

use super::*;
use cr_core::{NodeTypeDefinition, Property};
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use std::fmt::Write as _;

mod copy;
mod delete;
mod move_node;
mod read;
mod reorder;
mod store_node;
mod validate;

/// Rows per batched UPDATE when rewriting many paths or sort orders.
const UPDATE_CHUNK_ROWS: usize = 1_000;

/// One row of a batched update: the node id and one value per column.
struct RowUpdate {
    id: i64,
    values: Vec<SqlValue>,
}

/// Rewrites `columns` of every listed node with one
/// `UPDATE nodes SET col = CASE id WHEN ? THEN ? .. END` per chunk.
/// Returns the number of rows touched.
fn batched_update(
    conn: &Connection,
    columns: &[&str],
    rows: &[RowUpdate],
) -> Result<usize, StoreError> {
    let mut touched = 0;
    for chunk in rows.chunks(UPDATE_CHUNK_ROWS) {
        let mut sql = String::from("UPDATE nodes SET ");
        let mut bound: Vec<SqlValue> = Vec::with_capacity(chunk.len() * columns.len() * 2);
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{column} = CASE id");
            for row in chunk {
                let value = row.values.get(index).cloned().ok_or_else(|| {
                    StoreError::ConstraintViolation(format!(
                        "batched update of node {} is missing column {column}",
                        row.id
                    ))
                })?;
                bound.push(SqlValue::Integer(row.id));
                bound.push(value);
                let _ = write!(sql, " WHEN ?{} THEN ?{}", bound.len() - 1, bound.len());
            }
            let _ = write!(sql, " ELSE {column} END");
        }
        sql.push_str(" WHERE id IN (");
        for (index, row) in chunk.iter().enumerate() {
            if index > 0 {
                sql.push(',');
            }
            let _ = write!(sql, "{}", row.id);
        }
        sql.push(')');
        touched += conn.execute(&sql, params_from_iter(bound.iter()))?;
    }
    Ok(touched)
}

/// Shared preconditions of move and copy, checked in this order: the
/// source exists, the destination is free, its parent exists and the
/// destination is not the source or inside it.
fn check_relocation(
    conn: &Connection,
    workspace: &str,
    src: &NodePath,
    dst: &NodePath,
) -> Result<(), StoreError> {
    if src.is_root() {
        return Err(StoreError::ConstraintViolation(
            "the root node cannot be moved or copied".to_string(),
        ));
    }
    hierarchy::require_node_id(conn, workspace, src.as_str())?;
    let Some(dst_parent) = dst.parent() else {
        return Err(StoreError::AlreadyExists(format!(
            "node {dst} in workspace {workspace}"
        )));
    };
    if hierarchy::node_id(conn, workspace, dst.as_str())?.is_some() {
        return Err(StoreError::AlreadyExists(format!(
            "node {dst} in workspace {workspace}"
        )));
    }
    hierarchy::require_node_id(conn, workspace, dst_parent.as_str())?;
    if dst.is_self_or_descendant_of(src) {
        return Err(StoreError::ConstraintViolation(format!(
            "cannot relocate {src} into its own subtree at {dst}"
        )));
    }
    Ok(())
}
