#![forbid(unsafe_code)]

//! Derived reference edges: (source node, property) -> target node.

use super::error::StoreError;
use super::hierarchy::{node_id_for_identifier, require_node_id};
use super::to_sqlite_i64;
use cr_core::paths::property_path;
use cr_core::{NodePath, Property, PropertyType};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;

/// Drops every edge of `source_id` and inserts one per reference value
/// currently present in `properties`.
pub(super) fn rebuild_references_tx(
    conn: &Connection,
    workspace: &str,
    source_id: i64,
    source_path: &str,
    properties: &[&Property],
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM node_references WHERE source_id=?1",
        params![source_id],
    )?;

    for property in properties {
        let kind = property.kind();
        if !kind.is_reference() {
            continue;
        }
        let targets: BTreeSet<&str> = property.strings().into_iter().collect();
        for identifier in targets {
            let Some(target_id) = node_id_for_identifier(conn, workspace, identifier)? else {
                if kind == PropertyType::Reference {
                    return Err(StoreError::IntegrityViolation(format!(
                        "{} references missing node {identifier}",
                        property_path(source_path, property.name())
                    )));
                }
                tracing::warn!(
                    workspace,
                    path = source_path,
                    property = property.name(),
                    target = identifier,
                    "dropping weak reference to missing node"
                );
                continue;
            };
            conn.execute(
                "INSERT OR IGNORE INTO node_references\
                 (source_id, source_property_name, target_id, kind) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![source_id, property.name(), target_id, kind.code()],
            )?;
        }
    }
    Ok(())
}

pub(super) fn delete_property_references_tx(
    conn: &Connection,
    source_id: i64,
    property_name: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM node_references WHERE source_id=?1 AND source_property_name=?2",
        params![source_id, property_name],
    )?;
    Ok(())
}

/// Property paths of the given kind pointing at `target_path`.
pub(super) fn referencing_properties(
    conn: &Connection,
    workspace: &str,
    target_path: &str,
    name: Option<&str>,
    kind: PropertyType,
) -> Result<Vec<String>, StoreError> {
    let target_id = require_node_id(conn, workspace, target_path)?;
    let mut stmt = conn.prepare(
        "SELECT s.path, r.source_property_name FROM node_references r \
         JOIN nodes s ON s.id = r.source_id \
         WHERE r.target_id=?1 AND r.kind=?2 AND (?3 IS NULL OR r.source_property_name=?3) \
         ORDER BY s.path ASC, r.source_property_name ASC",
    )?;
    let mut rows = stmt.query(params![target_id, kind.code(), name])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let source_path = row.get::<_, String>(0)?;
        let property = row.get::<_, String>(1)?;
        out.push(property_path(&source_path, &property));
    }
    Ok(out)
}

/// Property paths holding a strong reference to `path` or any descendant.
pub(super) fn strong_references_into_subtree(
    conn: &Connection,
    workspace: &str,
    path: &NodePath,
) -> Result<Vec<String>, StoreError> {
    let prefix = path.descendant_prefix();
    let prefix_len = to_sqlite_i64(prefix.chars().count())?;
    let mut stmt = conn.prepare(
        "SELECT s.path, r.source_property_name FROM node_references r \
         JOIN nodes t ON t.id = r.target_id \
         JOIN nodes s ON s.id = r.source_id \
         WHERE t.workspace_name=?1 AND (t.path=?2 OR substr(t.path, 1, ?3)=?4) AND r.kind=?5 \
         ORDER BY s.path ASC, r.source_property_name ASC",
    )?;
    let mut rows = stmt.query(params![
        workspace,
        path.as_str(),
        prefix_len,
        prefix,
        PropertyType::Reference.code()
    ])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let source_path = row.get::<_, String>(0)?;
        let property = row.get::<_, String>(1)?;
        out.push(property_path(&source_path, &property));
    }
    Ok(out)
}
