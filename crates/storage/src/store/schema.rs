#![forbid(unsafe_code)]

use super::error::{BackendError, StoreError};
use rusqlite::Connection;
use std::collections::BTreeSet;

pub(super) const REQUIRED_TABLES: [&str; 8] = [
    "namespaces",
    "workspaces",
    "nodes",
    "binary_data",
    "node_references",
    "node_types",
    "node_type_properties",
    "node_type_children",
];

pub(super) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS namespaces (
          prefix TEXT PRIMARY KEY,
          uri TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workspaces (
          name TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS nodes (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          path TEXT NOT NULL,
          parent TEXT NOT NULL,
          local_name TEXT NOT NULL,
          namespace TEXT NOT NULL,
          workspace_name TEXT NOT NULL,
          identifier TEXT NOT NULL,
          type TEXT NOT NULL,
          props TEXT NOT NULL,
          depth INTEGER NOT NULL,
          sort_order INTEGER,
          UNIQUE(path, workspace_name),
          UNIQUE(identifier)
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent);
        CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(type);
        CREATE INDEX IF NOT EXISTS idx_nodes_local_name ON nodes(local_name, namespace);

        CREATE TABLE IF NOT EXISTS binary_data (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          node_id INTEGER NOT NULL,
          property_name TEXT NOT NULL,
          workspace_name TEXT NOT NULL,
          idx INTEGER NOT NULL DEFAULT 0,
          data BLOB NOT NULL,
          UNIQUE(node_id, property_name, workspace_name, idx)
        );

        CREATE TABLE IF NOT EXISTS node_references (
          source_id INTEGER NOT NULL,
          source_property_name TEXT NOT NULL,
          target_id INTEGER NOT NULL,
          kind INTEGER NOT NULL,
          PRIMARY KEY(source_id, source_property_name, target_id),
          FOREIGN KEY(source_id) REFERENCES nodes(id) ON DELETE CASCADE,
          FOREIGN KEY(target_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_node_references_target ON node_references(target_id);

        CREATE TABLE IF NOT EXISTS node_types (
          node_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL UNIQUE,
          supertypes TEXT NOT NULL,
          is_abstract INTEGER NOT NULL DEFAULT 0,
          is_mixin INTEGER NOT NULL DEFAULT 0,
          queryable INTEGER NOT NULL DEFAULT 1,
          orderable_child_nodes INTEGER NOT NULL DEFAULT 0,
          primary_item TEXT
        );

        CREATE TABLE IF NOT EXISTS node_type_properties (
          node_type_id INTEGER NOT NULL,
          position INTEGER NOT NULL,
          name TEXT NOT NULL,
          required_type INTEGER NOT NULL,
          multiple INTEGER NOT NULL DEFAULT 0,
          mandatory INTEGER NOT NULL DEFAULT 0,
          auto_created INTEGER NOT NULL DEFAULT 0,
          protected INTEGER NOT NULL DEFAULT 0,
          default_values TEXT NOT NULL DEFAULT '[]',
          PRIMARY KEY(node_type_id, position),
          FOREIGN KEY(node_type_id) REFERENCES node_types(node_type_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS node_type_children (
          node_type_id INTEGER NOT NULL,
          position INTEGER NOT NULL,
          name TEXT NOT NULL,
          primary_types TEXT NOT NULL,
          default_type TEXT,
          mandatory INTEGER NOT NULL DEFAULT 0,
          auto_created INTEGER NOT NULL DEFAULT 0,
          protected INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY(node_type_id, position),
          FOREIGN KEY(node_type_id) REFERENCES node_types(node_type_id) ON DELETE CASCADE
        );
        "#,
    )?;
    Ok(())
}

/// Fails with a backend error naming the first missing table.
pub(super) fn verify_schema(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    for table in REQUIRED_TABLES {
        if !tables.contains(table) {
            return Err(BackendError::MissingSchema(table).into());
        }
    }
    Ok(())
}
