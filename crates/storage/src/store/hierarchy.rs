#![forbid(unsafe_code)]

//! Node rows keyed by (workspace, path) and by identifier.
//!
//! Parent, local name, namespace and depth are derived from the path on
//! every write. Children are found by parent lookup ordered by sort order.

use super::error::StoreError;
use super::to_sqlite_i64;
use cr_core::namespaces::split_qualified_name;
use cr_core::{NamespaceMap, NodePath};
use rusqlite::{Connection, OptionalExtension, params};

pub(super) const NODE_COLUMNS: &str =
    "id, identifier, path, type, depth, sort_order, props";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct NodeRow {
    pub id: i64,
    pub identifier: String,
    pub path: String,
    pub node_type: String,
    pub depth: i64,
    pub sort_order: Option<i64>,
    pub props: String,
}

impl NodeRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            identifier: row.get(1)?,
            path: row.get(2)?,
            node_type: row.get(3)?,
            depth: row.get(4)?,
            sort_order: row.get(5)?,
            props: row.get(6)?,
        })
    }
}

pub(super) struct NewNodeRow<'a> {
    pub workspace: &'a str,
    pub path: &'a NodePath,
    pub node_type: &'a str,
    pub identifier: &'a str,
    pub props: &'a str,
}

pub(super) fn node_id(
    conn: &Connection,
    workspace: &str,
    path: &str,
) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id FROM nodes WHERE path=?1 AND workspace_name=?2",
            params![path, workspace],
            |row| row.get::<_, i64>(0),
        )
        .optional()?)
}

pub(super) fn require_node_id(
    conn: &Connection,
    workspace: &str,
    path: &str,
) -> Result<i64, StoreError> {
    node_id(conn, workspace, path)?
        .ok_or_else(|| StoreError::NotFound(format!("node {path} in workspace {workspace}")))
}

pub(super) fn load_row(
    conn: &Connection,
    workspace: &str,
    path: &str,
) -> Result<Option<NodeRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE path=?1 AND workspace_name=?2"),
            params![path, workspace],
            NodeRow::from_row,
        )
        .optional()?)
}

pub(super) fn require_row(
    conn: &Connection,
    workspace: &str,
    path: &str,
) -> Result<NodeRow, StoreError> {
    load_row(conn, workspace, path)?
        .ok_or_else(|| StoreError::NotFound(format!("node {path} in workspace {workspace}")))
}

/// The node at `path` and every descendant, parents before children and
/// siblings in sort order.
pub(super) fn load_subtree(
    conn: &Connection,
    workspace: &str,
    path: &NodePath,
) -> Result<Vec<NodeRow>, StoreError> {
    let prefix = path.descendant_prefix();
    let prefix_len = to_sqlite_i64(prefix.chars().count())?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS} FROM nodes \
         WHERE workspace_name=?1 AND (path=?2 OR substr(path, 1, ?3)=?4) \
         ORDER BY depth ASC, parent ASC, sort_order ASC, id ASC"
    ))?;
    let mut rows = stmt.query(params![workspace, path.as_str(), prefix_len, prefix])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(NodeRow::from_row(row)?);
    }
    Ok(out)
}

pub(super) fn child_names(
    conn: &Connection,
    workspace: &str,
    parent: &str,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT path FROM nodes \
         WHERE parent=?1 AND workspace_name=?2 \
         ORDER BY sort_order ASC, id ASC",
    )?;
    let mut rows = stmt.query(params![parent, workspace])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let path = row.get::<_, String>(0)?;
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        out.push(name);
    }
    Ok(out)
}

pub(super) fn path_for_identifier(
    conn: &Connection,
    workspace: &str,
    identifier: &str,
) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT path FROM nodes WHERE identifier=?1 AND workspace_name=?2",
            params![identifier, workspace],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

pub(super) fn node_id_for_identifier(
    conn: &Connection,
    workspace: &str,
    identifier: &str,
) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id FROM nodes WHERE identifier=?1 AND workspace_name=?2",
            params![identifier, workspace],
            |row| row.get::<_, i64>(0),
        )
        .optional()?)
}

fn identifier_in_use(conn: &Connection, identifier: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM nodes WHERE identifier=?1",
            params![identifier],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Sort order after the current maximum among the children of `parent`.
pub(super) fn next_sort_order(
    conn: &Connection,
    workspace: &str,
    parent: &str,
) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM nodes WHERE parent=?1 AND workspace_name=?2",
        params![parent, workspace],
        |row| row.get::<_, i64>(0),
    )?)
}

/// Local name and namespace URI of the last path segment.
pub(super) fn split_name(
    path: &NodePath,
    namespaces: &NamespaceMap,
) -> Result<(String, String), StoreError> {
    let (prefix, local) = split_qualified_name(path.name());
    let uri = namespaces.get(prefix).ok_or_else(|| {
        StoreError::FormatViolation(format!(
            "namespace prefix {prefix:?} of {path} is not registered"
        ))
    })?;
    Ok((local.to_string(), uri.clone()))
}

pub(super) fn insert_node_tx(
    conn: &Connection,
    namespaces: &NamespaceMap,
    row: NewNodeRow<'_>,
) -> Result<i64, StoreError> {
    let NewNodeRow {
        workspace,
        path,
        node_type,
        identifier,
        props,
    } = row;

    if node_id(conn, workspace, path.as_str())?.is_some() {
        return Err(StoreError::AlreadyExists(format!(
            "node {path} in workspace {workspace}"
        )));
    }
    if let Some(parent) = path.parent() {
        if node_id(conn, workspace, parent.as_str())?.is_none() {
            return Err(StoreError::NotFound(format!(
                "parent {parent} of {path} in workspace {workspace}"
            )));
        }
    }
    if identifier_in_use(conn, identifier)? {
        return Err(StoreError::AlreadyExists(format!(
            "identifier {identifier} is already in use"
        )));
    }

    let (local_name, namespace) = if path.is_root() {
        (String::new(), String::new())
    } else {
        split_name(path, namespaces)?
    };
    let sort_order = if path.is_root() {
        None
    } else {
        Some(next_sort_order(conn, workspace, path.parent_str())?)
    };

    conn.execute(
        "INSERT INTO nodes(path, parent, local_name, namespace, workspace_name, identifier, \
         type, props, depth, sort_order) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            path.as_str(),
            path.parent_str(),
            local_name,
            namespace,
            workspace,
            identifier,
            node_type,
            props,
            to_sqlite_i64(path.depth())?,
            sort_order,
        ],
    )
    .map_err(|err| super::map_insert_conflict(err, path.as_str()))?;
    Ok(conn.last_insert_rowid())
}

/// Rewrites type and document. Path, depth and sort order stay untouched.
pub(super) fn update_node_tx(
    conn: &Connection,
    id: i64,
    node_type: &str,
    props: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE nodes SET type=?1, props=?2 WHERE id=?3",
        params![node_type, props, id],
    )?;
    Ok(())
}
