#![forbid(unsafe_code)]

//! Out-of-line binary chunks, one row per property value.

use super::error::StoreError;
use super::to_sqlite_i64;
use rusqlite::{Connection, params};
use std::collections::BTreeSet;

/// Deletes every chunk of the property, then inserts `payloads` in order.
pub(super) fn replace_binary_tx(
    conn: &Connection,
    workspace: &str,
    node_id: i64,
    property_name: &str,
    payloads: &[Vec<u8>],
) -> Result<(), StoreError> {
    delete_binary_tx(conn, workspace, node_id, property_name)?;
    let mut stmt = conn.prepare(
        "INSERT INTO binary_data(node_id, property_name, workspace_name, idx, data) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (index, payload) in payloads.iter().enumerate() {
        stmt.execute(params![
            node_id,
            property_name,
            workspace,
            to_sqlite_i64(index)?,
            payload
        ])?;
    }
    Ok(())
}

pub(super) fn delete_binary_tx(
    conn: &Connection,
    workspace: &str,
    node_id: i64,
    property_name: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM binary_data WHERE node_id=?1 AND property_name=?2 AND workspace_name=?3",
        params![node_id, property_name, workspace],
    )?;
    Ok(())
}

/// Drops chunks of every property of the node not listed in `keep`.
pub(super) fn retain_binaries_tx(
    conn: &Connection,
    workspace: &str,
    node_id: i64,
    keep: &BTreeSet<&str>,
) -> Result<(), StoreError> {
    let stale = {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT property_name FROM binary_data WHERE node_id=?1 AND workspace_name=?2",
        )?;
        let mut rows = stmt.query(params![node_id, workspace])?;
        let mut stale = Vec::new();
        while let Some(row) = rows.next()? {
            let name = row.get::<_, String>(0)?;
            if !keep.contains(name.as_str()) {
                stale.push(name);
            }
        }
        stale
    };
    for name in stale {
        delete_binary_tx(conn, workspace, node_id, &name)?;
    }
    Ok(())
}

pub(super) fn copy_binaries_tx(
    conn: &Connection,
    from_node_id: i64,
    to_node_id: i64,
    to_workspace: &str,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "INSERT INTO binary_data(node_id, property_name, workspace_name, idx, data) \
         SELECT ?2, property_name, ?3, idx, data FROM binary_data WHERE node_id=?1",
        params![from_node_id, to_node_id, to_workspace],
    )?)
}

/// Deletes every chunk owned by the given nodes.
pub(super) fn delete_node_binaries_tx(
    conn: &Connection,
    node_ids: &[i64],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("DELETE FROM binary_data WHERE node_id=?1")?;
    for node_id in node_ids {
        stmt.execute(params![node_id])?;
    }
    Ok(())
}

pub(super) fn load_binary(
    conn: &Connection,
    workspace: &str,
    node_id: i64,
    property_name: &str,
) -> Result<Vec<Vec<u8>>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT data FROM binary_data \
         WHERE node_id=?1 AND property_name=?2 AND workspace_name=?3 \
         ORDER BY idx ASC",
    )?;
    let mut rows = stmt.query(params![node_id, property_name, workspace])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get::<_, Vec<u8>>(0)?);
    }
    Ok(out)
}
