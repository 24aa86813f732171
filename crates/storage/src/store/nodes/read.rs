#![forbid(unsafe_code)]

use super::*;
use cr_core::node_types::{JCR_MIXIN_TYPES, JCR_UUID, MIX_REFERENCEABLE};
use cr_core::paths::split_property_path;
use cr_core::{PropertyType, Value};
use hierarchy::NodeRow;
use std::collections::BTreeMap;

fn snapshot(
    conn: &Connection,
    workspace: &str,
    catalogue: &NodeTypeCatalogue,
    row: NodeRow,
) -> Result<NodeSnapshot, StoreError> {
    let path = parse_path(&row.path)?;
    let mut properties = decode_properties(&row.props, None)?;
    let mixins: Vec<String> = properties
        .iter()
        .find(|property| property.name() == JCR_MIXIN_TYPES)
        .map(|property| property.strings().into_iter().map(str::to_string).collect())
        .unwrap_or_default();

    let referenceable = catalogue
        .effective_types(&row.node_type, &mixins)
        .map(|types| types.iter().any(|definition| definition.name == MIX_REFERENCEABLE))
        .unwrap_or(false);
    if referenceable && !properties.iter().any(|property| property.name() == JCR_UUID) {
        let uuid = Property::single(JCR_UUID, Value::String(row.identifier.clone()))
            .map_err(|err| StoreError::FormatViolation(err.message().to_string()))?;
        properties.push(uuid);
    }

    let children = hierarchy::child_names(conn, workspace, path.as_str())?;
    Ok(NodeSnapshot {
        identifier: row.identifier,
        depth: path.depth(),
        path,
        primary_type: row.node_type,
        sort_order: row.sort_order,
        properties,
        children,
    })
}

impl SqliteStore {
    /// Identifier of the node at `path`, if any.
    pub fn node_exists(&mut self, path: &str) -> Result<Option<String>, StoreError> {
        let path = parse_path(path)?;
        let (conn, session) = self.read_parts()?;
        Ok(hierarchy::load_row(conn, session.workspace(), path.as_str())?.map(|row| row.identifier))
    }

    pub fn get_node(&mut self, path: &str) -> Result<NodeSnapshot, StoreError> {
        let path = parse_path(path)?;
        let (conn, session) = self.read_parts()?;
        let row = hierarchy::require_row(conn, session.workspace(), path.as_str())?;
        session.remember_identifier(&row.identifier, &row.path);
        let workspace = session.workspace().to_string();
        snapshot(conn, &workspace, session.catalogue(conn)?, row)
    }

    /// Snapshots by path. Absent paths are left out of the result.
    pub fn get_nodes(
        &mut self,
        paths: &[&str],
    ) -> Result<BTreeMap<String, NodeSnapshot>, StoreError> {
        let paths = paths
            .iter()
            .map(|path| parse_path(path))
            .collect::<Result<Vec<_>, _>>()?;
        let (conn, session) = self.read_parts()?;
        let workspace = session.workspace().to_string();
        let catalogue = session.catalogue(conn)?.clone();

        let mut out = BTreeMap::new();
        for path in paths {
            let Some(row) = hierarchy::load_row(conn, &workspace, path.as_str())? else {
                continue;
            };
            session.remember_identifier(&row.identifier, &row.path);
            let node = snapshot(conn, &workspace, &catalogue, row)?;
            out.insert(path.into_string(), node);
        }
        Ok(out)
    }

    /// Path of the node with `identifier`. The session's identifier map is
    /// only a hint and is confirmed against the backend.
    pub fn node_path_for_identifier(&mut self, identifier: &str) -> Result<String, StoreError> {
        let (conn, session) = self.read_parts()?;
        let workspace = session.workspace().to_string();
        if let Some(hint) = session.identifier_hint(identifier) {
            let confirmed = hierarchy::load_row(conn, &workspace, hint)?
                .filter(|row| row.identifier == identifier);
            if let Some(row) = confirmed {
                return Ok(row.path);
            }
            session.forget_identifier(identifier);
        }

        let path = hierarchy::path_for_identifier(conn, &workspace, identifier)?.ok_or_else(|| {
            StoreError::NotFound(format!(
                "node with identifier {identifier} in workspace {workspace}"
            ))
        })?;
        session.remember_identifier(identifier, &path);
        Ok(path)
    }

    pub fn get_node_by_identifier(&mut self, identifier: &str) -> Result<NodeSnapshot, StoreError> {
        let path = self.node_path_for_identifier(identifier)?;
        self.get_node(&path)
    }

    /// One decoded property, addressed as `<node path>/<property name>`.
    pub fn get_property(&mut self, path: &str) -> Result<Property, StoreError> {
        let (node_path, name) =
            split_property_path(path).map_err(|err| StoreError::invalid_path(path, err))?;
        let (conn, session) = self.read_parts()?;
        let row = hierarchy::require_row(conn, session.workspace(), node_path.as_str())?;
        decode_properties(&row.props, Some(&[name.as_str()][..]))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("property {path}")))
    }

    /// Binary payload of a property: one payload for a single-valued
    /// property, the ordered list for a multi-valued one.
    pub fn get_binary_stream(&mut self, path: &str) -> Result<BinaryContent, StoreError> {
        let (node_path, name) =
            split_property_path(path).map_err(|err| StoreError::invalid_path(path, err))?;
        let (conn, session) = self.read_parts()?;
        let workspace = session.workspace();
        let row = hierarchy::require_row(conn, workspace, node_path.as_str())?;
        let property = decode_properties(&row.props, Some(&[name.as_str()][..]))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("property {path}")))?;
        if property.kind() != PropertyType::Binary {
            return Err(StoreError::FormatViolation(format!(
                "property {path} is of type {}, not Binary",
                property.kind()
            )));
        }

        let mut payloads = binary::load_binary(conn, workspace, row.id, &name)?;
        if property.is_multiple() {
            return Ok(BinaryContent::Multiple(payloads));
        }
        if payloads.is_empty() {
            return Err(StoreError::NotFound(format!("binary data of {path}")));
        }
        Ok(BinaryContent::Single(payloads.swap_remove(0)))
    }

    /// Property paths holding a strong reference to the node at `path`.
    pub fn get_references(
        &mut self,
        path: &str,
        name: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        self.reverse_references(path, name, PropertyType::Reference)
    }

    pub fn get_weak_references(
        &mut self,
        path: &str,
        name: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        self.reverse_references(path, name, PropertyType::WeakReference)
    }

    fn reverse_references(
        &mut self,
        path: &str,
        name: Option<&str>,
        kind: PropertyType,
    ) -> Result<Vec<String>, StoreError> {
        let path = parse_path(path)?;
        let (conn, session) = self.read_parts()?;
        references::referencing_properties(conn, session.workspace(), path.as_str(), name, kind)
    }
}
