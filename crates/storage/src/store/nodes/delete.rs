#![forbid(unsafe_code)]

use super::*;
use cr_core::PropertyType;
use cr_core::paths::split_property_path;

impl SqliteStore {
    /// Deletes the node and its whole subtree with their binary data. Fails
    /// while any strong reference points into the subtree.
    pub fn delete_node(&mut self, path: &str) -> Result<(), StoreError> {
        let path = parse_path(path)?;
        if path.is_root() {
            return Err(StoreError::ConstraintViolation(
                "the root node cannot be deleted".to_string(),
            ));
        }

        let (scope, session) = self.write_scope()?;
        let workspace = session.workspace();
        hierarchy::require_node_id(&scope, workspace, path.as_str())?;

        let referrers = references::strong_references_into_subtree(&scope, workspace, &path)?;
        if !referrers.is_empty() {
            return Err(StoreError::IntegrityViolation(format!(
                "{path} is still referenced by {}",
                referrers.join(", ")
            )));
        }

        let rows = hierarchy::load_subtree(&scope, workspace, &path)?;
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        binary::delete_node_binaries_tx(&scope, &ids)?;

        let prefix = path.descendant_prefix();
        let deleted = scope.execute(
            "DELETE FROM nodes WHERE workspace_name=?1 AND (path=?2 OR substr(path, 1, ?3)=?4)",
            params![
                workspace,
                path.as_str(),
                to_sqlite_i64(prefix.chars().count())?,
                prefix
            ],
        )?;
        tracing::debug!(workspace, path = %path, rows = deleted, "subtree deleted");

        scope.commit()?;
        for row in &rows {
            session.forget_identifier(&row.identifier);
        }
        Ok(())
    }

    /// Removes one property from its node, together with its reference edges
    /// or binary data.
    pub fn delete_property(&mut self, path: &str) -> Result<(), StoreError> {
        let (node_path, name) =
            split_property_path(path).map_err(|err| StoreError::invalid_path(path, err))?;

        let (scope, session) = self.write_scope()?;
        let workspace = session.workspace();
        let row = hierarchy::require_row(&scope, workspace, node_path.as_str())?;
        let mut properties = decode_properties(&row.props, None)?;
        let index = properties
            .iter()
            .position(|property| property.name() == name)
            .ok_or_else(|| StoreError::NotFound(format!("property {path}")))?;
        let removed = properties.remove(index);

        match removed.kind() {
            PropertyType::Reference | PropertyType::WeakReference => {
                references::delete_property_references_tx(&scope, row.id, &name)?;
            }
            PropertyType::Binary => {
                binary::delete_binary_tx(&scope, workspace, row.id, &name)?;
            }
            _ => {}
        }

        let encoded = encode_properties(&properties, false)?;
        hierarchy::update_node_tx(&scope, row.id, &row.node_type, &encoded.document)?;
        tracing::debug!(workspace, path, "property deleted");

        scope.commit()?;
        Ok(())
    }
}
