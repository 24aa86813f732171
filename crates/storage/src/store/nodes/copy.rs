#![forbid(unsafe_code)]

use super::*;
use cr_core::Value;
use cr_core::node_types::JCR_UUID;

impl SqliteStore {
    /// Copies the subtree at `src_path` to `dst_path` and returns the new
    /// root's identifier.
    ///
    /// Every copied node gets a fresh identifier. Reference values keep
    /// pointing at their original targets.
    pub fn copy_node(&mut self, request: &CopyNodeRequest) -> Result<String, StoreError> {
        let src = parse_path(&request.src_path)?;
        let dst = parse_path(&request.dst_path)?;

        let (scope, session) = self.write_scope()?;
        if let Some(src_workspace) = request.src_workspace.as_deref() {
            if src_workspace != session.workspace() {
                if !workspace_exists(&scope, src_workspace)? {
                    return Err(StoreError::NotFound(format!("workspace {src_workspace}")));
                }
                return Err(StoreError::NotSupported(format!(
                    "copying from workspace {src_workspace} into {}",
                    session.workspace()
                )));
            }
        }

        let namespaces = session.namespaces(&scope)?.clone();
        let workspace = session.workspace().to_string();
        let workspace = workspace.as_str();
        check_relocation(&scope, workspace, &src, &dst)?;

        let rows = hierarchy::load_subtree(&scope, workspace, &src)?;
        let mut pending = Vec::with_capacity(rows.len());
        let mut copied = Vec::with_capacity(rows.len());
        for row in &rows {
            let old = parse_path(&row.path)?;
            let new = old.rebase(&src, &dst).ok_or_else(|| {
                StoreError::IntegrityViolation(format!("{old} is not inside {src}"))
            })?;
            let identifier = new_identifier();

            let mut properties = decode_properties(&row.props, None)?;
            for property in &mut properties {
                if property.name() == JCR_UUID {
                    *property = Property::single(JCR_UUID, Value::String(identifier.clone()))
                        .map_err(|err| StoreError::FormatViolation(err.message().to_string()))?;
                }
            }
            let encoded = encode_properties(&properties, false)?;

            let node_id = hierarchy::insert_node_tx(
                &scope,
                &namespaces,
                NewNodeRow {
                    workspace,
                    path: &new,
                    node_type: &row.node_type,
                    identifier: &identifier,
                    props: &encoded.document,
                },
            )?;
            binary::copy_binaries_tx(&scope, row.id, node_id, workspace)?;

            pending.push((node_id, new.as_str().to_string(), properties));
            copied.push((identifier, new.into_string()));
        }

        for (node_id, path, properties) in &pending {
            let properties: Vec<&Property> = properties.iter().collect();
            references::rebuild_references_tx(&scope, workspace, *node_id, path, &properties)?;
        }
        tracing::debug!(workspace, from = %src, to = %dst, rows = copied.len(), "subtree copied");

        scope.commit()?;
        for (identifier, path) in &copied {
            session.remember_identifier(identifier, path);
        }
        copied
            .into_iter()
            .next()
            .map(|(identifier, _)| identifier)
            .ok_or_else(|| StoreError::NotFound(format!("node {src} in workspace {workspace}")))
    }
}
