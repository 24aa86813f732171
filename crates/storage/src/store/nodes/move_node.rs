#![forbid(unsafe_code)]

use super::*;

impl SqliteStore {
    /// Relocates the subtree at `src` to `dst`. The moved node lands after
    /// its new siblings; descendants keep their relative order.
    pub fn move_node(&mut self, src: &str, dst: &str) -> Result<(), StoreError> {
        let src = parse_path(src)?;
        let dst = parse_path(dst)?;

        let (scope, session) = self.write_scope()?;
        let workspace = session.workspace();
        check_relocation(&scope, workspace, &src, &dst)?;
        let namespaces = session.namespaces(&scope)?.clone();
        let workspace = session.workspace();

        let (local_name, namespace) = hierarchy::split_name(&dst, &namespaces)?;
        let sort_order = hierarchy::next_sort_order(&scope, workspace, dst.parent_str())?;

        let rows = hierarchy::load_subtree(&scope, workspace, &src)?;
        let mut updates = Vec::with_capacity(rows.len());
        let mut relocated = Vec::with_capacity(rows.len());
        for row in &rows {
            let old = parse_path(&row.path)?;
            let new = old.rebase(&src, &dst).ok_or_else(|| {
                StoreError::IntegrityViolation(format!("{old} is not inside {src}"))
            })?;
            updates.push(RowUpdate {
                id: row.id,
                values: vec![
                    SqlValue::Text(new.as_str().to_string()),
                    SqlValue::Text(new.parent_str().to_string()),
                    SqlValue::Integer(to_sqlite_i64(new.depth())?),
                ],
            });
            relocated.push((row.identifier.clone(), new.into_string()));
        }
        let touched = batched_update(&scope, &["path", "parent", "depth"], &updates)?;

        scope.execute(
            "UPDATE nodes SET local_name=?1, namespace=?2, sort_order=?3 \
             WHERE path=?4 AND workspace_name=?5",
            params![local_name, namespace, sort_order, dst.as_str(), workspace],
        )?;
        tracing::debug!(workspace, from = %src, to = %dst, rows = touched, "subtree moved");

        scope.commit()?;
        for (identifier, path) in &relocated {
            session.remember_identifier(identifier, path);
        }
        Ok(())
    }
}
