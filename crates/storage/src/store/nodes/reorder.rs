#![forbid(unsafe_code)]

use super::*;

/// Applies `moves` in order to `names`. A move without `before` sends the
/// child to the end; otherwise it is placed right before `before`.
fn apply_moves(
    names: &mut Vec<String>,
    moves: &[ReorderMove],
    parent: &str,
) -> Result<(), StoreError> {
    let position = |names: &[String], name: &str| {
        names
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| StoreError::NotFound(format!("child {name} of {parent}")))
    };

    for step in moves {
        let from = position(names, &step.name)?;
        match step.before.as_deref() {
            Some(before) if before == step.name => {
                position(names, before)?;
            }
            Some(before) => {
                position(names, before)?;
                let moved = names.remove(from);
                let to = position(names, before)?;
                names.insert(to, moved);
            }
            None => {
                let moved = names.remove(from);
                names.push(moved);
            }
        }
    }
    Ok(())
}

impl SqliteStore {
    /// Reorders the children of `parent` and writes the result back as dense
    /// sort orders `1..=n`.
    pub fn reorder_children(
        &mut self,
        parent: &str,
        moves: &[ReorderMove],
    ) -> Result<(), StoreError> {
        let parent = parse_path(parent)?;
        let (scope, session) = self.write_scope()?;
        let workspace = session.workspace();
        hierarchy::require_node_id(&scope, workspace, parent.as_str())?;

        let children = {
            let mut stmt = scope.prepare(
                "SELECT id, path FROM nodes WHERE parent=?1 AND workspace_name=?2 \
                 ORDER BY sort_order ASC, id ASC",
            )?;
            let mut rows = stmt.query(params![parent.as_str(), workspace])?;
            let mut children = Vec::new();
            while let Some(row) = rows.next()? {
                let id = row.get::<_, i64>(0)?;
                let path = parse_path(&row.get::<_, String>(1)?)?;
                children.push((path.name().to_string(), id));
            }
            children
        };

        let mut names: Vec<String> = children.iter().map(|(name, _)| name.clone()).collect();
        apply_moves(&mut names, moves, parent.as_str())?;

        let mut updates = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let id = children
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|(_, id)| *id)
                .ok_or_else(|| StoreError::NotFound(format!("child {name} of {parent}")))?;
            updates.push(RowUpdate {
                id,
                values: vec![SqlValue::Integer(to_sqlite_i64(index + 1)?)],
            });
        }
        batched_update(&scope, &["sort_order"], &updates)?;
        tracing::debug!(workspace, parent = %parent, moves = moves.len(), "children reordered");

        scope.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn moves_apply_in_sequence() {
        let mut order = names(&["a", "b", "c", "d"]);
        apply_moves(
            &mut order,
            &[ReorderMove::before("d", "b"), ReorderMove::to_end("a")],
            "/p",
        )
        .expect("apply moves");
        assert_eq!(order, names(&["d", "b", "c", "a"]));
    }

    #[test]
    fn moving_before_itself_keeps_order() {
        let mut order = names(&["a", "b"]);
        apply_moves(&mut order, &[ReorderMove::before("b", "b")], "/p").expect("apply moves");
        assert_eq!(order, names(&["a", "b"]));
    }

    #[test]
    fn unknown_child_is_not_found() {
        let mut order = names(&["a", "b"]);
        let err = apply_moves(&mut order, &[ReorderMove::before("a", "zz")], "/p")
            .expect_err("unknown anchor");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(order, names(&["a", "b"]));
    }
}
