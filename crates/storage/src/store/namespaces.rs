#![forbid(unsafe_code)]

use super::*;
use cr_core::namespaces::{builtin_namespaces, is_builtin_prefix, is_builtin_uri};

/// Built-in mappings overlaid with the registered ones.
pub(super) fn load_namespaces(conn: &Connection) -> Result<NamespaceMap, StoreError> {
    let mut out = builtin_namespaces();
    let mut stmt = conn.prepare("SELECT prefix, uri FROM namespaces")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let prefix = row.get::<_, String>(0)?;
        if is_builtin_prefix(&prefix) {
            continue;
        }
        out.insert(prefix, row.get::<_, String>(1)?);
    }
    Ok(out)
}

fn validate_prefix(prefix: &str) -> Result<(), StoreError> {
    if prefix.is_empty()
        || prefix.starts_with(|ch: char| ch.is_ascii_digit())
        || prefix.to_ascii_lowercase().starts_with("xml")
        || !prefix
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
    {
        return Err(StoreError::FormatViolation(format!(
            "invalid namespace prefix {prefix:?}"
        )));
    }
    Ok(())
}

impl SqliteStore {
    pub fn namespaces(&mut self) -> Result<NamespaceMap, StoreError> {
        let (conn, session) = self.read_parts()?;
        Ok(session.namespaces(conn)?.clone())
    }

    /// Maps `prefix` to `uri`, replacing any mapping that used either.
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) -> Result<(), StoreError> {
        if is_builtin_prefix(prefix) || is_builtin_uri(uri) {
            return Err(StoreError::ConstraintViolation(format!(
                "built-in namespace mapping {prefix:?} cannot be changed"
            )));
        }
        validate_prefix(prefix)?;
        if uri.trim().is_empty() {
            return Err(StoreError::FormatViolation(
                "namespace uri must not be empty".to_string(),
            ));
        }

        let (scope, session) = self.write_scope()?;
        scope.execute(
            "DELETE FROM namespaces WHERE prefix=?1 OR uri=?2",
            params![prefix, uri],
        )?;
        scope.execute(
            "INSERT INTO namespaces(prefix, uri) VALUES (?1, ?2)",
            params![prefix, uri],
        )?;
        scope.commit()?;
        session.invalidate_namespaces();
        tracing::debug!(prefix, uri, "namespace registered");
        Ok(())
    }

    pub fn unregister_namespace(&mut self, prefix: &str) -> Result<(), StoreError> {
        if is_builtin_prefix(prefix) {
            return Err(StoreError::ConstraintViolation(format!(
                "built-in namespace prefix {prefix:?} cannot be unregistered"
            )));
        }

        let (scope, session) = self.write_scope()?;
        let removed = scope.execute("DELETE FROM namespaces WHERE prefix=?1", params![prefix])?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("namespace prefix {prefix:?}")));
        }
        scope.commit()?;
        session.invalidate_namespaces();
        tracing::debug!(prefix, "namespace unregistered");
        Ok(())
    }
}
