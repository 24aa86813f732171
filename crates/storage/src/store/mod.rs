#![forbid(unsafe_code)]

mod binary;
mod codec;
mod config;
mod error;
mod hierarchy;
mod namespaces;
mod node_types;
mod nodes;
mod query;
mod references;
mod requests;
mod schema;
mod session;
mod transaction;

pub use codec::{EMPTY_DOCUMENT, EncodedDocument, decode_properties, encode_properties};
pub use config::{IN_MEMORY_DATABASE, RepositoryConfig};
pub use error::{BackendError, StoreError};
pub use query::SelectorSqlCompiler;
pub use requests::*;
pub use transaction::TransactionState;

use cr_core::node_types::NT_UNSTRUCTURED;
use cr_core::{
    NamespaceMap, NodePath, NodeTypeCatalogue, QueryCompiler, WorkspaceName, WorkspaceNameError,
};
use hierarchy::NewNodeRow;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use session::Session;
use transaction::WriteScope;

pub struct SqliteStore {
    conn: Connection,
    config: RepositoryConfig,
    session: Option<Session>,
    pending_login: Option<(Credentials, String)>,
    transaction: TransactionState,
    compiler: Box<dyn QueryCompiler>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(config: RepositoryConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(dir) = config.database_path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            Connection::open(&config.database_path)?
        };
        conn.busy_timeout(config.busy_timeout())?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if config.provision_schema {
            schema::install_schema(&conn)?;
        }

        tracing::info!(database = %config.database_path.display(), "repository opened");
        Ok(Self {
            conn,
            config,
            session: None,
            pending_login: None,
            transaction: TransactionState::Idle,
            compiler: Box::new(SelectorSqlCompiler),
        })
    }

    /// Replaces the query compiler used by [`SqliteStore::execute_query`].
    pub fn with_query_compiler(mut self, compiler: Box<dyn QueryCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// The session's workspace, including a deferred login's.
    pub fn workspace_name(&self) -> Option<&str> {
        match (&self.session, &self.pending_login) {
            (Some(session), _) => Some(session.workspace()),
            (None, Some((_, workspace))) => Some(workspace),
            (None, None) => None,
        }
    }

    /// Opens a session on `workspace` (the configured default when `None`).
    ///
    /// The default workspace is created on first login. With
    /// `check_login_on_server` disabled nothing touches the backend until
    /// the first operation that needs the session.
    pub fn login(
        &mut self,
        credentials: Credentials,
        workspace: Option<&str>,
    ) -> Result<(), StoreError> {
        let workspace = workspace
            .unwrap_or(self.config.default_workspace.as_str())
            .to_string();
        canonicalize_workspace(&workspace)?;
        if credentials.user_id.trim().is_empty() {
            return Err(StoreError::Authentication(
                "user id must not be empty".to_string(),
            ));
        }
        if self.transaction == TransactionState::Active {
            return Err(StoreError::TransactionState(
                "cannot log in while a transaction is open",
            ));
        }

        self.session = None;
        if !self.config.check_login_on_server {
            tracing::debug!(workspace = %workspace, "login deferred");
            self.pending_login = Some((credentials, workspace));
            return Ok(());
        }
        self.pending_login = None;
        self.login_now(credentials, workspace)
    }

    fn login_now(&mut self, credentials: Credentials, workspace: String) -> Result<(), StoreError> {
        schema::verify_schema(&self.conn).map_err(classify_login_error)?;
        let exists = workspace_exists(&self.conn, &workspace).map_err(classify_login_error)?;
        if !exists {
            if workspace != self.config.default_workspace {
                return Err(StoreError::NotFound(format!("workspace {workspace}")));
            }
            self.create_workspace_unchecked(&workspace)?;
        }

        tracing::info!(workspace = %workspace, user = %credentials.user_id, "session opened");
        self.session = Some(Session::new(workspace, credentials.user_id));
        Ok(())
    }

    /// Ends the session. An open explicit transaction is rolled back.
    pub fn logout(&mut self) -> Result<(), StoreError> {
        if self.transaction == TransactionState::Active {
            self.conn.execute_batch("ROLLBACK")?;
            self.transaction = TransactionState::Idle;
        }
        self.pending_login = None;
        if let Some(session) = self.session.take() {
            tracing::info!(workspace = %session.workspace(), "session closed");
        }
        Ok(())
    }

    pub fn create_workspace(
        &mut self,
        name: &str,
        src_workspace: Option<&str>,
    ) -> Result<(), StoreError> {
        canonicalize_workspace(name)?;
        if src_workspace.is_some() {
            return Err(StoreError::NotSupported(
                "creating a workspace as a clone of another".to_string(),
            ));
        }
        if workspace_exists(&self.conn, name)? {
            return Err(StoreError::AlreadyExists(format!("workspace {name}")));
        }
        self.create_workspace_unchecked(name)
    }

    fn create_workspace_unchecked(&mut self, name: &str) -> Result<(), StoreError> {
        let scope = WriteScope::open(&mut self.conn, self.transaction)?;
        scope
            .execute("INSERT INTO workspaces(name) VALUES (?1)", params![name])
            .map_err(|err| map_insert_conflict(err, name))?;
        let root = NodePath::root();
        hierarchy::insert_node_tx(
            &scope,
            &NamespaceMap::new(),
            NewNodeRow {
                workspace: name,
                path: &root,
                node_type: NT_UNSTRUCTURED,
                identifier: &new_identifier(),
                props: EMPTY_DOCUMENT,
            },
        )?;
        scope.commit()?;
        tracing::info!(workspace = name, "workspace created");
        Ok(())
    }

    pub fn list_workspaces(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM workspaces ORDER BY name ASC")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        Ok(out)
    }

    pub fn workspace_exists(&self, name: &str) -> Result<bool, StoreError> {
        workspace_exists(&self.conn, name)
    }

    pub fn repository_descriptors(&self) -> RepositoryDescriptors {
        let text = [
            ("jcr.repository.name", env!("CARGO_PKG_NAME")),
            ("jcr.repository.version", env!("CARGO_PKG_VERSION")),
            ("jcr.specification.version", "2.0"),
            ("identifier.stability", "identifier.stability.indefinite.duration"),
        ];
        let flags = [
            ("option.transactions.supported", true),
            ("option.workspace.management.supported", true),
            ("option.node.type.management.supported", true),
            ("option.update.mixin.node.types.supported", true),
            ("option.update.primary.node.type.supported", true),
            ("option.node.and.property.with.same.name.supported", true),
            ("node.type.management.autocreated.definitions.supported", true),
            ("node.type.management.multiple.binary.properties.supported", true),
            ("node.type.management.multivalued.properties.supported", true),
            ("node.type.management.orderable.child.nodes.supported", true),
            ("node.type.management.same.name.siblings.supported", false),
            ("query.joins", false),
            ("option.versioning.supported", false),
            ("option.simple.versioning.supported", false),
            ("option.locking.supported", false),
            ("option.observation.supported", false),
            ("option.journaled.observation.supported", false),
            ("option.access.control.supported", false),
            ("option.retention.supported", false),
        ];

        let mut out = RepositoryDescriptors::new();
        for (key, value) in text {
            out.insert(key.to_string(), DescriptorValue::Text(value.to_string()));
        }
        for (key, value) in flags {
            out.insert(key.to_string(), DescriptorValue::Flag(value));
        }
        out
    }

    fn ensure_session(&mut self) -> Result<(), StoreError> {
        if self.session.is_some() {
            return Ok(());
        }
        let Some((credentials, workspace)) = self.pending_login.take() else {
            return Err(StoreError::NotLoggedIn);
        };
        self.login_now(credentials, workspace)
    }

    /// Connection and session for a read.
    fn read_parts(&mut self) -> Result<(&Connection, &mut Session), StoreError> {
        self.ensure_session()?;
        let Self { conn, session, .. } = self;
        let session = session.as_mut().ok_or(StoreError::NotLoggedIn)?;
        Ok((conn, session))
    }

    /// Write scope for one mutating operation, plus the session.
    fn write_scope(&mut self) -> Result<(WriteScope<'_>, &mut Session), StoreError> {
        self.ensure_session()?;
        let Self {
            conn,
            session,
            transaction,
            ..
        } = self;
        let session = session.as_mut().ok_or(StoreError::NotLoggedIn)?;
        let scope = WriteScope::open(conn, *transaction)?;
        Ok((scope, session))
    }
}

fn workspace_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM workspaces WHERE name=?1",
            params![name],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn classify_login_error(err: StoreError) -> StoreError {
    match err {
        StoreError::Backend(BackendError::Sql(rusqlite::Error::SqliteFailure(code, message)))
            if matches!(
                code.code,
                ErrorCode::AuthorizationForStatementDenied | ErrorCode::PermissionDenied
            ) =>
        {
            StoreError::Authentication(message.unwrap_or_else(|| code.to_string()))
        }
        other => other,
    }
}

fn map_insert_conflict(err: rusqlite::Error, what: &str) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::AlreadyExists(what.to_string());
    }
    StoreError::from(err)
}

/// Uniqueness conflicts only. Foreign key, NOT NULL and CHECK failures stay
/// backend errors.
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => matches!(
            code.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::ConstraintViolation("numeric overflow".to_string()))
}

fn canonicalize_workspace(value: &str) -> Result<WorkspaceName, StoreError> {
    WorkspaceName::try_new(value).map_err(|err: WorkspaceNameError| {
        StoreError::FormatViolation(format!("workspace name {value:?}: {}", err.message()))
    })
}

fn parse_path(value: &str) -> Result<NodePath, StoreError> {
    NodePath::try_new(value).map_err(|err| StoreError::invalid_path(value, err))
}

fn new_identifier() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict_table() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE owners(name TEXT PRIMARY KEY);
             CREATE TABLE items(
               name TEXT NOT NULL UNIQUE,
               owner TEXT REFERENCES owners(name),
               size INTEGER CHECK (size >= 0)
             );
             INSERT INTO owners(name) VALUES ('root');
             INSERT INTO items(name, owner, size) VALUES ('a', 'root', 1);",
        )
        .expect("schema");
        conn
    }

    fn insert_error(conn: &Connection, sql: &str) -> StoreError {
        let err = conn.execute(sql, []).expect_err("insert must fail");
        map_insert_conflict(err, "item")
    }

    #[test]
    fn only_uniqueness_failures_are_conflicts() {
        let conn = conflict_table();
        let duplicate = insert_error(&conn, "INSERT INTO items(name) VALUES ('a')");
        assert_eq!(duplicate.code(), "ALREADY_EXISTS");
        let key = insert_error(&conn, "INSERT INTO owners(name) VALUES ('root')");
        assert_eq!(key.code(), "ALREADY_EXISTS");

        for sql in [
            "INSERT INTO items(name) VALUES (NULL)",
            "INSERT INTO items(name, owner) VALUES ('b', 'nobody')",
            "INSERT INTO items(name, size) VALUES ('c', -1)",
        ] {
            assert_eq!(insert_error(&conn, sql).code(), "BACKEND", "{sql}");
        }
    }
}
