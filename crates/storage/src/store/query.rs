#![forbid(unsafe_code)]

use super::*;
use cr_core::node_types::{JCR_CREATED, JCR_CREATED_BY, JCR_PRIMARY_TYPE};
use cr_core::{Column, CompileContext, Property, Query, QueryCompileError, QueryForm, Value};
use std::borrow::Cow;

mod compiler;

pub use compiler::SelectorSqlCompiler;

fn compile_error(err: QueryCompileError) -> StoreError {
    let message = format!("{}: {}", err.message(), err.detail());
    match err {
        QueryCompileError::Unsupported(_) => StoreError::NotSupported(message),
        QueryCompileError::Invalid(_) => StoreError::InvalidQuery(message),
    }
}

impl SqliteStore {
    /// Runs a structured query (or query text the compiler can parse) against
    /// the session's workspace.
    pub fn execute_query(&mut self, query: &Query) -> Result<Vec<QueryResultRow>, StoreError> {
        self.ensure_session()?;
        let Self {
            conn,
            session,
            compiler,
            ..
        } = self;
        let session = session.as_mut().ok_or(StoreError::NotLoggedIn)?;
        let namespaces = session.namespaces(conn)?.clone();
        let catalogue = session.catalogue(conn)?.clone();
        let context = CompileContext {
            namespaces: &namespaces,
            catalogue: &catalogue,
        };

        let model = match &query.form {
            QueryForm::Structured(model) => Cow::Borrowed(model),
            QueryForm::Statement {
                language,
                statement,
            } => Cow::Owned(
                compiler
                    .parse(language, statement, &context)
                    .map_err(compile_error)?,
            ),
        };
        let Some(selector) = model.source.as_selector() else {
            return Err(StoreError::NotSupported("queries over joins".to_string()));
        };
        if !catalogue.contains(&selector.node_type) {
            return Err(StoreError::InvalidQuery(format!(
                "unknown node type {}",
                selector.node_type
            )));
        }

        let mut sql = compiler.compile(&model, &context).map_err(compile_error)?;
        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        let mut columns = if model.columns.is_empty() {
            vec![
                Column::new(Some(selector.name.as_str()), JCR_CREATED_BY),
                Column::new(Some(selector.name.as_str()), JCR_CREATED),
            ]
        } else {
            model.columns.clone()
        };
        if !columns.iter().any(|column| column.property == JCR_PRIMARY_TYPE) {
            columns.push(Column::new(Some(selector.name.as_str()), JCR_PRIMARY_TYPE));
        }
        let names: Vec<&str> = columns.iter().map(|column| column.property.as_str()).collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|err| StoreError::InvalidQuery(format!("{err}")))?;
        let mut rows = stmt.query(params![session.workspace()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let path = row.get::<_, String>(0)?;
            let node_type = row.get::<_, String>(1)?;
            let props = row.get::<_, String>(2)?;
            let properties = decode_properties(&props, Some(&names[..]))?;

            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                let found = properties
                    .iter()
                    .find(|property| property.name() == column.property);
                let value = match found {
                    Some(property) => QueryColumnValue::Property(property.clone()),
                    None if column.property == JCR_PRIMARY_TYPE => {
                        let property =
                            Property::single(JCR_PRIMARY_TYPE, Value::Name(node_type.clone()))
                                .map_err(|err| {
                                    StoreError::FormatViolation(err.message().to_string())
                                })?;
                        QueryColumnValue::Property(property)
                    }
                    None => QueryColumnValue::Missing,
                };
                values.push((column.label(), value));
            }
            out.push(QueryResultRow {
                path,
                score: 0.0,
                columns: values,
            });
        }
        tracing::debug!(
            workspace = session.workspace(),
            selector = %selector.name,
            rows = out.len(),
            "query executed"
        );
        Ok(out)
    }
}
