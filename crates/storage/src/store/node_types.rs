#![forbid(unsafe_code)]

use super::*;
use cr_core::node_types::is_standard_type;
use cr_core::{ChildNodeDefinition, NodeTypeDefinition, PropertyDefinition, PropertyType};

/// Built-in types plus every registered user type.
pub(super) fn load_catalogue(conn: &Connection) -> Result<NodeTypeCatalogue, StoreError> {
    let mut catalogue = NodeTypeCatalogue::standard();
    for definition in load_user_types(conn)? {
        catalogue.insert(definition);
    }
    Ok(catalogue)
}

fn load_user_types(conn: &Connection) -> Result<Vec<NodeTypeDefinition>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT node_type_id, name, supertypes, is_abstract, is_mixin, queryable, \
         orderable_child_nodes, primary_item \
         FROM node_types ORDER BY name ASC",
    )?;
    let mut rows = stmt.query([])?;
    let mut headers = Vec::new();
    while let Some(row) = rows.next()? {
        let id = row.get::<_, i64>(0)?;
        let supertypes = row.get::<_, String>(2)?;
        headers.push((
            id,
            NodeTypeDefinition {
                name: row.get(1)?,
                supertypes: supertypes.split_whitespace().map(str::to_string).collect(),
                is_abstract: row.get(3)?,
                is_mixin: row.get(4)?,
                queryable: row.get(5)?,
                orderable_child_nodes: row.get(6)?,
                primary_item_name: row.get(7)?,
                properties: Vec::new(),
                children: Vec::new(),
            },
        ));
    }

    let mut out = Vec::with_capacity(headers.len());
    for (id, mut definition) in headers {
        definition.properties = load_property_definitions(conn, id)?;
        definition.children = load_child_definitions(conn, id)?;
        out.push(definition);
    }
    Ok(out)
}

fn load_property_definitions(
    conn: &Connection,
    node_type_id: i64,
) -> Result<Vec<PropertyDefinition>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name, required_type, multiple, mandatory, auto_created, protected, default_values \
         FROM node_type_properties WHERE node_type_id=?1 ORDER BY position ASC",
    )?;
    let mut rows = stmt.query(params![node_type_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let name = row.get::<_, String>(0)?;
        let code = row.get::<_, i64>(1)?;
        let required_type = PropertyType::from_code(code).ok_or_else(|| {
            StoreError::FormatViolation(format!(
                "property definition {name} has unknown type code {code}"
            ))
        })?;
        let defaults = row.get::<_, String>(6)?;
        let default_values: Vec<String> = serde_json::from_str(&defaults).map_err(|err| {
            StoreError::FormatViolation(format!("default values of {name}: {err}"))
        })?;
        out.push(PropertyDefinition {
            name,
            required_type,
            multiple: row.get(2)?,
            mandatory: row.get(3)?,
            auto_created: row.get(4)?,
            protected: row.get(5)?,
            default_values,
        });
    }
    Ok(out)
}

fn load_child_definitions(
    conn: &Connection,
    node_type_id: i64,
) -> Result<Vec<ChildNodeDefinition>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name, primary_types, default_type, mandatory, auto_created, protected \
         FROM node_type_children WHERE node_type_id=?1 ORDER BY position ASC",
    )?;
    let mut rows = stmt.query(params![node_type_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let primary_types = row.get::<_, String>(1)?;
        out.push(ChildNodeDefinition {
            name: row.get(0)?,
            required_primary_types: primary_types
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            default_primary_type: row.get(2)?,
            mandatory: row.get(3)?,
            auto_created: row.get(4)?,
            protected: row.get(5)?,
        });
    }
    Ok(out)
}

fn insert_node_type_tx(
    conn: &Connection,
    definition: &NodeTypeDefinition,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO node_types(name, supertypes, is_abstract, is_mixin, queryable, \
         orderable_child_nodes, primary_item) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            definition.name,
            definition.supertypes.join(" "),
            definition.is_abstract,
            definition.is_mixin,
            definition.queryable,
            definition.orderable_child_nodes,
            definition.primary_item_name,
        ],
    )
    .map_err(|err| map_insert_conflict(err, &definition.name))?;
    let node_type_id = conn.last_insert_rowid();

    for (position, property) in definition.properties.iter().enumerate() {
        let defaults = serde_json::to_string(&property.default_values).map_err(|err| {
            StoreError::FormatViolation(format!("default values of {}: {err}", property.name))
        })?;
        conn.execute(
            "INSERT INTO node_type_properties(node_type_id, position, name, required_type, \
             multiple, mandatory, auto_created, protected, default_values) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                node_type_id,
                to_sqlite_i64(position)?,
                property.name,
                property.required_type.code(),
                property.multiple,
                property.mandatory,
                property.auto_created,
                property.protected,
                defaults,
            ],
        )?;
    }

    for (position, child) in definition.children.iter().enumerate() {
        conn.execute(
            "INSERT INTO node_type_children(node_type_id, position, name, primary_types, \
             default_type, mandatory, auto_created, protected) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                node_type_id,
                to_sqlite_i64(position)?,
                child.name,
                child.required_primary_types.join(" "),
                child.default_primary_type,
                child.mandatory,
                child.auto_created,
                child.protected,
            ],
        )?;
    }
    Ok(())
}

impl SqliteStore {
    /// Registers user types. An existing user type is replaced only with
    /// `allow_update`; built-in types can never be redefined.
    pub fn register_node_types(
        &mut self,
        definitions: &[NodeTypeDefinition],
        allow_update: bool,
    ) -> Result<(), StoreError> {
        let (scope, session) = self.write_scope()?;
        let mut known = session.catalogue(&scope)?.clone();
        for definition in definitions {
            known.insert(definition.clone());
        }

        for definition in definitions {
            if is_standard_type(&definition.name) {
                return Err(StoreError::AlreadyExists(format!(
                    "built-in node type {}",
                    definition.name
                )));
            }
            if let Some(missing) = definition
                .supertypes
                .iter()
                .find(|supertype| !known.contains(supertype))
            {
                return Err(StoreError::ConstraintViolation(format!(
                    "supertype {missing} of {} is not registered",
                    definition.name
                )));
            }

            let existing = scope
                .query_row(
                    "SELECT node_type_id FROM node_types WHERE name=?1",
                    params![definition.name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            if let Some(node_type_id) = existing {
                if !allow_update {
                    return Err(StoreError::AlreadyExists(format!(
                        "node type {}",
                        definition.name
                    )));
                }
                scope.execute(
                    "DELETE FROM node_types WHERE node_type_id=?1",
                    params![node_type_id],
                )?;
            }
            insert_node_type_tx(&scope, definition)?;
            tracing::debug!(node_type = %definition.name, "node type registered");
        }

        scope.commit()?;
        session.invalidate_node_types();
        Ok(())
    }

    pub fn register_node_types_cnd(
        &mut self,
        _cnd: &str,
        _allow_update: bool,
    ) -> Result<(), StoreError> {
        Err(StoreError::NotSupported(
            "node type registration from CND text".to_string(),
        ))
    }

    /// Built-in and user types, optionally limited to the given names.
    pub fn node_types(
        &mut self,
        names: Option<&[&str]>,
    ) -> Result<Vec<NodeTypeDefinition>, StoreError> {
        let (conn, session) = self.read_parts()?;
        let catalogue = session.catalogue(conn)?;
        Ok(catalogue
            .definitions()
            .filter(|definition| {
                names.is_none_or(|names| names.contains(&definition.name.as_str()))
            })
            .cloned()
            .collect())
    }
}
