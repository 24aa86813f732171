#![forbid(unsafe_code)]

use super::validate::{ValidationContext, validate_node};
use super::*;
use cr_core::node_types::JCR_UUID;
use cr_core::{PropertyType, StagedNode};
use std::collections::BTreeSet;

struct StoreContext<'a> {
    conn: &'a Connection,
    workspace: &'a str,
    user_id: &'a str,
    namespaces: &'a NamespaceMap,
    catalogue: &'a NodeTypeCatalogue,
}

/// A stored row whose reference edges still need rebuilding.
struct PendingReferences {
    node_id: i64,
    path: String,
    properties: Vec<Property>,
}

impl SqliteStore {
    /// Persists `node` and, with `recurse`, every new child below it, in one
    /// transaction. Returns the node's identifier.
    ///
    /// Reference edges are rebuilt once all rows exist, so references between
    /// nodes stored together resolve.
    pub fn store_node(&mut self, node: &StagedNode, recurse: bool) -> Result<String, StoreError> {
        let (scope, session) = self.write_scope()?;
        let namespaces = session.namespaces(&scope)?.clone();
        let catalogue = session.catalogue(&scope)?.clone();
        let ctx = StoreContext {
            conn: &scope,
            workspace: session.workspace(),
            user_id: session.user_id(),
            namespaces: &namespaces,
            catalogue: &catalogue,
        };

        let mut stored = Vec::new();
        let mut pending = Vec::new();
        let identifier = store_one(&ctx, node, recurse, &mut stored, &mut pending)?;
        for entry in &pending {
            let properties: Vec<&Property> = entry.properties.iter().collect();
            references::rebuild_references_tx(
                &scope,
                ctx.workspace,
                entry.node_id,
                &entry.path,
                &properties,
            )?;
        }
        drop(ctx);

        scope.commit()?;
        for (identifier, path) in &stored {
            session.remember_identifier(identifier, path);
        }
        Ok(identifier)
    }
}

fn store_one(
    ctx: &StoreContext<'_>,
    node: &StagedNode,
    recurse: bool,
    stored: &mut Vec<(String, String)>,
    pending: &mut Vec<PendingReferences>,
) -> Result<String, StoreError> {
    let path = node.path.as_str();
    let existing = hierarchy::load_row(ctx.conn, ctx.workspace, path)?;
    match (&existing, node.is_new()) {
        (Some(_), true) => {
            return Err(StoreError::AlreadyExists(format!(
                "node {path} in workspace {}",
                ctx.workspace
            )));
        }
        (None, false) => {
            return Err(StoreError::NotFound(format!(
                "node {path} in workspace {}",
                ctx.workspace
            )));
        }
        _ => {}
    }

    let identifier = resolve_identifier(node, existing.as_ref())?;
    let persisted_children = match &existing {
        Some(_) => hierarchy::child_names(ctx.conn, ctx.workspace, path)?,
        None => Vec::new(),
    };
    let properties = validate_node(
        node,
        &ValidationContext {
            catalogue: ctx.catalogue,
            namespaces: ctx.namespaces,
            user_id: ctx.user_id,
            identifier: &identifier,
            persisted_children: &persisted_children,
        },
    )?;

    let encoded = encode_properties(properties.values(), false)?;
    let node_id = match &existing {
        Some(row) => {
            hierarchy::update_node_tx(ctx.conn, row.id, &node.primary_type, &encoded.document)?;
            row.id
        }
        None => hierarchy::insert_node_tx(
            ctx.conn,
            ctx.namespaces,
            NewNodeRow {
                workspace: ctx.workspace,
                path: &node.path,
                node_type: &node.primary_type,
                identifier: &identifier,
                props: &encoded.document,
            },
        )?,
    };

    for (name, payloads) in &encoded.binaries {
        binary::replace_binary_tx(ctx.conn, ctx.workspace, node_id, name, payloads)?;
    }
    let binary_properties: BTreeSet<&str> = properties
        .values()
        .filter(|property| property.kind() == PropertyType::Binary)
        .map(Property::name)
        .collect();
    binary::retain_binaries_tx(ctx.conn, ctx.workspace, node_id, &binary_properties)?;

    tracing::debug!(
        workspace = ctx.workspace,
        path,
        created = existing.is_none(),
        "node stored"
    );
    stored.push((identifier.clone(), path.to_string()));
    pending.push(PendingReferences {
        node_id,
        path: path.to_string(),
        properties: properties.into_values().collect(),
    });

    if recurse {
        for child in node.children.iter().filter(|child| child.is_new()) {
            if child.path.parent().as_ref() != Some(&node.path) {
                return Err(StoreError::ConstraintViolation(format!(
                    "staged child {} is not a child of {path}",
                    child.path
                )));
            }
            store_one(ctx, child, true, stored, pending)?;
        }
    }
    Ok(identifier)
}

/// Existing rows keep their identifier. New rows take the staged one, then a
/// staged `jcr:uuid`, then a fresh one.
fn resolve_identifier(
    node: &StagedNode,
    existing: Option<&hierarchy::NodeRow>,
) -> Result<String, StoreError> {
    let path = node.path.as_str();
    let declared = node
        .property(JCR_UUID)
        .and_then(|property| property.value().as_str())
        .map(str::to_string);

    if let Some(row) = existing {
        let conflicting = [node.identifier.as_ref(), declared.as_ref()]
            .into_iter()
            .flatten()
            .any(|candidate| *candidate != row.identifier);
        if conflicting {
            return Err(StoreError::ConstraintViolation(format!(
                "identifier of {path} cannot change from {}",
                row.identifier
            )));
        }
        return Ok(row.identifier.clone());
    }

    match (&node.identifier, declared) {
        (Some(staged), Some(declared)) if *staged != declared => {
            Err(StoreError::ConstraintViolation(format!(
                "{JCR_UUID} {declared} of {path} differs from its identifier {staged}"
            )))
        }
        (Some(staged), _) => Ok(staged.clone()),
        (None, Some(declared)) => Ok(declared),
        (None, None) => Ok(new_identifier()),
    }
}
