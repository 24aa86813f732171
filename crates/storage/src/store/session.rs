#![forbid(unsafe_code)]

use super::error::StoreError;
use super::{namespaces, node_types};
use cr_core::{NamespaceMap, NodeTypeCatalogue};
use rusqlite::Connection;
use std::collections::HashMap;

/// Per-login state. The caches are hints only; nothing here is trusted
/// without checking the backend.
#[derive(Debug)]
pub(super) struct Session {
    workspace: String,
    user_id: String,
    namespaces: Option<NamespaceMap>,
    catalogue: Option<NodeTypeCatalogue>,
    identifiers: HashMap<String, String>,
}

impl Session {
    pub fn new(workspace: String, user_id: String) -> Self {
        Self {
            workspace,
            user_id,
            namespaces: None,
            catalogue: None,
            identifiers: HashMap::new(),
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn namespaces(&mut self, conn: &Connection) -> Result<&NamespaceMap, StoreError> {
        if self.namespaces.is_none() {
            self.namespaces = Some(namespaces::load_namespaces(conn)?);
        }
        Ok(self.namespaces.get_or_insert_with(NamespaceMap::new))
    }

    pub fn catalogue(&mut self, conn: &Connection) -> Result<&NodeTypeCatalogue, StoreError> {
        if self.catalogue.is_none() {
            self.catalogue = Some(node_types::load_catalogue(conn)?);
        }
        Ok(self
            .catalogue
            .get_or_insert_with(NodeTypeCatalogue::standard))
    }

    pub fn invalidate_namespaces(&mut self) {
        self.namespaces = None;
    }

    pub fn invalidate_node_types(&mut self) {
        self.catalogue = None;
    }

    pub fn remember_identifier(&mut self, identifier: &str, path: &str) {
        self.identifiers
            .insert(identifier.to_string(), path.to_string());
    }

    pub fn forget_identifier(&mut self, identifier: &str) {
        self.identifiers.remove(identifier);
    }

    pub fn identifier_hint(&self, identifier: &str) -> Option<&str> {
        self.identifiers.get(identifier).map(String::as_str)
    }

    pub fn clear_caches(&mut self) {
        self.namespaces = None;
        self.catalogue = None;
        self.identifiers.clear();
    }
}
