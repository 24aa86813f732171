#![forbid(unsafe_code)]

use crate::node_types::NT_UNSTRUCTURED;
use crate::paths::NodePath;
use crate::properties::Property;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet persisted; storing creates the row.
    New,
    /// Already persisted; storing rewrites its document.
    Existing,
}

/// The session's in-memory view of a node handed to the store.
///
/// `children` holds only the new children that should be created when the
/// node is stored recursively. Persisted children are not listed here.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedNode {
    pub path: NodePath,
    pub primary_type: String,
    pub mixin_types: Vec<String>,
    pub identifier: Option<String>,
    pub state: NodeState,
    pub properties: BTreeMap<String, Property>,
    pub children: Vec<StagedNode>,
}

impl StagedNode {
    pub fn new(path: NodePath) -> Self {
        Self {
            path,
            primary_type: NT_UNSTRUCTURED.to_string(),
            mixin_types: Vec::new(),
            identifier: None,
            state: NodeState::New,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn existing(path: NodePath) -> Self {
        Self {
            state: NodeState::Existing,
            ..Self::new(path)
        }
    }

    pub fn with_primary_type(mut self, name: impl Into<String>) -> Self {
        self.primary_type = name.into();
        self
    }

    pub fn with_mixin(mut self, name: impl Into<String>) -> Self {
        self.mixin_types.push(name.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.set_property(property);
        self
    }

    pub fn with_child(mut self, child: StagedNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn set_property(&mut self, property: Property) {
        self.properties.insert(property.name().to_string(), property);
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn is_new(&self) -> bool {
        self.state == NodeState::New
    }

    /// Names of the staged children.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|child| child.path.name())
    }
}
