#![forbid(unsafe_code)]

//! Node-type definitions and the catalogue that flattens them for validation.

use crate::properties::PropertyType;
use std::collections::{BTreeMap, BTreeSet};

/// Name of residual property and child definitions.
pub const RESIDUAL_NAME: &str = "*";

pub const NT_BASE: &str = "nt:base";
pub const NT_UNSTRUCTURED: &str = "nt:unstructured";
pub const NT_HIERARCHY_NODE: &str = "nt:hierarchyNode";
pub const NT_FOLDER: &str = "nt:folder";
pub const NT_FILE: &str = "nt:file";
pub const NT_RESOURCE: &str = "nt:resource";
pub const MIX_REFERENCEABLE: &str = "mix:referenceable";
pub const MIX_CREATED: &str = "mix:created";
pub const MIX_LAST_MODIFIED: &str = "mix:lastModified";
pub const MIX_ETAG: &str = "mix:etag";

pub const JCR_PRIMARY_TYPE: &str = "jcr:primaryType";
pub const JCR_MIXIN_TYPES: &str = "jcr:mixinTypes";
pub const JCR_UUID: &str = "jcr:uuid";
pub const JCR_CREATED: &str = "jcr:created";
pub const JCR_CREATED_BY: &str = "jcr:createdBy";
pub const JCR_LAST_MODIFIED: &str = "jcr:lastModified";
pub const JCR_LAST_MODIFIED_BY: &str = "jcr:lastModifiedBy";
pub const JCR_ETAG: &str = "jcr:etag";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDefinition {
    pub name: String,
    pub required_type: PropertyType,
    pub multiple: bool,
    pub mandatory: bool,
    pub auto_created: bool,
    pub protected: bool,
    pub default_values: Vec<String>,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, required_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            required_type,
            multiple: false,
            mandatory: false,
            auto_created: false,
            protected: false,
            default_values: Vec::new(),
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn auto_created(mut self) -> Self {
        self.auto_created = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_values.push(value.into());
        self
    }

    pub fn is_residual(&self) -> bool {
        self.name == RESIDUAL_NAME
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildNodeDefinition {
    pub name: String,
    pub required_primary_types: Vec<String>,
    pub default_primary_type: Option<String>,
    pub mandatory: bool,
    pub auto_created: bool,
    pub protected: bool,
}

impl ChildNodeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_primary_types: Vec::new(),
            default_primary_type: None,
            mandatory: false,
            auto_created: false,
            protected: false,
        }
    }

    pub fn required_type(mut self, name: impl Into<String>) -> Self {
        self.required_primary_types.push(name.into());
        self
    }

    pub fn default_type(mut self, name: impl Into<String>) -> Self {
        self.default_primary_type = Some(name.into());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn auto_created(mut self) -> Self {
        self.auto_created = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn is_residual(&self) -> bool {
        self.name == RESIDUAL_NAME
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeTypeDefinition {
    pub name: String,
    pub supertypes: Vec<String>,
    pub is_abstract: bool,
    pub is_mixin: bool,
    pub queryable: bool,
    pub orderable_child_nodes: bool,
    pub primary_item_name: Option<String>,
    pub properties: Vec<PropertyDefinition>,
    pub children: Vec<ChildNodeDefinition>,
}

impl NodeTypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            is_abstract: false,
            is_mixin: false,
            queryable: true,
            orderable_child_nodes: false,
            primary_item_name: None,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn supertype(mut self, name: impl Into<String>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn mixin(mut self) -> Self {
        self.is_mixin = true;
        self
    }

    pub fn orderable(mut self) -> Self {
        self.orderable_child_nodes = true;
        self
    }

    pub fn primary_item(mut self, name: impl Into<String>) -> Self {
        self.primary_item_name = Some(name.into());
        self
    }

    pub fn property(mut self, definition: PropertyDefinition) -> Self {
        self.properties.push(definition);
        self
    }

    pub fn child(mut self, definition: ChildNodeDefinition) -> Self {
        self.children.push(definition);
        self
    }
}

/// How an absent auto-created property gets its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoCreateKind {
    Identifier,
    Principal,
    Timestamp,
    PrimaryType,
    /// Known property whose value cannot be synthesized here.
    Unsupported,
    /// Falls back to the declared default values.
    Default,
}

pub fn auto_create_kind(property_name: &str) -> AutoCreateKind {
    match property_name {
        JCR_UUID => AutoCreateKind::Identifier,
        JCR_CREATED_BY | JCR_LAST_MODIFIED_BY => AutoCreateKind::Principal,
        JCR_CREATED | JCR_LAST_MODIFIED => AutoCreateKind::Timestamp,
        JCR_PRIMARY_TYPE => AutoCreateKind::PrimaryType,
        JCR_ETAG => AutoCreateKind::Unsupported,
        _ => AutoCreateKind::Default,
    }
}

/// Built-in types every repository carries.
pub fn standard_node_types() -> Vec<NodeTypeDefinition> {
    vec![
        NodeTypeDefinition::new(NT_BASE)
            .abstract_type()
            .property(
                PropertyDefinition::new(JCR_PRIMARY_TYPE, PropertyType::Name)
                    .mandatory()
                    .auto_created()
                    .protected(),
            )
            .property(
                PropertyDefinition::new(JCR_MIXIN_TYPES, PropertyType::Name)
                    .multiple()
                    .protected(),
            ),
        NodeTypeDefinition::new(NT_UNSTRUCTURED)
            .supertype(NT_BASE)
            .orderable()
            .property(PropertyDefinition::new(RESIDUAL_NAME, PropertyType::String).multiple())
            .property(PropertyDefinition::new(RESIDUAL_NAME, PropertyType::String))
            .child(ChildNodeDefinition::new(RESIDUAL_NAME).default_type(NT_UNSTRUCTURED)),
        NodeTypeDefinition::new(NT_HIERARCHY_NODE)
            .abstract_type()
            .supertype(NT_BASE)
            .supertype(MIX_CREATED),
        NodeTypeDefinition::new(NT_FOLDER)
            .supertype(NT_HIERARCHY_NODE)
            .child(ChildNodeDefinition::new(RESIDUAL_NAME).required_type(NT_HIERARCHY_NODE)),
        NodeTypeDefinition::new(NT_FILE)
            .supertype(NT_HIERARCHY_NODE)
            .primary_item("jcr:content")
            .child(
                ChildNodeDefinition::new("jcr:content")
                    .required_type(NT_BASE)
                    .mandatory(),
            ),
        NodeTypeDefinition::new(NT_RESOURCE)
            .supertype(NT_BASE)
            .supertype(MIX_LAST_MODIFIED)
            .primary_item("jcr:data")
            .property(PropertyDefinition::new("jcr:data", PropertyType::Binary).mandatory())
            .property(PropertyDefinition::new("jcr:mimeType", PropertyType::String))
            .property(PropertyDefinition::new("jcr:encoding", PropertyType::String)),
        NodeTypeDefinition::new(MIX_REFERENCEABLE).mixin().property(
            PropertyDefinition::new(JCR_UUID, PropertyType::String)
                .mandatory()
                .auto_created()
                .protected(),
        ),
        NodeTypeDefinition::new(MIX_CREATED)
            .mixin()
            .property(
                PropertyDefinition::new(JCR_CREATED, PropertyType::Date)
                    .auto_created()
                    .protected(),
            )
            .property(
                PropertyDefinition::new(JCR_CREATED_BY, PropertyType::String)
                    .auto_created()
                    .protected(),
            ),
        NodeTypeDefinition::new(MIX_LAST_MODIFIED)
            .mixin()
            .property(PropertyDefinition::new(JCR_LAST_MODIFIED, PropertyType::Date).auto_created())
            .property(
                PropertyDefinition::new(JCR_LAST_MODIFIED_BY, PropertyType::String).auto_created(),
            ),
        NodeTypeDefinition::new(MIX_ETAG).mixin().property(
            PropertyDefinition::new(JCR_ETAG, PropertyType::String)
                .auto_created()
                .protected(),
        ),
    ]
}

pub fn is_standard_type(name: &str) -> bool {
    matches!(
        name,
        NT_BASE
            | NT_UNSTRUCTURED
            | NT_HIERARCHY_NODE
            | NT_FOLDER
            | NT_FILE
            | NT_RESOURCE
            | MIX_REFERENCEABLE
            | MIX_CREATED
            | MIX_LAST_MODIFIED
            | MIX_ETAG
    )
}

/// All known types by name. Built-ins are seeded by [`NodeTypeCatalogue::standard`].
#[derive(Clone, Debug, Default)]
pub struct NodeTypeCatalogue {
    types: BTreeMap<String, NodeTypeDefinition>,
}

impl NodeTypeCatalogue {
    pub fn standard() -> Self {
        let mut catalogue = Self::default();
        for definition in standard_node_types() {
            catalogue.insert(definition);
        }
        catalogue
    }

    pub fn insert(&mut self, definition: NodeTypeDefinition) {
        self.types.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&NodeTypeDefinition> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &NodeTypeDefinition> {
        self.types.values()
    }

    /// Primary type plus mixins, flattened through supertypes, depth first,
    /// each type once.
    pub fn effective_types<'a>(
        &'a self,
        primary_type: &str,
        mixins: &[String],
    ) -> Result<Vec<&'a NodeTypeDefinition>, CatalogueError> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        self.collect(primary_type, &mut seen, &mut out)?;
        for mixin in mixins {
            self.collect(mixin, &mut seen, &mut out)?;
        }
        Ok(out)
    }

    fn collect<'a>(
        &'a self,
        name: &str,
        seen: &mut BTreeSet<String>,
        out: &mut Vec<&'a NodeTypeDefinition>,
    ) -> Result<(), CatalogueError> {
        if !seen.insert(name.to_string()) {
            return Ok(());
        }
        let definition = self
            .get(name)
            .ok_or_else(|| CatalogueError::UnknownType(name.to_string()))?;
        out.push(definition);
        for supertype in &definition.supertypes {
            self.collect(supertype, seen, out)?;
        }
        Ok(())
    }

    /// True when `name` is `ancestor` or inherits from it.
    pub fn is_node_type(&self, name: &str, ancestor: &str) -> bool {
        let mut stack = vec![name];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(definition) = self.get(current) {
                stack.extend(definition.supertypes.iter().map(String::as_str));
            }
        }
        false
    }

    /// The type itself and every known type inheriting from it.
    pub fn subtypes_of(&self, name: &str) -> Vec<String> {
        self.types
            .keys()
            .filter(|candidate| self.is_node_type(candidate, name))
            .cloned()
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogueError {
    UnknownType(String),
}

impl CatalogueError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "node type is not registered",
        }
    }
}
