#![forbid(unsafe_code)]

use cr_core::{NodePath, Property};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            password: password.into(),
        }
    }
}

/// A persisted node as read back from the hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSnapshot {
    pub identifier: String,
    pub path: NodePath,
    pub primary_type: String,
    pub depth: usize,
    pub sort_order: Option<i64>,
    pub properties: Vec<Property>,
    /// Child names in sibling order.
    pub children: Vec<String>,
}

impl NodeSnapshot {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.name() == name)
    }

    pub fn mixin_types(&self) -> Vec<String> {
        self.property(cr_core::node_types::JCR_MIXIN_TYPES)
            .map(|property| {
                property
                    .strings()
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Binary payload of one property, shaped by the property's multiplicity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BinaryContent {
    Single(Vec<u8>),
    Multiple(Vec<Vec<u8>>),
}

/// Move `name` in front of `before`, or to the end when `before` is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorderMove {
    pub name: String,
    pub before: Option<String>,
}

impl ReorderMove {
    pub fn before(name: impl Into<String>, before: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: Some(before.into()),
        }
    }

    pub fn to_end(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyNodeRequest {
    pub src_path: String,
    pub dst_path: String,
    /// Source workspace, the session's workspace when `None`.
    pub src_workspace: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryColumnValue {
    Missing,
    Property(Property),
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryResultRow {
    pub path: String,
    pub score: f64,
    /// Column label -> value, in request order.
    pub columns: Vec<(String, QueryColumnValue)>,
}

impl QueryResultRow {
    pub fn column(&self, label: &str) -> Option<&QueryColumnValue> {
        self.columns
            .iter()
            .find(|(candidate, _)| candidate == label)
            .map(|(_, value)| value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorValue {
    Text(String),
    Flag(bool),
}

pub type RepositoryDescriptors = BTreeMap<String, DescriptorValue>;
