#![forbid(unsafe_code)]

pub mod ids;
pub mod namespaces;
pub mod node_types;
pub mod paths;
pub mod properties;
pub mod query;
pub mod staged;

pub use ids::{DEFAULT_WORKSPACE, WorkspaceName, WorkspaceNameError};
pub use namespaces::NamespaceMap;
pub use node_types::{
    AutoCreateKind, CatalogueError, ChildNodeDefinition, NodeTypeCatalogue, NodeTypeDefinition,
    PropertyDefinition,
};
pub use paths::{NodePath, NodePathError};
pub use properties::{BinaryValue, Property, PropertyError, PropertyType, Value, ValueError};
pub use query::{
    Column, CompileContext, Constraint, Join, JoinType, Operator, OrderDirection, Ordering, Query,
    QueryCompileError, QueryCompiler, QueryForm, QueryObjectModel, Selector, Source,
};
pub use staged::{NodeState, StagedNode};
