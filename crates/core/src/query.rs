#![forbid(unsafe_code)]

//! Structured query model and the compiler seam.
//!
//! A compiler turns a [`QueryObjectModel`] into backend query text. The text
//! must select `path`, `type` and `props` of the matching node rows, in that
//! order, and bind the workspace name as parameter 1.

use crate::namespaces::NamespaceMap;
use crate::node_types::NodeTypeCatalogue;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    pub node_type: String,
    pub name: String,
}

impl Selector {
    pub fn new(node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            name: name.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub left: Box<Source>,
    pub right: Box<Source>,
    pub join_type: JoinType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Selector(Selector),
    Join(Join),
}

impl Source {
    pub fn as_selector(&self) -> Option<&Selector> {
        match self {
            Self::Selector(selector) => Some(selector),
            Self::Join(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    Like,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
    Not(Box<Constraint>),
    SameNode {
        selector: String,
        path: String,
    },
    ChildNode {
        selector: String,
        parent_path: String,
    },
    DescendantNode {
        selector: String,
        ancestor_path: String,
    },
    PropertyExists {
        selector: String,
        property: String,
    },
    Comparison {
        selector: String,
        property: String,
        operator: Operator,
        literal: String,
    },
}

impl Constraint {
    pub fn and(self, other: Constraint) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Constraint) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ordering {
    pub selector: String,
    pub property: String,
    pub direction: OrderDirection,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub selector: Option<String>,
    pub property: String,
}

impl Column {
    pub fn new(selector: Option<&str>, property: impl Into<String>) -> Self {
        Self {
            selector: selector.map(str::to_string),
            property: property.into(),
        }
    }

    /// `selector.property` when the column names a selector.
    pub fn label(&self) -> String {
        match &self.selector {
            Some(selector) => format!("{selector}.{}", self.property),
            None => self.property.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryObjectModel {
    pub source: Source,
    pub constraint: Option<Constraint>,
    pub orderings: Vec<Ordering>,
    pub columns: Vec<Column>,
}

impl QueryObjectModel {
    pub fn select(selector: Selector) -> Self {
        Self {
            source: Source::Selector(selector),
            constraint: None,
            orderings: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_ordering(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryForm {
    Structured(QueryObjectModel),
    Statement { language: String, statement: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub form: QueryForm,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn structured(model: QueryObjectModel) -> Self {
        Self {
            form: QueryForm::Structured(model),
            limit: None,
            offset: None,
        }
    }

    pub fn statement(language: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            form: QueryForm::Statement {
                language: language.into(),
                statement: statement.into(),
            },
            limit: None,
            offset: None,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Catalogues a compiler may consult.
#[derive(Clone, Copy, Debug)]
pub struct CompileContext<'a> {
    pub namespaces: &'a NamespaceMap,
    pub catalogue: &'a NodeTypeCatalogue,
}

pub trait QueryCompiler: Send {
    /// Parses raw query text into the structured form.
    fn parse(
        &self,
        language: &str,
        statement: &str,
        context: &CompileContext<'_>,
    ) -> Result<QueryObjectModel, QueryCompileError>;

    fn compile(
        &self,
        model: &QueryObjectModel,
        context: &CompileContext<'_>,
    ) -> Result<String, QueryCompileError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryCompileError {
    /// The compiler does not handle this query shape or language.
    Unsupported(String),
    /// The query is malformed.
    Invalid(String),
}

impl QueryCompileError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => "query shape is not supported by the compiler",
            Self::Invalid(_) => "query is invalid",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Unsupported(detail) | Self::Invalid(detail) => detail,
        }
    }
}
