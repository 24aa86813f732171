#![forbid(unsafe_code)]

//! Absolute node paths.
//!
//! The path is the only structural key of a node row. Parent path, local
//! name and depth are all derived from it.

pub const ROOT_PATH: &str = "/";

const MAX_PATH_LEN: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        Self(ROOT_PATH.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, NodePathError> {
        let value = value.into();
        validate_path(&value)?;
        Ok(Self(value))
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_PATH
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        Some(Self(self.parent_str().to_string()))
    }

    /// Parent path as stored in the `parent` column: empty for the root.
    pub fn parent_str(&self) -> &str {
        if self.is_root() {
            return "";
        }
        match self.0.rfind('/') {
            Some(0) | None => ROOT_PATH,
            Some(index) => &self.0[..index],
        }
    }

    /// Last segment, empty for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        match self.0.rfind('/') {
            Some(index) => &self.0[index + 1..],
            None => &self.0,
        }
    }

    pub fn depth(&self) -> usize {
        if self.is_root() {
            return 0;
        }
        self.0.split('/').skip(1).count()
    }

    pub fn join(&self, name: &str) -> Result<NodePath, NodePathError> {
        if self.is_root() {
            Self::try_new(format!("/{name}"))
        } else {
            Self::try_new(format!("{}/{name}", self.0))
        }
    }

    /// Prefix every strict descendant path starts with.
    pub fn descendant_prefix(&self) -> String {
        if self.is_root() {
            ROOT_PATH.to_string()
        } else {
            format!("{}/", self.0)
        }
    }

    pub fn is_descendant_of(&self, ancestor: &NodePath) -> bool {
        self != ancestor && self.0.starts_with(&ancestor.descendant_prefix())
    }

    pub fn is_self_or_descendant_of(&self, ancestor: &NodePath) -> bool {
        self == ancestor || self.is_descendant_of(ancestor)
    }

    /// Substitutes the `from` prefix with `to`. `None` when this path is not
    /// `from` or below it.
    pub fn rebase(&self, from: &NodePath, to: &NodePath) -> Option<NodePath> {
        if self == from {
            return Some(to.clone());
        }
        let rest = self.0.strip_prefix(&from.descendant_prefix())?;
        Some(Self(format!("{}{rest}", to.descendant_prefix())))
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Splits `/a/b/prop` into the owning node path `/a/b` and the property name.
pub fn split_property_path(value: &str) -> Result<(NodePath, String), NodePathError> {
    let path = NodePath::try_new(value)?;
    let Some(parent) = path.parent() else {
        return Err(NodePathError::NotAProperty);
    };
    let name = path.name().to_string();
    Ok((parent, name))
}

/// Joins a node path and a property name into a property path.
pub fn property_path(node_path: &str, property_name: &str) -> String {
    if node_path == ROOT_PATH {
        format!("/{property_name}")
    } else {
        format!("{node_path}/{property_name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodePathError {
    Empty,
    TooLong,
    NotAbsolute,
    TrailingSlash,
    EmptySegment,
    RelativeSegment,
    InvalidChar { ch: char },
    InvalidPrefix,
    NotAProperty,
}

impl NodePathError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "path must not be empty",
            Self::TooLong => "path is too long",
            Self::NotAbsolute => "path must be absolute",
            Self::TrailingSlash => "path must not end with '/'",
            Self::EmptySegment => "path contains an empty segment",
            Self::RelativeSegment => "path must not contain '.' or '..' segments",
            Self::InvalidChar { .. } => "path contains an invalid character",
            Self::InvalidPrefix => "path segment has a malformed namespace prefix",
            Self::NotAProperty => "the root path does not name a property",
        }
    }
}

fn validate_path(value: &str) -> Result<(), NodePathError> {
    if value.is_empty() {
        return Err(NodePathError::Empty);
    }
    if value.len() > MAX_PATH_LEN {
        return Err(NodePathError::TooLong);
    }
    if !value.starts_with('/') {
        return Err(NodePathError::NotAbsolute);
    }
    if value == ROOT_PATH {
        return Ok(());
    }
    if value.ends_with('/') {
        return Err(NodePathError::TrailingSlash);
    }
    for segment in value.split('/').skip(1) {
        validate_segment(segment)?;
    }
    Ok(())
}

fn validate_segment(segment: &str) -> Result<(), NodePathError> {
    if segment.is_empty() {
        return Err(NodePathError::EmptySegment);
    }
    if segment == "." || segment == ".." {
        return Err(NodePathError::RelativeSegment);
    }
    if let Some(ch) = segment
        .chars()
        .find(|ch| ch.is_control() || matches!(ch, '[' | ']' | '*' | '|'))
    {
        return Err(NodePathError::InvalidChar { ch });
    }
    match segment.split_once(':') {
        Some((prefix, local)) => {
            if prefix.is_empty() || local.is_empty() || local.contains(':') {
                return Err(NodePathError::InvalidPrefix);
            }
            Ok(())
        }
        None => Ok(()),
    }
}
