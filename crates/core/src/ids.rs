#![forbid(unsafe_code)]

pub const DEFAULT_WORKSPACE: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceName(String);

impl WorkspaceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, WorkspaceNameError> {
        let value = value.into();
        validate_workspace_name(&value)?;
        Ok(Self(value))
    }
}

impl std::fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspaceNameError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
}

impl WorkspaceNameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "workspace name must not be empty",
            Self::TooLong => "workspace name is too long",
            Self::InvalidFirstChar => "workspace name must start with an ascii letter or digit",
            Self::InvalidChar { .. } => "workspace name contains an invalid character",
        }
    }
}

fn validate_workspace_name(value: &str) -> Result<(), WorkspaceNameError> {
    if value.is_empty() {
        return Err(WorkspaceNameError::Empty);
    }
    if value.len() > 128 {
        return Err(WorkspaceNameError::TooLong);
    }
    let Some(first) = value.chars().next() else {
        return Err(WorkspaceNameError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(WorkspaceNameError::InvalidFirstChar);
    }
    for (index, ch) in value.chars().enumerate().skip(1) {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            continue;
        }
        return Err(WorkspaceNameError::InvalidChar { ch, index });
    }
    Ok(())
}
