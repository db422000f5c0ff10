use thiserror::Error;

/// Errors raised while configuring, building or rendering a type tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("no node kind is registered for values of type `{0}`")]
    UnsupportedType(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("`{0}` cannot be turned into a valid type name")]
    InvalidIdentifier(String),

    #[error("alias `{name}` would be declared twice with different shapes")]
    NameConflict { name: String },
}

impl TreeError {
    pub(crate) fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TreeError::InvalidConfig { field: field.into(), reason: reason.into() }
    }
}

pub type TreeResult<T> = Result<T, TreeError>;
