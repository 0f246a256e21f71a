use thiserror::Error;

/// Errors raised by the term-tree operations and their storage seam.
///
/// Unresolved mapping leaves are not errors. They are reported in
/// [`crate::tree::MappingReport`] and never abort a walk.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("invalid version '{0}': expected <major>.<minor>.<patch>")]
    Format(String),

    #[error("{0}")]
    NotFound(String),

    #[error("tree depth exceeded the limit of {limit} levels at '{iri}'")]
    DepthExceeded { limit: usize, iri: String },

    #[error("cannot rename '{0}': it already has child term sets or terms")]
    RenameUnsupported(String),

    #[error("'{0}' already exists")]
    Duplicate(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl TreeError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Whether the error describes bad caller input rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;
