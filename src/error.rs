use thiserror::Error;

/// Result type alias for ACL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by registries, the permission matrix and the [`Acl`](crate::Acl).
///
/// Every error is a precondition violation reported before any state is
/// changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The id is already present in the registry.
    #[error("duplicate entry in registry: '{0}'")]
    DuplicateEntry(String),

    /// The id or permission key is not present.
    #[error("entry not found: '{0}'")]
    EntryNotFound(String),

    /// A removal was requested without an entry.
    #[error("nil entry")]
    NilEntry,

    /// An import targeted a store that already holds data.
    #[error("cannot import into non-empty {0}")]
    NonEmpty(&'static str),
}

impl Error {
    pub(crate) fn duplicate(id: impl Into<String>) -> Self {
        Self::DuplicateEntry(id.into())
    }

    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        Self::EntryNotFound(id.into())
    }
}
