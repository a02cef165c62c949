//! Error types for viewlink.

use thiserror::Error;

/// Top-level result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Top-level error type for link binding and mutation forwarding.
///
/// Errors are `Clone` so a single failure can be stored in a shared
/// [`TaskQueue`](crate::queue::TaskQueue) and handed to every reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The view or the collection is not attached at mutation time.
    #[error("collection not loaded: {0}")]
    CollectionNotLoaded(String),

    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// View lookup failed, the type did not match, or the view refused registration.
    #[error("view not found: {0}")]
    ViewNotFound(String),

    #[error("bad link definition: {0}")]
    BadDefinition(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// A failure reported by the view itself.
    #[error("view error: {0}")]
    View(String),
}

/// Discriminant of a [`LinkError`] without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CollectionNotLoaded,
    BadParameter,
    ViewNotFound,
    BadDefinition,
    Internal,
    View,
}

impl LinkError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CollectionNotLoaded(_) => ErrorKind::CollectionNotLoaded,
            Self::BadParameter(_) => ErrorKind::BadParameter,
            Self::ViewNotFound(_) => ErrorKind::ViewNotFound,
            Self::BadDefinition(_) => ErrorKind::BadDefinition,
            Self::Internal(_) => ErrorKind::Internal,
            Self::View(_) => ErrorKind::View,
        }
    }
}
