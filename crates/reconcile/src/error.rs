//! Error types for reconciliation.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while resolving references or converging state.
#[derive(Debug, Error)]
pub enum Error {
    /// A required entity could not be found on the server.
    #[error("no {resource} found matching {query}")]
    Lookup {
        /// Plural resource name that was searched.
        resource: String,
        /// The search expression that produced no results.
        query: String,
    },

    /// A search that must identify a single entity matched several.
    #[error("found more than one {resource} matching {query}, narrow the search")]
    Ambiguous {
        /// Plural resource name that was searched.
        resource: String,
        /// The search expression that matched more than once.
        query: String,
    },

    /// The desired state is malformed or violates an entity rule.
    #[error("{0}")]
    Validation(String),

    /// The API layer failed: transport, HTTP status or task errors.
    #[error(transparent)]
    Api(#[from] apikit::Error),
}

impl Error {
    /// Missing entity error for `resource` matching `query`.
    pub fn lookup(resource: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Lookup {
            resource: resource.into(),
            query: query.into(),
        }
    }

    /// Ambiguous search error for `resource` matching `query`.
    pub fn ambiguous(resource: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Ambiguous {
            resource: resource.into(),
            query: query.into(),
        }
    }

    /// Desired-state validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
