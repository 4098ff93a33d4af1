use thiserror::Error;

/// Failures of the listing store. Any of these aborts the current run.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Opening the database or creating its schema failed.
    #[error("failed to open listing store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A read or write for a single listing failed.
    #[error("store {operation} failed for listing {id}: {source}")]
    Listing {
        operation: &'static str,
        id: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement not tied to one listing failed.
    #[error("store {operation} failed: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub fn operation(&self) -> &'static str {
        match self {
            StoreError::Open { .. } => "open",
            StoreError::Listing { operation, .. } | StoreError::Query { operation, .. } => {
                *operation
            }
        }
    }

    pub fn listing_id(&self) -> Option<&str> {
        match self {
            StoreError::Listing { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }
}

/// A fragment whose content could not be turned into a listing.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot resolve listing link {href:?}: {source}")]
    UnresolvableUrl {
        href: String,
        #[source]
        source: url::ParseError,
    },
}
