//! Error types for Vellum
//!
//! This module defines the single error type surfaced by every public
//! operation. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Every failure leaves the database in the state it was in immediately
//! before the failing call. The engine never retries internally.

use std::io;
use thiserror::Error;

/// Result type alias for Vellum operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Vellum database
#[derive(Debug, Error)]
pub enum Error {
    /// Durable storage failure (file operations, fsync, rename)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another handle already holds exclusive access to the database
    #[error("database '{name}' is already open by another handle")]
    Locked {
        /// Database name
        name: String,
    },

    /// Operation on a handle that has been closed
    #[error("database '{name}' is closed")]
    Closed {
        /// Database name
        name: String,
    },

    /// No document with this id exists
    #[error("document not found: {id}")]
    NotFound {
        /// Document id
        id: String,
    },

    /// Comparison between incompatible value kinds
    #[error("type mismatch: cannot compare {left} with {right}")]
    TypeMismatch {
        /// Kind of the left-hand value
        left: &'static str,
        /// Kind of the right-hand value
        right: &'static str,
    },

    /// Malformed projection or predicate, detected before execution
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Batch failed during staging; nothing was applied
    #[error("batch aborted: {reason}")]
    Aborted {
        /// Human readable summary
        reason: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Invalid argument (document id, database name, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Discriminant of [`Error`] for callers that only need the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Io`]
    Io,
    /// See [`Error::Locked`]
    Locked,
    /// See [`Error::Closed`]
    Closed,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::TypeMismatch`]
    TypeMismatch,
    /// See [`Error::InvalidQuery`]
    InvalidQuery,
    /// See [`Error::Aborted`]
    Aborted,
    /// See [`Error::InvalidInput`]
    InvalidInput,
    /// See [`Error::Serialization`]
    Serialization,
    /// See [`Error::Corruption`]
    Corruption,
    /// See [`Error::Config`]
    Config,
}

impl Error {
    /// Create a not-found error for a document id
    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound { id: id.into() }
    }

    /// Create an invalid-query error
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Error::InvalidQuery(msg.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Wrap a staging failure into a batch abort
    pub fn aborted(source: Error) -> Self {
        Error::Aborted {
            reason: source.to_string(),
            source: Box::new(source),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Locked { .. } => ErrorKind::Locked,
            Error::Closed { .. } => ErrorKind::Closed,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Error::Aborted { .. } => ErrorKind::Aborted,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Corruption(_) => ErrorKind::Corruption,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// True for [`Error::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for [`Error::Closed`]
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. })
    }

    /// True for [`Error::Aborted`]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
