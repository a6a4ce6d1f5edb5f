//! Core types for Vellum
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: tagged variant for all field data, with query comparison rules
//! - Document: id + ordered field map, the unit of storage
//! - FieldPath: dotted path into nested documents
//! - Revision: database-wide commit counter
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod path;
pub mod revision;
pub mod value;

pub use document::{validate_id, Document, MAX_ID_LENGTH};
pub use error::{Error, ErrorKind, Result};
pub use path::{FieldPath, MAX_PATH_DEPTH};
pub use revision::Revision;
pub use value::{Value, ValueKind};
