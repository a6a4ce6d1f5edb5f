//! Revision tokens
//!
//! A revision is the database-wide commit counter at the moment a document
//! was written. Every commit (a single save/delete or a whole batch)
//! allocates exactly one revision, so revisions are strictly increasing
//! across the lifetime of a database, including across restarts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing commit counter
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Revision(u64);

impl Revision {
    /// Revision of an empty database; no document ever carries it
    pub const ZERO: Revision = Revision(0);

    /// Wrap a raw counter value
    pub const fn new(value: u64) -> Self {
        Revision(value)
    }

    /// Raw counter value
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The revision following this one
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Revision(value)
    }
}
