//! Commit writeset serialization format.
//!
//! A writeset holds every mutation of one commit. The same encoding is used
//! for WAL record payloads and for the body of a compaction snapshot (where
//! it is simply one `Put` per live document plus one `DefineIndex` per
//! index).
//!
//! # Format
//!
//! ```text
//! Writeset:  Count (4) | Mutation*
//!
//! Mutation:
//!   0x01 Put          | id | revision (8) | body_len (4) | body
//!   0x02 Delete       | id
//!   0x03 DefineIndex  | path
//!   0x04 DropIndex    | path
//!
//! Strings are length-prefixed (4 bytes) UTF-8.
//! ```
//!
//! Every length prefix is a `u32`; encoding fails with
//! [`WritesetError::TooLarge`] rather than wrapping.
//!
//! All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};

const MUTATION_PUT: u8 = 0x01;
const MUTATION_DELETE: u8 = 0x02;
const MUTATION_DEFINE_INDEX: u8 = 0x03;
const MUTATION_DROP_INDEX: u8 = 0x04;

/// A single change to database state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create or fully replace a document
    Put {
        /// Document id
        id: String,
        /// Revision the document was written at
        revision: u64,
        /// Encoded field map
        body: Vec<u8>,
    },

    /// Remove a document
    Delete {
        /// Document id
        id: String,
    },

    /// Create a secondary index on a field path
    DefineIndex {
        /// Dotted field path
        path: String,
    },

    /// Drop a secondary index
    DropIndex {
        /// Dotted field path
        path: String,
    },
}

/// Ordered mutations of one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Writeset {
    mutations: Vec<Mutation>,
}

impl Writeset {
    /// Empty writeset
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty writeset with room for `capacity` mutations
    pub fn with_capacity(capacity: usize) -> Self {
        Writeset {
            mutations: Vec::with_capacity(capacity),
        }
    }

    /// Record a document write
    pub fn put(&mut self, id: impl Into<String>, revision: u64, body: Vec<u8>) {
        self.mutations.push(Mutation::Put {
            id: id.into(),
            revision,
            body,
        });
    }

    /// Record a document removal
    pub fn delete(&mut self, id: impl Into<String>) {
        self.mutations.push(Mutation::Delete { id: id.into() });
    }

    /// Record an index definition
    pub fn define_index(&mut self, path: impl Into<String>) {
        self.mutations
            .push(Mutation::DefineIndex { path: path.into() });
    }

    /// Record an index drop
    pub fn drop_index(&mut self, path: impl Into<String>) {
        self.mutations.push(Mutation::DropIndex { path: path.into() });
    }

    /// Append an already-built mutation
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Mutations in commit order
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Consume into mutations
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    /// Whether there are no mutations
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Number of mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, WritesetError> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), WritesetError> {
        out.write_u32::<LittleEndian>(length_prefix(self.mutations.len())?)?;
        for mutation in &self.mutations {
            match mutation {
                Mutation::Put { id, revision, body } => {
                    out.write_u8(MUTATION_PUT)?;
                    write_string(out, id)?;
                    out.write_u64::<LittleEndian>(*revision)?;
                    out.write_u32::<LittleEndian>(length_prefix(body.len())?)?;
                    out.extend_from_slice(body);
                }
                Mutation::Delete { id } => {
                    out.write_u8(MUTATION_DELETE)?;
                    write_string(out, id)?;
                }
                Mutation::DefineIndex { path } => {
                    out.write_u8(MUTATION_DEFINE_INDEX)?;
                    write_string(out, path)?;
                }
                Mutation::DropIndex { path } => {
                    out.write_u8(MUTATION_DROP_INDEX)?;
                    write_string(out, path)?;
                }
            }
        }
        Ok(())
    }

    /// Deserialize from bytes. Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WritesetError> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.read_u32::<LittleEndian>()? as usize;

        // Every mutation is at least a tag plus a string length.
        if count > bytes.len() / 5 {
            return Err(WritesetError::InsufficientData);
        }

        let mut mutations = Vec::with_capacity(count);
        for _ in 0..count {
            mutations.push(read_mutation(&mut cursor)?);
        }

        if (cursor.position() as usize) != bytes.len() {
            return Err(WritesetError::TrailingBytes(
                bytes.len() - cursor.position() as usize,
            ));
        }
        Ok(Writeset { mutations })
    }
}

fn read_mutation(cursor: &mut Cursor<&[u8]>) -> Result<Mutation, WritesetError> {
    let tag = cursor.read_u8()?;
    match tag {
        MUTATION_PUT => {
            let id = read_string(cursor)?;
            let revision = cursor.read_u64::<LittleEndian>()?;
            let body = read_bytes(cursor)?;
            Ok(Mutation::Put { id, revision, body })
        }
        MUTATION_DELETE => Ok(Mutation::Delete {
            id: read_string(cursor)?,
        }),
        MUTATION_DEFINE_INDEX => Ok(Mutation::DefineIndex {
            path: read_string(cursor)?,
        }),
        MUTATION_DROP_INDEX => Ok(Mutation::DropIndex {
            path: read_string(cursor)?,
        }),
        other => Err(WritesetError::InvalidMutationTag(other)),
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<(), WritesetError> {
    out.write_u32::<LittleEndian>(length_prefix(s.len())?)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// `len` as a 4-byte length prefix
pub(crate) fn length_prefix(len: usize) -> Result<u32, WritesetError> {
    u32::try_from(len).map_err(|_| WritesetError::TooLarge { len })
}

fn read_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, WritesetError> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(WritesetError::InsufficientData);
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, WritesetError> {
    String::from_utf8(read_bytes(cursor)?).map_err(|_| WritesetError::InvalidString)
}

/// Writeset decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WritesetError {
    /// Not enough data
    #[error("Insufficient data to parse writeset")]
    InsufficientData,

    /// Unknown mutation tag
    #[error("Invalid mutation tag: {0:#04x}")]
    InvalidMutationTag(u8),

    /// Non UTF-8 string
    #[error("Invalid UTF-8 string in writeset")]
    InvalidString,

    /// Bytes left over after the last mutation
    #[error("{0} trailing bytes after writeset")]
    TrailingBytes(usize),

    /// A length does not fit its 4-byte prefix
    #[error("{len} bytes exceed the 4 GiB length limit")]
    TooLarge {
        /// Offending length
        len: usize,
    },
}

impl From<io::Error> for WritesetError {
    fn from(_: io::Error) -> Self {
        // Reads and writes only touch memory; the only failure is EOF.
        WritesetError::InsufficientData
    }
}
