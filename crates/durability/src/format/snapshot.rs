//! Snapshot file format.
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Header (32 bytes)                  │
//! │   magic "VLSN" (4)                 │
//! │   format_version (4)               │
//! │   snapshot_id (8)                  │
//! │   watermark (8)                    │
//! │   created_at (8)                   │
//! ├────────────────────────────────────┤
//! │ Writeset (variable)                │
//! ├────────────────────────────────────┤
//! │ CRC32 of header + writeset (4)     │
//! └────────────────────────────────────┘
//! ```
//!
//! Every revision `<= watermark` is reflected in the snapshot, so recovery
//! only replays WAL records above it.

use byteorder::{ByteOrder, LittleEndian};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a snapshot file: "VLSN"
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"VLSN";

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Size of snapshot header in bytes
pub const SNAPSHOT_HEADER_SIZE: usize = 32;

/// Snapshot header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic bytes
    pub magic: [u8; 4],
    /// Format version
    pub format_version: u32,
    /// Snapshot sequence number
    pub snapshot_id: u64,
    /// Highest revision contained in the snapshot
    pub watermark: u64,
    /// Creation time (microseconds since epoch)
    pub created_at: u64,
}

impl SnapshotHeader {
    /// Create a header for a new snapshot
    pub fn new(snapshot_id: u64, watermark: u64, created_at: u64) -> Self {
        SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot_id,
            watermark,
            created_at,
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> [u8; SNAPSHOT_HEADER_SIZE] {
        let mut bytes = [0u8; SNAPSHOT_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        LittleEndian::write_u32(&mut bytes[4..8], self.format_version);
        LittleEndian::write_u64(&mut bytes[8..16], self.snapshot_id);
        LittleEndian::write_u64(&mut bytes[16..24], self.watermark);
        LittleEndian::write_u64(&mut bytes[24..32], self.created_at);
        bytes
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8; SNAPSHOT_HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        SnapshotHeader {
            magic,
            format_version: LittleEndian::read_u32(&bytes[4..8]),
            snapshot_id: LittleEndian::read_u64(&bytes[8..16]),
            watermark: LittleEndian::read_u64(&bytes[16..24]),
            created_at: LittleEndian::read_u64(&bytes[24..32]),
        }
    }
}

/// Final path of snapshot `snapshot_id`: `snap-NNNNNN.chk`
pub fn snapshot_path(dir: &Path, snapshot_id: u64) -> PathBuf {
    dir.join(format!("snap-{:06}.chk", snapshot_id))
}

/// Temporary path used while snapshot `snapshot_id` is being written
pub fn snapshot_temp_path(dir: &Path, snapshot_id: u64) -> PathBuf {
    dir.join(format!(".snap-{:06}.tmp", snapshot_id))
}

/// Parse a snapshot id from a file name like `snap-000003.chk`
pub fn parse_snapshot_id(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("snap-")?
        .strip_suffix(".chk")?
        .parse()
        .ok()
}
