//! On-disk formats: WAL segments and records, commit writesets, snapshots.

pub mod snapshot;
pub mod wal_record;
pub mod writeset;

pub use snapshot::{
    parse_snapshot_id, snapshot_path, SnapshotHeader, SNAPSHOT_FORMAT_VERSION,
    SNAPSHOT_HEADER_SIZE, SNAPSHOT_MAGIC,
};
pub use wal_record::{
    SegmentHeader, WalRecord, WalRecordError, WalSegment, MAX_WRITESET_SIZE, SEGMENT_FORMAT_VERSION,
    SEGMENT_HEADER_SIZE, SEGMENT_MAGIC, WAL_RECORD_FORMAT_VERSION,
};
pub use writeset::{Mutation, Writeset, WritesetError};
