//! Durability layer for Vellum
//!
//! Everything that touches disk lives here:
//! - `paths`: database directory layout
//! - `format`: WAL segment/record framing, commit writesets, snapshot header
//! - `wal`: segmented write-ahead log writer and reader
//! - `disk_snapshot`: crash-safe compaction snapshots
//! - `recovery`: snapshot + WAL replay on open
//!
//! The durability layer knows nothing about documents or queries: document
//! bodies are opaque bytes and revisions are plain `u64`s.

#![warn(missing_docs)]

pub mod disk_snapshot;
pub mod format;
pub mod paths;
pub mod recovery;
pub mod wal;

pub use disk_snapshot::{
    read_latest_snapshot, write_snapshot, LoadedSnapshot, SnapshotInfo, SnapshotReadError,
};
pub use format::{Mutation, WalRecord, Writeset, WritesetError};
pub use paths::{sync_dir, DatabasePaths, DATABASE_DIR_SUFFIX};
pub use recovery::{RecoveryCoordinator, RecoveryError, RecoveryResult};
pub use wal::{DurabilityMode, WalConfig, WalConfigError, WalCounters, WalReader, WalWriter};
