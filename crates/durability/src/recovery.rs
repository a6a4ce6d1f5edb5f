//! Recovery coordinator
//!
//! Recovery algorithm:
//! 1. Remove temporary files left by an interrupted snapshot
//! 2. If a snapshot exists: load it, then replay WAL records above its watermark
//! 3. If no snapshot: replay the whole WAL
//! 4. Truncate a torn record at the WAL tail
//!
//! Recovery is deterministic and idempotent: running it twice over the same
//! directory yields the same state, and the second run truncates nothing.

use crate::disk_snapshot::{cleanup_temp_files, read_latest_snapshot, LoadedSnapshot, SnapshotReadError};
use crate::format::{WalRecord, WalSegment, Writeset, WritesetError};
use crate::paths::{sync_dir, DatabasePaths};
use crate::wal::{WalReader, WalReaderError};
use tracing::{info, warn};

/// Rebuilds database state from a snapshot plus the WAL.
pub struct RecoveryCoordinator {
    paths: DatabasePaths,
}

impl RecoveryCoordinator {
    /// Coordinator over an existing database directory
    pub fn new(paths: DatabasePaths) -> Self {
        RecoveryCoordinator { paths }
    }

    /// Run recovery.
    ///
    /// `on_snapshot` receives the latest snapshot, if any, before any
    /// record. `on_record` then receives each WAL record with revision
    /// above the snapshot watermark, in log order, with its writeset
    /// decoded.
    pub fn recover<S, R>(
        &self,
        mut on_snapshot: S,
        mut on_record: R,
    ) -> Result<RecoveryResult, RecoveryError>
    where
        S: FnMut(LoadedSnapshot) -> Result<(), RecoveryError>,
        R: FnMut(&WalRecord, Writeset) -> Result<(), RecoveryError>,
    {
        let snapshot_dir = self.paths.snapshot_dir();
        let removed = cleanup_temp_files(&snapshot_dir)?;
        if removed > 0 {
            warn!(target: "vellum::recovery", removed, "Removed incomplete snapshot files");
        }

        let mut result = RecoveryResult::default();

        if let Some(snapshot) = read_latest_snapshot(&snapshot_dir)? {
            result.snapshot_id = Some(snapshot.header.snapshot_id);
            result.snapshot_watermark = snapshot.watermark();
            result.last_revision = snapshot.watermark();
            on_snapshot(snapshot)?;
        }

        let wal_dir = self.paths.wal_dir();
        let read = WalReader::new().read_all(&wal_dir)?;
        result.records_skipped_corrupted = read.skipped_corrupted;

        for record in &read.records {
            if record.revision <= result.snapshot_watermark {
                continue;
            }
            let writeset = Writeset::from_bytes(&record.writeset).map_err(|source| {
                RecoveryError::Writeset {
                    revision: record.revision,
                    source,
                }
            })?;
            on_record(record, writeset)?;
            result.records_replayed += 1;
            result.last_revision = result.last_revision.max(record.revision);
        }

        if let Some(truncate) = read.truncate_info {
            let path = WalSegment::segment_path(&wal_dir, truncate.segment_number);
            let file = std::fs::OpenOptions::new().write(true).open(&path)?;
            file.set_len(truncate.valid_end)?;
            file.sync_all()?;
            result.bytes_truncated = truncate.bytes_to_truncate();
            warn!(
                target: "vellum::recovery",
                segment = truncate.segment_number,
                bytes = result.bytes_truncated,
                "Truncated torn WAL tail"
            );
        }

        if let Some(segment) = read.incomplete_segment {
            std::fs::remove_file(WalSegment::segment_path(&wal_dir, segment))?;
            sync_dir(&wal_dir)?;
            warn!(target: "vellum::recovery", segment, "Removed WAL segment with incomplete header");
        }

        info!(
            target: "vellum::recovery",
            snapshot = ?result.snapshot_id,
            watermark = result.snapshot_watermark,
            replayed = result.records_replayed,
            skipped = result.records_skipped_corrupted,
            last_revision = result.last_revision,
            "Recovery complete"
        );

        Ok(result)
    }
}

/// Outcome of recovery
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Snapshot that was loaded
    pub snapshot_id: Option<u64>,
    /// Watermark of that snapshot, 0 without one
    pub snapshot_watermark: u64,
    /// WAL records applied
    pub records_replayed: usize,
    /// WAL records dropped for checksum mismatches
    pub records_skipped_corrupted: usize,
    /// Bytes cut from the WAL tail
    pub bytes_truncated: u64,
    /// Highest revision present after recovery
    pub last_revision: u64,
}

/// Recovery errors
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// Snapshot could not be read
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotReadError),

    /// WAL could not be read
    #[error("WAL reader error: {0}")]
    WalReader(#[from] WalReaderError),

    /// Checksummed record with an undecodable writeset
    #[error("Invalid writeset in record at revision {revision}: {source}")]
    Writeset {
        /// Revision of the offending record
        revision: u64,
        /// Decode failure
        #[source]
        source: WritesetError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Applying recovered state failed
    #[error("Apply error: {0}")]
    Apply(String),
}

impl RecoveryError {
    /// Create an apply error
    pub fn apply(msg: impl Into<String>) -> Self {
        RecoveryError::Apply(msg.into())
    }
}
