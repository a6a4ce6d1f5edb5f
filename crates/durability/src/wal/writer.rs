//! WAL writer with durability mode support.

use super::config::WalConfig;
use super::mode::DurabilityMode;
use super::reader::WalReader;
use crate::format::{WalRecord, WalSegment};
use crate::paths::sync_dir;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Cumulative WAL operation counters.
///
/// Accumulated over the lifetime of a writer and never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalCounters {
    /// Records appended
    pub wal_appends: u64,
    /// fsync calls
    pub sync_calls: u64,
    /// Bytes appended
    pub bytes_written: u64,
    /// Nanoseconds spent in fsync
    pub sync_nanos: u64,
}

/// Appends commit records to the active segment.
///
/// In [`DurabilityMode::Always`] every append is fsynced before it
/// returns. When appending would grow the active segment past
/// `segment_size`, the segment is closed and a new one started.
///
/// A failed append is cut back off the segment. If that cut fails too the
/// writer is poisoned: the log tail is unknown, so every later append and
/// flush fails until the database is reopened and recovered.
pub struct WalWriter {
    segment: WalSegment,
    durability: DurabilityMode,
    wal_dir: PathBuf,
    config: WalConfig,
    /// Bytes held by segments other than the active one
    closed_bytes: u64,
    /// Highest revision appended so far
    last_revision: u64,
    has_unsynced_data: bool,
    poisoned: bool,
    counters: WalCounters,
}

impl WalWriter {
    /// Open the writer on `wal_dir`.
    ///
    /// Appends continue in the newest existing segment; an empty directory
    /// gets segment 1. `last_revision` is the highest revision already
    /// durable (from recovery) and is stamped into new segment headers.
    pub fn open(
        wal_dir: impl AsRef<Path>,
        durability: DurabilityMode,
        config: WalConfig,
        last_revision: u64,
    ) -> io::Result<Self> {
        let wal_dir = wal_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&wal_dir)?;

        let segments = WalReader::new()
            .list_segments(&wal_dir)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        let segment = match segments.last() {
            Some(&num) => match WalSegment::open_append(&wal_dir, num) {
                Ok(seg) => seg,
                Err(e) => {
                    warn!(target: "vellum::wal", segment = num, error = %e, "Cannot append to last segment, starting a new one");
                    Self::create_segment(&wal_dir, num + 1, last_revision)?
                }
            },
            None => Self::create_segment(&wal_dir, 1, last_revision)?,
        };

        let mut closed_bytes = 0;
        for num in segments {
            if num != segment.segment_number() {
                closed_bytes += std::fs::metadata(WalSegment::segment_path(&wal_dir, num))
                    .map(|m| m.len())
                    .unwrap_or(0);
            }
        }

        Ok(WalWriter {
            segment,
            durability,
            wal_dir,
            config,
            closed_bytes,
            last_revision,
            has_unsynced_data: false,
            poisoned: false,
            counters: WalCounters::default(),
        })
    }

    fn create_segment(wal_dir: &Path, number: u64, base_revision: u64) -> io::Result<WalSegment> {
        let mut segment = WalSegment::create(wal_dir, number, base_revision)?;
        if let Err(e) = segment.sync().and_then(|_| sync_dir(wal_dir)) {
            let path = segment.path().to_path_buf();
            drop(segment);
            let _ = std::fs::remove_file(path);
            return Err(e);
        }
        debug!(target: "vellum::wal", segment = number, base_revision, "Created WAL segment");
        Ok(segment)
    }

    /// Append a record.
    ///
    /// On error nothing of the record remains in the log, or the writer is
    /// poisoned (see [`WalWriter`]).
    pub fn append(&mut self, record: &WalRecord) -> io::Result<()> {
        self.check_poisoned()?;
        let bytes = record
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        if self.segment.size() + bytes.len() as u64 > self.config.segment_size
            && self.segment.size() > crate::format::SEGMENT_HEADER_SIZE as u64
        {
            self.rotate()?;
        }

        let start = self.segment.size();
        let written = self.segment.write(&bytes).and_then(|_| {
            if self.durability.syncs_every_commit() {
                self.sync_segment()
            } else {
                self.has_unsynced_data = true;
                Ok(())
            }
        });
        if let Err(e) = written {
            // An unsynced record must not be acknowledged later by
            // someone else's fsync.
            self.roll_back(start);
            return Err(e);
        }

        self.counters.wal_appends += 1;
        self.counters.bytes_written += bytes.len() as u64;
        self.last_revision = self.last_revision.max(record.revision);
        Ok(())
    }

    /// Cut the active segment back to `position` after a failed append.
    fn roll_back(&mut self, position: u64) {
        if let Err(e) = self.segment.truncate(position) {
            self.poisoned = true;
            error!(
                target: "vellum::wal",
                segment = self.segment.segment_number(),
                position,
                error = %e,
                "Could not roll back a failed append; refusing further writes"
            );
        }
    }

    fn check_poisoned(&self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "WAL tail is unknown after a failed rollback; reopen the database",
            ));
        }
        Ok(())
    }

    /// Whether a failed rollback has stopped this writer
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn sync_segment(&mut self) -> io::Result<()> {
        let start = Instant::now();
        self.segment.sync()?;
        self.counters.sync_calls += 1;
        self.counters.sync_nanos += start.elapsed().as_nanos() as u64;
        self.has_unsynced_data = false;
        Ok(())
    }

    /// Close the active segment and start a new one.
    ///
    /// Returns the new segment number. Every record appended before this
    /// call lives in a lower-numbered segment. If the new segment cannot
    /// be created the active one stays open and nothing changes.
    pub fn rotate(&mut self) -> io::Result<u64> {
        self.check_poisoned()?;
        self.sync_segment()?;

        let next = self.segment.segment_number() + 1;
        let fresh = Self::create_segment(&self.wal_dir, next, self.last_revision)?;
        let mut old = std::mem::replace(&mut self.segment, fresh);
        self.closed_bytes += old.size();
        if let Err(e) = old.close() {
            // Its records were synced above.
            warn!(target: "vellum::wal", segment = old.segment_number(), error = %e, "Failed to close rotated segment");
        }
        Ok(next)
    }

    /// Delete segments numbered below `segment_number`.
    ///
    /// Used after a snapshot covers their contents. Returns how many were
    /// removed.
    pub fn remove_segments_before(&mut self, segment_number: u64) -> io::Result<usize> {
        let segments = WalReader::new()
            .list_segments(&self.wal_dir)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        let mut removed = 0;
        for num in segments
            .into_iter()
            .filter(|&n| n < segment_number && n != self.segment.segment_number())
        {
            let path = WalSegment::segment_path(&self.wal_dir, num);
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            std::fs::remove_file(&path)?;
            self.closed_bytes = self.closed_bytes.saturating_sub(size);
            removed += 1;
        }
        if removed > 0 {
            sync_dir(&self.wal_dir)?;
            debug!(target: "vellum::wal", removed, before = segment_number, "Removed covered WAL segments");
        }
        Ok(removed)
    }

    /// fsync any appended but unsynced data.
    pub fn flush(&mut self) -> io::Result<()> {
        self.check_poisoned()?;
        if self.has_unsynced_data {
            self.sync_segment()?;
        }
        Ok(())
    }

    /// Durability mode in effect.
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    /// Active segment number.
    pub fn current_segment(&self) -> u64 {
        self.segment.segment_number()
    }

    /// Total bytes across all segments.
    pub fn total_size(&self) -> u64 {
        self.closed_bytes + self.segment.size()
    }

    /// Highest revision appended or recovered.
    pub fn last_revision(&self) -> u64 {
        self.last_revision
    }

    /// Cumulative counters.
    pub fn counters(&self) -> WalCounters {
        self.counters
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(target: "vellum::wal", error = %e, "Failed to flush WAL on drop");
        }
    }
}
