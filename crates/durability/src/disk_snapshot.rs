//! Crash-safe snapshot files
//!
//! Snapshot creation follows the write-fsync-rename pattern:
//! 1. Write to temporary file (`.snap-NNNNNN.tmp`)
//! 2. fsync the temporary file
//! 3. Rename to the final path (`snap-NNNNNN.chk`)
//! 4. fsync the parent directory
//!
//! Either the complete snapshot exists or it does not; a crash can only
//! leave a temporary file behind, which recovery removes.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::format::snapshot::{
    parse_snapshot_id, snapshot_path, snapshot_temp_path, SnapshotHeader,
    SNAPSHOT_FORMAT_VERSION, SNAPSHOT_HEADER_SIZE, SNAPSHOT_MAGIC,
};
use crate::format::wal_record::{compute_crc, now_micros};
use crate::format::writeset::{Writeset, WritesetError};
use crate::paths::sync_dir;

/// Information about a written snapshot
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Snapshot sequence number
    pub snapshot_id: u64,
    /// Highest revision contained
    pub watermark: u64,
    /// Final file path
    pub path: PathBuf,
    /// Total file size in bytes
    pub size: u64,
}

/// A snapshot read back from disk
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    /// Parsed header
    pub header: SnapshotHeader,
    /// Full database state at `header.watermark`
    pub writeset: Writeset,
}

impl LoadedSnapshot {
    /// Highest revision contained
    pub fn watermark(&self) -> u64 {
        self.header.watermark
    }
}

/// Write a snapshot of `writeset` taken at `watermark`.
///
/// Older snapshot files are removed once the new one is durable.
pub fn write_snapshot(
    dir: &Path,
    snapshot_id: u64,
    watermark: u64,
    writeset: &Writeset,
) -> io::Result<SnapshotInfo> {
    std::fs::create_dir_all(dir)?;
    let final_path = snapshot_path(dir, snapshot_id);
    let temp_path = snapshot_temp_path(dir, snapshot_id);

    let header = SnapshotHeader::new(snapshot_id, watermark, now_micros());
    let mut contents = header.to_bytes().to_vec();
    let body = writeset
        .to_bytes()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    contents.extend_from_slice(&body);
    let crc = compute_crc(&contents);
    contents.extend_from_slice(&crc.to_le_bytes());

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&temp_path)?;
    file.write_all(&contents)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, &final_path)?;
    sync_dir(dir)?;

    for (id, path) in list_snapshots(dir)? {
        if id < snapshot_id {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(target: "vellum::snapshot", path = %path.display(), error = %e, "Failed to remove superseded snapshot");
            }
        }
    }

    debug!(target: "vellum::snapshot", snapshot_id, watermark, mutations = writeset.len(), "Snapshot written");

    Ok(SnapshotInfo {
        snapshot_id,
        watermark,
        path: final_path,
        size: contents.len() as u64,
    })
}

/// Load and validate one snapshot file.
pub fn read_snapshot(path: &Path) -> Result<LoadedSnapshot, SnapshotReadError> {
    let data = std::fs::read(path)?;
    if data.len() < SNAPSHOT_HEADER_SIZE + 4 {
        return Err(SnapshotReadError::FileTooSmall { size: data.len() });
    }

    let mut header_bytes = [0u8; SNAPSHOT_HEADER_SIZE];
    header_bytes.copy_from_slice(&data[..SNAPSHOT_HEADER_SIZE]);
    let header = SnapshotHeader::from_bytes(&header_bytes);

    if header.magic != SNAPSHOT_MAGIC {
        return Err(SnapshotReadError::InvalidMagic {
            actual: header.magic,
        });
    }
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotReadError::UnsupportedVersion(header.format_version));
    }

    let crc_offset = data.len() - 4;
    let stored = LittleEndian::read_u32(&data[crc_offset..]);
    let computed = compute_crc(&data[..crc_offset]);
    if stored != computed {
        return Err(SnapshotReadError::CrcMismatch { stored, computed });
    }

    let writeset = Writeset::from_bytes(&data[SNAPSHOT_HEADER_SIZE..crc_offset])?;
    Ok(LoadedSnapshot { header, writeset })
}

/// Load the newest snapshot in `dir`, if any.
pub fn read_latest_snapshot(dir: &Path) -> Result<Option<LoadedSnapshot>, SnapshotReadError> {
    match list_snapshots(dir)?.pop() {
        Some((_, path)) => read_snapshot(&path).map(Some),
        None => Ok(None),
    }
}

/// Snapshot files in `dir`, sorted by id.
pub fn list_snapshots(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut snapshots = Vec::new();
    if !dir.exists() {
        return Ok(snapshots);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(id) = name.to_str().and_then(parse_snapshot_id) {
            snapshots.push((id, entry.path()));
        }
    }
    snapshots.sort_by_key(|(id, _)| *id);
    Ok(snapshots)
}

/// Remove temporary files left by a crash mid-snapshot.
pub fn cleanup_temp_files(dir: &Path) -> io::Result<usize> {
    let mut count = 0;
    if !dir.exists() {
        return Ok(0);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(".snap-") && name.ends_with(".tmp") {
            std::fs::remove_file(entry.path())?;
            count += 1;
        }
    }
    Ok(count)
}

/// Errors reading a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotReadError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File is too small to be a snapshot
    #[error("Snapshot file too small: {size} bytes")]
    FileTooSmall {
        /// Actual size
        size: usize,
    },

    /// Not a snapshot file
    #[error("Invalid snapshot magic bytes: {actual:?}")]
    InvalidMagic {
        /// Magic bytes found
        actual: [u8; 4],
    },

    /// Written by an incompatible version
    #[error("Unsupported snapshot format version: {0}")]
    UnsupportedVersion(u32),

    /// Footer checksum does not match
    #[error("CRC mismatch: stored={stored:#010x}, computed={computed:#010x}")]
    CrcMismatch {
        /// Stored CRC
        stored: u32,
        /// Computed CRC
        computed: u32,
    },

    /// Body failed to decode
    #[error("Invalid snapshot body: {0}")]
    Writeset(#[from] WritesetError),
}
