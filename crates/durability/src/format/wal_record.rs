//! WAL segment file and record format.
//!
//! WAL segments are named `wal-NNNNNN.seg` where `NNNNNN` is a zero-padded segment number.
//!
//! # Segment Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Segment Header (32 bytes)          │
//! ├────────────────────────────────────┤
//! │ Record 1                           │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! # Record Layout
//!
//! ```text
//! ┌─────────────────┬──────────────────┬──────────────────────────┬──────────┐
//! │ Length (4 bytes)│ Format Ver (1)   │ Payload (variable)       │ CRC32 (4)│
//! └─────────────────┴──────────────────┴──────────────────────────┴──────────┘
//!
//! Payload:
//! ┌──────────────┬──────────────┬─────────────────────────────┐
//! │ Revision (8) │ Timestamp (8)│ Writeset (variable)         │
//! └──────────────┴──────────────┴─────────────────────────────┘
//! ```
//!
//! One record holds one commit: a single save or delete, or a whole batch.
//! A record is either entirely readable with a valid checksum or it is
//! discarded on recovery, which is what makes a batch all-or-nothing.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a WAL segment file: "VLWL"
pub const SEGMENT_MAGIC: [u8; 4] = *b"VLWL";

/// Current segment format version
pub const SEGMENT_FORMAT_VERSION: u32 = 1;

/// Size of segment header in bytes
pub const SEGMENT_HEADER_SIZE: usize = 32;

/// Current WAL record format version
pub const WAL_RECORD_FORMAT_VERSION: u8 = 1;

/// Format version + revision + timestamp
const MIN_PAYLOAD_SIZE: usize = 1 + 8 + 8;

/// Largest encoded writeset one record can carry
pub const MAX_WRITESET_SIZE: usize = u32::MAX as usize - MIN_PAYLOAD_SIZE - 4;

/// WAL segment header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Magic bytes: "VLWL"
    pub magic: [u8; 4],

    /// Format version for forward compatibility
    pub format_version: u32,

    /// Segment number (monotonically increasing)
    pub segment_number: u64,

    /// Highest revision committed before this segment was created
    pub base_revision: u64,

    /// Creation time (microseconds since epoch)
    pub created_at: u64,
}

impl SegmentHeader {
    /// Create a new segment header.
    pub fn new(segment_number: u64, base_revision: u64) -> Self {
        SegmentHeader {
            magic: SEGMENT_MAGIC,
            format_version: SEGMENT_FORMAT_VERSION,
            segment_number,
            base_revision,
            created_at: now_micros(),
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut bytes = [0u8; SEGMENT_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        LittleEndian::write_u32(&mut bytes[4..8], self.format_version);
        LittleEndian::write_u64(&mut bytes[8..16], self.segment_number);
        LittleEndian::write_u64(&mut bytes[16..24], self.base_revision);
        LittleEndian::write_u64(&mut bytes[24..32], self.created_at);
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8; SEGMENT_HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        SegmentHeader {
            magic,
            format_version: LittleEndian::read_u32(&bytes[4..8]),
            segment_number: LittleEndian::read_u64(&bytes[8..16]),
            base_revision: LittleEndian::read_u64(&bytes[16..24]),
            created_at: LittleEndian::read_u64(&bytes[24..32]),
        }
    }

    /// Validate magic bytes and format version.
    pub fn is_valid(&self) -> bool {
        self.magic == SEGMENT_MAGIC && self.format_version == SEGMENT_FORMAT_VERSION
    }
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_header(file: &mut File, segment_number: u64) -> io::Result<SegmentHeader> {
    let mut header_bytes = [0u8; SEGMENT_HEADER_SIZE];
    file.read_exact(&mut header_bytes)?;
    let header = SegmentHeader::from_bytes(&header_bytes);

    if !header.is_valid() {
        return Err(invalid_data("Invalid segment magic bytes or version"));
    }
    if header.segment_number != segment_number {
        return Err(invalid_data(format!(
            "Segment number mismatch: expected {}, got {}",
            segment_number, header.segment_number
        )));
    }
    Ok(header)
}

/// WAL segment file handle.
///
/// Only the active segment is writable; closed segments are immutable.
pub struct WalSegment {
    file: File,
    header: SegmentHeader,
    write_position: u64,
    path: PathBuf,
    closed: bool,
}

impl WalSegment {
    /// Create a new segment file and write its header.
    pub fn create(dir: &Path, segment_number: u64, base_revision: u64) -> io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(&path)?;

        let header = SegmentHeader::new(segment_number, base_revision);
        if let Err(e) = file.write_all(&header.to_bytes()) {
            drop(file);
            // Recovery drops a header-less last segment if this fails too.
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }

        Ok(WalSegment {
            file,
            header,
            write_position: SEGMENT_HEADER_SIZE as u64,
            path,
            closed: false,
        })
    }

    /// Open an existing segment for reading.
    pub fn open_read(dir: &Path, segment_number: u64) -> io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);
        let mut file = OpenOptions::new().read(true).open(&path)?;
        let header = read_header(&mut file, segment_number)?;
        let write_position = file.seek(SeekFrom::End(0))?;

        Ok(WalSegment {
            file,
            header,
            write_position,
            path,
            closed: true,
        })
    }

    /// Open an existing segment for appending.
    pub fn open_append(dir: &Path, segment_number: u64) -> io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let header = read_header(&mut file, segment_number)?;
        let write_position = file.seek(SeekFrom::End(0))?;

        Ok(WalSegment {
            file,
            header,
            write_position,
            path,
            closed: false,
        })
    }

    /// Segment file path: `wal-NNNNNN.seg`.
    pub fn segment_path(dir: &Path, segment_number: u64) -> PathBuf {
        dir.join(format!("wal-{:06}.seg", segment_number))
    }

    /// Segment number.
    pub fn segment_number(&self) -> u64 {
        self.header.segment_number
    }

    /// Segment header.
    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// Current segment size in bytes.
    pub fn size(&self) -> u64 {
        self.write_position
    }

    /// File path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append bytes.
    ///
    /// On error `size()` is unchanged but part of `data` may be on disk;
    /// the caller cuts the segment back with [`truncate`](Self::truncate).
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Cannot write to closed segment",
            ));
        }

        self.file.write_all(data)?;
        self.write_position += data.len() as u64;
        Ok(())
    }

    /// Sync segment data to disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Sync and mark the segment immutable.
    pub fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.file.sync_all()?;
            self.closed = true;
        }
        Ok(())
    }

    /// Whether this segment is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Truncate the segment at `position`.
    pub fn truncate(&mut self, position: u64) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Cannot truncate closed segment",
            ));
        }

        self.file.set_len(position)?;
        self.write_position = position;
        self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }
}

/// WAL record for one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Revision allocated to the commit
    pub revision: u64,

    /// Commit timestamp (microseconds since epoch)
    pub timestamp: u64,

    /// Encoded [`Writeset`](crate::format::Writeset)
    pub writeset: Vec<u8>,
}

impl WalRecord {
    /// Create a record stamped with the current time.
    pub fn new(revision: u64, writeset: Vec<u8>) -> Self {
        WalRecord {
            revision,
            timestamp: now_micros(),
            writeset,
        }
    }

    /// Serialize: length (4) + format_version (1) + payload + crc32 (4).
    ///
    /// The length field covers format_version, payload and crc32. Fails
    /// with [`WalRecordError::TooLarge`] when that does not fit in 4 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WalRecordError> {
        let mut payload = Vec::with_capacity(MIN_PAYLOAD_SIZE + self.writeset.len());
        payload.push(WAL_RECORD_FORMAT_VERSION);
        let _ = payload.write_u64::<LittleEndian>(self.revision);
        let _ = payload.write_u64::<LittleEndian>(self.timestamp);
        payload.extend_from_slice(&self.writeset);

        let crc = compute_crc(&payload);

        let total_len = payload.len() + 4;
        let prefix = record_length_prefix(total_len)?;
        let mut record = Vec::with_capacity(4 + total_len);
        let _ = record.write_u32::<LittleEndian>(prefix);
        record.extend_from_slice(&payload);
        let _ = record.write_u32::<LittleEndian>(crc);
        Ok(record)
    }

    /// Deserialize a record, returning it with the number of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), WalRecordError> {
        if bytes.len() < 4 {
            return Err(WalRecordError::InsufficientData);
        }

        let length = LittleEndian::read_u32(&bytes[0..4]) as usize;
        if length == 0 {
            return Err(WalRecordError::InvalidFormat);
        }
        if bytes.len() < 4 + length {
            return Err(WalRecordError::InsufficientData);
        }
        // format version + crc at the very least
        if length < 5 {
            return Err(WalRecordError::InvalidFormat);
        }

        let payload = &bytes[4..length];
        let stored_crc = LittleEndian::read_u32(&bytes[length..4 + length]);
        let computed_crc = compute_crc(payload);
        if computed_crc != stored_crc {
            return Err(WalRecordError::ChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }

        if payload.len() < MIN_PAYLOAD_SIZE {
            return Err(WalRecordError::InvalidFormat);
        }
        if payload[0] != WAL_RECORD_FORMAT_VERSION {
            return Err(WalRecordError::UnsupportedVersion(payload[0]));
        }

        let record = WalRecord {
            revision: LittleEndian::read_u64(&payload[1..9]),
            timestamp: LittleEndian::read_u64(&payload[9..17]),
            writeset: payload[17..].to_vec(),
        };

        Ok((record, 4 + length))
    }
}

fn record_length_prefix(len: usize) -> Result<u32, WalRecordError> {
    u32::try_from(len).map_err(|_| WalRecordError::TooLarge { len })
}

/// CRC32 of `data`.
pub(crate) fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub(crate) fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// WAL record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalRecordError {
    /// Not enough data to parse record
    #[error("Insufficient data to parse record")]
    InsufficientData,

    /// Record format is invalid
    #[error("Invalid record format")]
    InvalidFormat,

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Expected checksum from record
        expected: u32,
        /// Computed checksum
        computed: u32,
    },

    /// Unsupported format version
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Record length does not fit the 4-byte length field
    #[error("Record of {len} bytes exceeds the 4 GiB record limit")]
    TooLarge {
        /// Length that would have been written
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn header_roundtrip() {
        let header = SegmentHeader::new(7, 42);
        let parsed = SegmentHeader::from_bytes(&header.to_bytes());
        assert_eq!(parsed, header);
        assert!(parsed.is_valid());
    }

    #[test]
    fn header_rejects_foreign_magic() {
        let mut bytes = SegmentHeader::new(1, 0).to_bytes();
        bytes[0..4].copy_from_slice(b"STRA");
        assert!(!SegmentHeader::from_bytes(&bytes).is_valid());
    }

    #[test]
    fn record_roundtrip_reports_consumed_bytes() {
        let record = WalRecord::new(5, vec![1, 2, 3, 4]);
        let bytes = record.to_bytes().unwrap();
        let (parsed, consumed) = WalRecord::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut bytes = WalRecord::new(1, vec![9; 16]).to_bytes().unwrap();
        bytes[12] ^= 0xFF;
        assert!(matches!(
            WalRecord::from_bytes(&bytes),
            Err(WalRecordError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncated_record_is_insufficient() {
        let bytes = WalRecord::new(1, vec![0; 32]).to_bytes().unwrap();
        assert_eq!(
            WalRecord::from_bytes(&bytes[..bytes.len() - 1]),
            Err(WalRecordError::InsufficientData)
        );
        assert_eq!(
            WalRecord::from_bytes(&bytes[..2]),
            Err(WalRecordError::InsufficientData)
        );
    }

    #[test]
    fn segment_create_append_reopen() {
        let dir = tempdir().unwrap();
        let record = WalRecord::new(1, vec![7; 10]).to_bytes().unwrap();

        let mut segment = WalSegment::create(dir.path(), 1, 0).unwrap();
        segment.write(&record).unwrap();
        segment.sync().unwrap();
        assert_eq!(segment.size(), (SEGMENT_HEADER_SIZE + record.len()) as u64);
        drop(segment);

        let reopened = WalSegment::open_append(dir.path(), 1).unwrap();
        assert_eq!(reopened.size(), (SEGMENT_HEADER_SIZE + record.len()) as u64);
        assert_eq!(reopened.header().base_revision, 0);

        assert!(WalSegment::open_read(dir.path(), 2).is_err());
        assert!(WalSegment::create(dir.path(), 1, 0).is_err());
    }

    #[test]
    fn closed_segment_rejects_writes() {
        let dir = tempdir().unwrap();
        let mut segment = WalSegment::create(dir.path(), 1, 0).unwrap();
        segment.close().unwrap();
        assert!(segment.is_closed());
        assert!(segment.write(b"x").is_err());
        assert!(segment.truncate(0).is_err());
    }

    #[test]
    fn segment_path_format() {
        assert_eq!(
            WalSegment::segment_path(Path::new("/wal"), 12),
            PathBuf::from("/wal/wal-000012.seg")
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn record_length_must_fit_u32() {
        assert_eq!(record_length_prefix(4096), Ok(4096));
        let largest = MAX_WRITESET_SIZE + MIN_PAYLOAD_SIZE + 4;
        assert_eq!(record_length_prefix(largest), Ok(u32::MAX));
        let len = largest + 1;
        assert_eq!(
            record_length_prefix(len),
            Err(WalRecordError::TooLarge { len })
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn single_bit_flip_never_parses(
                writeset in prop::collection::vec(any::<u8>(), 0..256),
                revision in any::<u64>(),
                bit in any::<prop::sample::Index>(),
            ) {
                let mut bytes = WalRecord::new(revision, writeset).to_bytes().unwrap();
                let bit = bit.index(bytes.len() * 8);
                bytes[bit / 8] ^= 1 << (bit % 8);
                prop_assert!(WalRecord::from_bytes(&bytes).is_err());
            }

            #[test]
            fn any_prefix_is_insufficient(
                writeset in prop::collection::vec(any::<u8>(), 0..128),
                cut in any::<prop::sample::Index>(),
            ) {
                let bytes = WalRecord::new(1, writeset).to_bytes().unwrap();
                let cut = cut.index(bytes.len());
                prop_assert_eq!(
                    WalRecord::from_bytes(&bytes[..cut]),
                    Err(WalRecordError::InsufficientData)
                );
            }
        }
    }
}
