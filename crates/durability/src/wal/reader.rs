//! WAL reader for recovery.

use crate::format::{WalRecord, WalRecordError, WalSegment, SEGMENT_HEADER_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

/// Records larger than this length prefix are treated as garbage
const MAX_RECORD_LEN: usize = 1 << 30;

/// Reads WAL records from segments in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalReader;

/// Records of one segment and where its valid data ends.
#[derive(Debug)]
pub struct SegmentReadResult {
    /// Records in write order
    pub records: Vec<WalRecord>,
    /// Byte offset just past the last valid record
    pub valid_end: u64,
    /// Why reading stopped
    pub stop_reason: ReadStopReason,
    /// Records skipped because their checksum did not match
    pub skipped_corrupted: usize,
}

impl WalReader {
    /// Create a reader.
    pub fn new() -> Self {
        WalReader
    }

    /// Read all records from a single segment.
    ///
    /// Stops at the first incomplete or unparseable record; `valid_end`
    /// marks where valid data ends, for truncation.
    pub fn read_segment(
        &self,
        wal_dir: &Path,
        segment_number: u64,
    ) -> Result<SegmentReadResult, WalReaderError> {
        let segment = WalSegment::open_read(wal_dir, segment_number)?;
        let mut file = std::fs::File::open(segment.path())?;
        file.seek(SeekFrom::Start(SEGMENT_HEADER_SIZE as u64))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        Ok(Self::parse_records(&buffer))
    }

    fn parse_records(buffer: &[u8]) -> SegmentReadResult {
        let hdr_size = SEGMENT_HEADER_SIZE as u64;
        let mut records = Vec::new();
        let mut valid_end = hdr_size;
        let mut offset = 0;
        let mut stop_reason = ReadStopReason::EndOfData;
        let mut skipped_corrupted = 0usize;

        while offset < buffer.len() {
            let remaining = &buffer[offset..];
            match WalRecord::from_bytes(remaining) {
                Ok((record, consumed)) => {
                    records.push(record);
                    offset += consumed;
                    valid_end = hdr_size + offset as u64;
                }
                Err(WalRecordError::InsufficientData) => {
                    // Torn write at the tail; expected after a crash.
                    stop_reason = ReadStopReason::PartialRecord;
                    break;
                }
                Err(WalRecordError::ChecksumMismatch { .. }) => {
                    let record_len = LittleEndian::read_u32(&remaining[0..4]) as usize;
                    if record_len < MAX_RECORD_LEN && remaining.len() >= 4 + record_len {
                        warn!(target: "vellum::wal", offset, "Skipping corrupted WAL record (checksum mismatch)");
                        offset += 4 + record_len;
                        valid_end = hdr_size + offset as u64;
                        skipped_corrupted += 1;
                        continue;
                    }
                    stop_reason = ReadStopReason::ChecksumMismatch { offset };
                    break;
                }
                Err(e) => {
                    stop_reason = ReadStopReason::ParseError {
                        offset,
                        detail: e.to_string(),
                    };
                    break;
                }
            }
        }

        SegmentReadResult {
            records,
            valid_end,
            stop_reason,
            skipped_corrupted,
        }
    }

    /// Read all records from every segment in a WAL directory.
    ///
    /// Only the last segment may be truncated: a torn tail there is the
    /// normal result of a crash mid-append. A final segment with no records
    /// and a short or unreadable header (crash during creation) is reported
    /// as `incomplete_segment`.
    pub fn read_all(&self, wal_dir: &Path) -> Result<WalReadResult, WalReaderError> {
        let segments = self.list_segments(wal_dir)?;

        let mut result = WalReadResult::default();

        for (idx, segment_num) in segments.iter().enumerate() {
            let is_last = idx == segments.len() - 1;
            let path = WalSegment::segment_path(wal_dir, *segment_num);
            let size = std::fs::metadata(&path)?.len();

            if is_last && Self::never_initialized(wal_dir, *segment_num, size)? {
                warn!(target: "vellum::wal", segment = segment_num, size, "Final WAL segment has no valid header");
                result.incomplete_segment = Some(*segment_num);
                break;
            }

            let read = self.read_segment(wal_dir, *segment_num)?;
            result.records.extend(read.records);
            result.skipped_corrupted += read.skipped_corrupted;
            result.stop_reason = read.stop_reason;

            if is_last && read.valid_end < size {
                result.truncate_info = Some(TruncateInfo {
                    segment_number: *segment_num,
                    valid_end: read.valid_end,
                    original_size: size,
                });
            }
        }

        Ok(result)
    }

    /// Whether a segment is too short for its header, or has an unreadable
    /// header with no records behind it.
    fn never_initialized(
        wal_dir: &Path,
        segment_number: u64,
        size: u64,
    ) -> Result<bool, WalReaderError> {
        if size < SEGMENT_HEADER_SIZE as u64 {
            return Ok(true);
        }
        match WalSegment::open_read(wal_dir, segment_number) {
            Ok(_) => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                let data = std::fs::read(WalSegment::segment_path(wal_dir, segment_number))?;
                let body = &data[SEGMENT_HEADER_SIZE.min(data.len())..];
                Ok(Self::parse_records(body).records.is_empty())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Records with `revision > watermark` from all segments.
    pub fn read_all_after_watermark(
        &self,
        wal_dir: &Path,
        watermark: u64,
    ) -> Result<Vec<WalRecord>, WalReaderError> {
        Ok(self
            .read_all(wal_dir)?
            .records
            .into_iter()
            .filter(|r| r.revision > watermark)
            .collect())
    }

    /// Segment numbers in the WAL directory, ascending.
    pub fn list_segments(&self, wal_dir: &Path) -> Result<Vec<u64>, WalReaderError> {
        let mut segments = Vec::new();
        if !wal_dir.exists() {
            return Ok(segments);
        }

        for entry in std::fs::read_dir(wal_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(num) = name
                .strip_prefix("wal-")
                .and_then(|rest| rest.strip_suffix(".seg"))
                .and_then(|digits| digits.parse::<u64>().ok())
            {
                segments.push(num);
            }
        }

        segments.sort_unstable();
        Ok(segments)
    }
}

/// Why record reading stopped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadStopReason {
    /// Read to the end of data
    #[default]
    EndOfData,
    /// Partial record at end of segment (expected after crash)
    PartialRecord,
    /// Checksum mismatch with an unusable length field
    ChecksumMismatch {
        /// Byte offset within the segment's record area
        offset: usize,
    },
    /// Checksum was valid but the payload could not be parsed
    ParseError {
        /// Byte offset within the segment's record area
        offset: usize,
        /// Error description
        detail: String,
    },
}

/// Result of reading all segments.
#[derive(Debug, Default)]
pub struct WalReadResult {
    /// Valid records in order
    pub records: Vec<WalRecord>,
    /// Truncation needed on the last segment, if any
    pub truncate_info: Option<TruncateInfo>,
    /// Why reading of the last segment stopped
    pub stop_reason: ReadStopReason,
    /// Records skipped because of checksum mismatches
    pub skipped_corrupted: usize,
    /// Final segment whose header was never completely written
    pub incomplete_segment: Option<u64>,
}

/// Truncation to apply to the last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncateInfo {
    /// Segment to truncate
    pub segment_number: u64,
    /// Offset where valid data ends
    pub valid_end: u64,
    /// Size before truncation
    pub original_size: u64,
}

impl TruncateInfo {
    /// Bytes that will be discarded
    pub fn bytes_to_truncate(&self) -> u64 {
        self.original_size - self.valid_end
    }
}

/// WAL reader errors.
#[derive(Debug, thiserror::Error)]
pub enum WalReaderError {
    /// IO error, including unreadable segment headers
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::WalSegment;
    use tempfile::tempdir;

    fn write_segment(dir: &Path, number: u64, revisions: &[u64]) -> Vec<Vec<u8>> {
        let mut segment = WalSegment::create(dir, number, 0).unwrap();
        let mut encoded = Vec::new();
        for &rev in revisions {
            let bytes = WalRecord::new(rev, vec![rev as u8; 8]).to_bytes().unwrap();
            segment.write(&bytes).unwrap();
            encoded.push(bytes);
        }
        segment.sync().unwrap();
        encoded
    }

    #[test]
    fn reads_records_across_segments() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 1, &[1, 2]);
        write_segment(dir.path(), 2, &[3]);

        let reader = WalReader::new();
        assert_eq!(reader.list_segments(dir.path()).unwrap(), vec![1, 2]);

        let result = reader.read_all(dir.path()).unwrap();
        let revs: Vec<u64> = result.records.iter().map(|r| r.revision).collect();
        assert_eq!(revs, vec![1, 2, 3]);
        assert!(result.truncate_info.is_none());
        assert_eq!(result.stop_reason, ReadStopReason::EndOfData);

        let after = reader.read_all_after_watermark(dir.path(), 2).unwrap();
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn torn_tail_is_reported_for_truncation() {
        let dir = tempdir().unwrap();
        let encoded = write_segment(dir.path(), 1, &[1, 2]);

        let path = WalSegment::segment_path(dir.path(), 1);
        let full = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full - 3).unwrap();

        let result = WalReader::new().read_all(dir.path()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.stop_reason, ReadStopReason::PartialRecord);
        let info = result.truncate_info.unwrap();
        assert_eq!(info.valid_end, (SEGMENT_HEADER_SIZE + encoded[0].len()) as u64);
        assert_eq!(info.bytes_to_truncate(), encoded[1].len() as u64 - 3);
    }

    #[test]
    fn corrupted_record_is_skipped() {
        let dir = tempdir().unwrap();
        let encoded = write_segment(dir.path(), 1, &[1, 2, 3]);

        let path = WalSegment::segment_path(dir.path(), 1);
        let mut data = std::fs::read(&path).unwrap();
        let second = SEGMENT_HEADER_SIZE + encoded[0].len();
        data[second + 10] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();

        let result = WalReader::new().read_all(dir.path()).unwrap();
        let revs: Vec<u64> = result.records.iter().map(|r| r.revision).collect();
        assert_eq!(revs, vec![1, 3]);
        assert_eq!(result.skipped_corrupted, 1);
    }

    #[test]
    fn short_final_segment_is_incomplete() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 1, &[1]);
        std::fs::write(WalSegment::segment_path(dir.path(), 2), b"VLWL").unwrap();

        let result = WalReader::new().read_all(dir.path()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.incomplete_segment, Some(2));
    }

    #[test]
    fn headerless_final_segment_is_incomplete() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 1, &[1, 2]);
        let seg2 = WalSegment::segment_path(dir.path(), 2);

        std::fs::write(&seg2, [0u8; SEGMENT_HEADER_SIZE]).unwrap();
        let result = WalReader::new().read_all(dir.path()).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.incomplete_segment, Some(2));

        std::fs::write(&seg2, [0x5Au8; SEGMENT_HEADER_SIZE]).unwrap();
        let result = WalReader::new().read_all(dir.path()).unwrap();
        assert_eq!(result.incomplete_segment, Some(2));

        std::fs::write(&seg2, vec![0u8; SEGMENT_HEADER_SIZE + 512]).unwrap();
        let result = WalReader::new().read_all(dir.path()).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.incomplete_segment, Some(2));
    }

    #[test]
    fn bad_header_ahead_of_records_is_an_error() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 1, &[1]);
        let mut bytes = vec![0u8; SEGMENT_HEADER_SIZE];
        bytes.extend_from_slice(&WalRecord::new(2, vec![2; 8]).to_bytes().unwrap());
        std::fs::write(WalSegment::segment_path(dir.path(), 2), &bytes).unwrap();

        assert!(WalReader::new().read_all(dir.path()).is_err());
    }

    #[test]
    fn missing_dir_lists_nothing() {
        let dir = tempdir().unwrap();
        let reader = WalReader::new();
        assert!(reader.list_segments(&dir.path().join("nope")).unwrap().is_empty());
    }
}
