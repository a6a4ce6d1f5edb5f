//! WAL configuration.

/// Smallest accepted segment size
pub const MIN_SEGMENT_SIZE: u64 = 4 * 1024;

/// WAL configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalConfig {
    /// Maximum segment size in bytes (default: 64MB).
    ///
    /// When appending would grow a segment past this size, a new segment
    /// is started. A single record larger than this still gets written,
    /// alone in its segment.
    pub segment_size: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            segment_size: 64 * 1024 * 1024,
        }
    }
}

impl WalConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set segment size (builder pattern).
    pub fn with_segment_size(mut self, size: u64) -> Self {
        self.segment_size = size;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), WalConfigError> {
        if self.segment_size < MIN_SEGMENT_SIZE {
            return Err(WalConfigError::SegmentSizeTooSmall);
        }
        Ok(())
    }

    /// Small segments so tests exercise rotation.
    pub fn for_testing() -> Self {
        WalConfig {
            segment_size: MIN_SEGMENT_SIZE,
        }
    }
}

/// WAL configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalConfigError {
    /// Segment size is too small
    #[error("Segment size must be at least {} bytes", MIN_SEGMENT_SIZE)]
    SegmentSizeTooSmall,
}
