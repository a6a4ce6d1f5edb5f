//! Durability modes for the WAL writer.

use std::fmt;
use std::str::FromStr;

/// When committed records are forced to stable storage.
///
/// | Mode     | fsync                         | Crash loses          |
/// |----------|-------------------------------|----------------------|
/// | Always   | after every commit            | nothing committed    |
/// | Buffered | on flush, rotation and close  | unflushed commits    |
///
/// Both modes keep batches atomic: a commit is one WAL record and a torn
/// record is discarded on recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every commit before it is acknowledged
    #[default]
    Always,
    /// Let the OS write back; fsync only on explicit flush and close
    Buffered,
}

impl DurabilityMode {
    /// Whether every append must be followed by an fsync
    pub fn syncs_every_commit(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }

    /// Config-file spelling of this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            DurabilityMode::Always => "always",
            DurabilityMode::Buffered => "buffered",
        }
    }
}

impl fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurabilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(DurabilityMode::Always),
            "buffered" => Ok(DurabilityMode::Buffered),
            other => Err(format!(
                "Invalid durability mode: '{}'. Expected \"always\" or \"buffered\"",
                other
            )),
        }
    }
}
