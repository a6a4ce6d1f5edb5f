//! Segmented write-ahead log
//!
//! - `mode`: when appends are fsynced (DurabilityMode)
//! - `config`: segment sizing (WalConfig)
//! - `writer`: appends commit records and rotates segments (WalWriter)
//! - `reader`: scans segments for recovery (WalReader)

pub mod config;
pub mod mode;
pub mod reader;
pub mod writer;

pub use config::{WalConfig, WalConfigError};
pub use mode::DurabilityMode;
pub use reader::{ReadStopReason, TruncateInfo, WalReadResult, WalReader, WalReaderError};
pub use writer::{WalCounters, WalWriter};
