//! Database configuration via `vellum.toml`
//!
//! A `DatabaseConfig` says where databases live and how hard they try to
//! keep committed data. It can be built in code or loaded from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vellum_core::{Error, Result};
use vellum_durability::wal::config::MIN_SEGMENT_SIZE;
use vellum_durability::{DurabilityMode, WalConfig};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "vellum.toml";

const DEFAULT_AUTO_COMPACT_BYTES: u64 = 64 * 1024 * 1024;
const DEFAULT_WAL_SEGMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Database configuration.
///
/// # Example
///
/// ```toml
/// directory = "/var/lib/app"
/// durability = "always"
/// auto_compact_bytes = 67108864
/// wal_segment_size = 16777216
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding `<name>.vellum/` database directories.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Durability mode: `"always"` or `"buffered"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Compact once the WAL grows past this many bytes; 0 disables.
    #[serde(default = "default_auto_compact_bytes")]
    pub auto_compact_bytes: u64,
    /// Target size of one WAL segment file.
    #[serde(default = "default_wal_segment_size")]
    pub wal_segment_size: u64,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_durability_str() -> String {
    DurabilityMode::Always.as_str().to_string()
}

fn default_auto_compact_bytes() -> u64 {
    DEFAULT_AUTO_COMPACT_BYTES
}

fn default_wal_segment_size() -> u64 {
    DEFAULT_WAL_SEGMENT_SIZE
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            durability: default_durability_str(),
            auto_compact_bytes: default_auto_compact_bytes(),
            wal_segment_size: default_wal_segment_size(),
        }
    }
}

impl DatabaseConfig {
    /// Default configuration rooted at `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Set the durability mode (builder pattern).
    pub fn with_durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode.as_str().to_string();
        self
    }

    /// Set the auto-compaction threshold (builder pattern).
    pub fn with_auto_compact_bytes(mut self, bytes: u64) -> Self {
        self.auto_compact_bytes = bytes;
        self
    }

    /// Set the WAL segment size (builder pattern).
    pub fn with_wal_segment_size(mut self, bytes: u64) -> Self {
        self.wal_segment_size = bytes;
        self
    }

    /// Parse the durability string into a `DurabilityMode`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        self.durability.parse().map_err(Error::Config)
    }

    /// WAL settings derived from this config.
    pub fn wal_config(&self) -> WalConfig {
        WalConfig::new().with_segment_size(self.wal_segment_size)
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<()> {
        self.durability_mode()?;
        if self.wal_segment_size < MIN_SEGMENT_SIZE {
            return Err(Error::Config(format!(
                "wal_segment_size must be at least {} bytes, got {}",
                MIN_SEGMENT_SIZE, self.wal_segment_size
            )));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(Error::Config("directory must not be empty".to_string()));
        }
        Ok(())
    }

    /// Default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Vellum database configuration

# Directory that holds <name>.vellum/ database directories
directory = "."

# Durability mode: "always" (default) or "buffered"
#   "always"   = fsync every commit before it returns, zero data loss
#   "buffered" = fsync on close only, a crash may lose recent commits
durability = "always"

# Compact the write-ahead log into a snapshot once it exceeds this many
# bytes (0 disables automatic compaction)
auto_compact_bytes = 67108864

# Size of one write-ahead log segment file
wal_segment_size = 16777216
"#
    }

    /// Parse config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DatabaseConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
