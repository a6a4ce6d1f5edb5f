//! Database directory structure
//!
//! A database is a portable directory containing all state:
//!
//! ```text
//! <name>.vellum/
//! ├── .lock            # Exclusive lock file (held while open)
//! ├── wal/             # Write-ahead log segments
//! │   ├── wal-000001.seg
//! │   └── ...
//! └── snapshot/        # Latest compaction snapshot
//!     └── snap-000001.chk
//! ```

use std::path::{Path, PathBuf};

/// Suffix appended to a database name to form its directory
pub const DATABASE_DIR_SUFFIX: &str = "vellum";

/// Database directory paths
#[derive(Debug, Clone)]
pub struct DatabasePaths {
    root: PathBuf,
}

impl DatabasePaths {
    /// Create paths from the database root directory
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        DatabasePaths {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Paths of database `name` inside `directory`
    pub fn for_name(directory: impl AsRef<Path>, name: &str) -> Self {
        Self::from_root(
            directory
                .as_ref()
                .join(format!("{}.{}", name, DATABASE_DIR_SUFFIX)),
        )
    }

    /// Root database directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lock file path
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(".lock")
    }

    /// WAL directory
    pub fn wal_dir(&self) -> PathBuf {
        self.root.join("wal")
    }

    /// Snapshot directory
    pub fn snapshot_dir(&self) -> PathBuf {
        self.root.join("snapshot")
    }

    /// Whether a database directory exists
    pub fn exists(&self) -> bool {
        self.wal_dir().is_dir()
    }

    /// Create the full directory structure
    pub fn create_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.wal_dir())?;
        std::fs::create_dir_all(self.snapshot_dir())?;
        Ok(())
    }
}

/// fsync a directory so that renames and new entries inside it are durable.
pub fn sync_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::fs::File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}
