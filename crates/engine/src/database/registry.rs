//! Process-wide registry of open databases
//!
//! The file lock on `.lock` keeps other processes out, but `flock` is held
//! per open file description, so a second handle from the same process
//! must be refused here before it ever touches the lock file.
//!
//! A root is reserved before recovery starts and released when the open
//! fails or the handle closes. The registry mutex itself is only held for
//! the insert or remove.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Canonical roots of every database currently open in this process
static OPEN_DATABASES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Claim `root` for this process.
///
/// Returns `false` if another handle already holds it.
pub(crate) fn reserve(root: &Path) -> bool {
    OPEN_DATABASES.lock().insert(root.to_path_buf())
}

/// Forget `root`; called when its handle closes or its open fails
pub(crate) fn release(root: &Path) {
    OPEN_DATABASES.lock().remove(root);
}
