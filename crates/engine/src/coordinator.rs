//! Commit bookkeeping
//!
//! Every commit (a single save/delete, an index change or a whole batch)
//! allocates exactly one revision. The coordinator does not allocate
//! revisions itself; the WAL writer's last revision is the counter, so a
//! revision is consumed only once its record is durable. What lives here
//! is the per-handle accounting of how commits ended.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use vellum_core::{Error, Revision};

/// Commit counters for one database handle
///
/// # Memory Ordering
///
/// The counters use Relaxed ordering: they are observational only and do
/// not synchronize any other memory operations.
#[derive(Debug, Default)]
pub struct CommitCoordinator {
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
    documents_written: AtomicU64,
    documents_deleted: AtomicU64,
}

impl CommitCoordinator {
    /// Fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a durable commit
    pub fn record_commit(&self, revision: Revision, written: usize, deleted: usize) {
        self.total_committed.fetch_add(1, Ordering::Relaxed);
        self.documents_written
            .fetch_add(written as u64, Ordering::Relaxed);
        self.documents_deleted
            .fetch_add(deleted as u64, Ordering::Relaxed);
        debug!(target: "vellum::db", %revision, written, deleted, "Commit durable");
    }

    /// Record a commit that failed before becoming visible
    pub fn record_abort(&self, error: &Error) {
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
        warn!(target: "vellum::db", error = %error, "Commit aborted");
    }

    /// Current counters
    pub fn metrics(&self) -> CommitMetrics {
        let committed = self.total_committed.load(Ordering::Relaxed);
        let aborted = self.total_aborted.load(Ordering::Relaxed);
        let attempted = committed + aborted;
        CommitMetrics {
            total_committed: committed,
            total_aborted: aborted,
            documents_written: self.documents_written.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            commit_rate: if attempted > 0 {
                committed as f64 / attempted as f64
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time copy of [`CommitCoordinator`] counters
#[derive(Debug, Clone, PartialEq)]
pub struct CommitMetrics {
    /// Commits that became durable and visible
    pub total_committed: u64,
    /// Commits rejected during staging or logging
    pub total_aborted: u64,
    /// Document versions written
    pub documents_written: u64,
    /// Documents removed
    pub documents_deleted: u64,
    /// committed / (committed + aborted); 0.0 before any commit
    pub commit_rate: f64,
}
