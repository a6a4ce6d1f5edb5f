//! Database handle: open, commit, read, compact, close
//!
//! Opening a database:
//! 1. Create `<directory>/<name>.vellum/` with its `wal/` and `snapshot/`
//!    subdirectories if they do not exist
//! 2. Refuse if the database is already open in this process (registry) or
//!    in another one (`fs2` exclusive lock on `.lock`)
//! 3. Recover: load the newest snapshot, replay WAL records above its
//!    watermark into the in-memory store, cut a torn tail
//! 4. Open the WAL writer for appends
//!
//! Every commit holds the writer mutex from staging to apply, so commits
//! are serialized and a revision is consumed only once its record is in
//! the log. Reads never take the writer mutex.

pub mod config;
mod registry;
mod replay;

pub use config::{DatabaseConfig, CONFIG_FILE_NAME};

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use fs2::FileExt;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{info, warn};

use vellum_core::{Document, Error, FieldPath, Result, Revision};
use vellum_durability::{
    write_snapshot, DatabasePaths, RecoveryCoordinator, RecoveryError, RecoveryResult,
    DurabilityMode, SnapshotReadError, WalCounters, WalRecord, WalWriter,
};
use vellum_durability::wal::WalReaderError;
use vellum_storage::{Change, DocumentStore};

use crate::batch::{self, Batch, BatchOp, StagedCommit};
use crate::coordinator::{CommitCoordinator, CommitMetrics};
use replay::{decode_writeset, encode_changes, record_body};

/// Outcome of a compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionStats {
    /// Id of the snapshot written
    pub snapshot_id: u64,
    /// Highest revision the snapshot contains
    pub watermark: Revision,
    /// Documents written into the snapshot
    pub documents: usize,
    /// Snapshot file size in bytes
    pub snapshot_bytes: u64,
    /// WAL segments deleted because the snapshot covers them
    pub segments_removed: usize,
}

/// State that exists only while the handle is open
struct Writer {
    wal: WalWriter,
    lock_file: File,
    next_snapshot_id: u64,
}

/// An open database
///
/// `Database` is `Send + Sync`; share it across threads with `Arc`.
/// Mutations assume a single logical writer, but concurrent writers are
/// serialized internally and cannot corrupt state.
pub struct Database {
    name: String,
    paths: DatabasePaths,
    /// Canonical root, the registry key
    root: PathBuf,
    config: DatabaseConfig,
    store: DocumentStore,
    writer: Mutex<Option<Writer>>,
    closed: AtomicBool,
    coordinator: CommitCoordinator,
    recovery: RecoveryResult,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Database {
    /// Open (creating if needed) the database `name` under
    /// `config.directory`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty name or one containing path separators
    /// - `Config` for an invalid configuration
    /// - `Locked` when another handle, in this process or another, has it open
    /// - `Io` when the directory cannot be created or read
    /// - `Corruption` when the snapshot or a logged commit cannot be decoded
    pub fn open(name: &str, config: DatabaseConfig) -> Result<Self> {
        validate_name(name)?;
        config.validate()?;
        let durability = config.durability_mode()?;

        let paths = DatabasePaths::for_name(&config.directory, name);
        paths.create_directories()?;
        let root = paths.root().canonicalize()?;

        if !registry::reserve(&root) {
            return Err(Error::Locked {
                name: name.to_string(),
            });
        }
        let (lock_file, store, recovery, wal) = match Self::load(name, &paths, durability, &config)
        {
            Ok(loaded) => loaded,
            Err(e) => {
                registry::release(&root);
                return Err(e);
            }
        };

        info!(
            target: "vellum::db",
            name,
            path = %root.display(),
            documents = store.len(),
            revision = recovery.last_revision,
            durability = %durability,
            "Database opened"
        );

        Ok(Database {
            name: name.to_string(),
            paths,
            root,
            store,
            writer: Mutex::new(Some(Writer {
                wal,
                lock_file,
                next_snapshot_id: recovery.snapshot_id.unwrap_or(0) + 1,
            })),
            closed: AtomicBool::new(false),
            coordinator: CommitCoordinator::new(),
            recovery,
            config,
        })
    }

    /// Lock, recover and reopen the WAL of a reserved root
    fn load(
        name: &str,
        paths: &DatabasePaths,
        durability: DurabilityMode,
        config: &DatabaseConfig,
    ) -> Result<(File, DocumentStore, RecoveryResult, WalWriter)> {
        let lock_file = acquire_lock(&paths.lock_file(), name)?;
        let store = DocumentStore::new();
        let recovery = recover_into(paths, &store)?;
        let wal = WalWriter::open(
            paths.wal_dir(),
            durability,
            config.wal_config(),
            recovery.last_revision,
        )?;
        Ok((lock_file, store, recovery, wal))
    }

    /// Whether a database named `name` exists under `config.directory`
    pub fn exists(name: &str, config: &DatabaseConfig) -> Result<bool> {
        validate_name(name)?;
        Ok(DatabasePaths::for_name(&config.directory, name).exists())
    }

    /// Remove a database that is not open.
    ///
    /// Returns `false` if there was nothing to remove.
    pub fn delete_named(name: &str, config: &DatabaseConfig) -> Result<bool> {
        validate_name(name)?;
        let paths = DatabasePaths::for_name(&config.directory, name);
        if !paths.root().exists() {
            return Ok(false);
        }
        let root = paths.root().canonicalize()?;

        if !registry::reserve(&root) {
            return Err(Error::Locked {
                name: name.to_string(),
            });
        }
        let removed = acquire_lock(&paths.lock_file(), name).and_then(|lock_file| {
            std::fs::remove_dir_all(&root)?;
            drop(lock_file);
            Ok(())
        });
        registry::release(&root);
        removed?;

        info!(target: "vellum::db", name, path = %root.display(), "Database deleted");
        Ok(true)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database directory
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Configuration the handle was opened with
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// What recovery found when the handle was opened
    pub fn recovery_result(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Commit counters of this handle
    pub fn metrics(&self) -> CommitMetrics {
        self.coordinator.metrics()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn store(&self) -> &DocumentStore {
        &self.store
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current revision of a document; `None` if it does not exist
    pub fn get(&self, id: &str) -> Result<Option<Document>> {
        self.ensure_open()?;
        Ok(self.store.get(id).map(|doc| (*doc).clone()))
    }

    /// Whether a document exists
    pub fn contains(&self, id: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.store.contains(id))
    }

    /// Number of documents
    pub fn count(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.store.len())
    }

    /// All document ids in ascending order
    pub fn ids(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.store.ids())
    }

    /// Revision of the most recent commit; `Revision::ZERO` when empty
    pub fn last_revision(&self) -> Result<Revision> {
        self.ensure_open()?;
        Ok(self.store.revision())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Save a document, replacing any document with the same id.
    ///
    /// The write is one atomic commit; with the default durability it is
    /// fsynced before this returns.
    pub fn save(&self, doc: &Document) -> Result<Revision> {
        self.commit(|store, revision| {
            batch::stage(Some(BatchOp::Save(doc.clone())), store, revision)
        })
    }

    /// Delete a document; `NotFound` if it does not exist.
    pub fn delete(&self, id: &str) -> Result<Revision> {
        self.commit(|store, revision| {
            batch::stage(Some(BatchOp::Delete(id.to_string())), store, revision)
        })
    }

    /// Apply `ops` as one atomic commit.
    ///
    /// Any failure before the commit is durable returns `Aborted` and
    /// leaves no visible effect. An empty batch commits nothing and returns
    /// the current revision.
    pub fn run_batch<I>(&self, ops: I) -> Result<Revision>
    where
        I: IntoIterator<Item = BatchOp>,
    {
        let ops: Vec<BatchOp> = ops.into_iter().collect();
        if ops.is_empty() {
            return self.last_revision();
        }
        let count = ops.len();
        self.commit(|store, revision| batch::stage(ops, store, revision))
            .map_err(|e| match e {
                Error::Closed { .. } => e,
                other => Error::aborted(other),
            })
            .map(|revision| {
                info!(target: "vellum::db", ops = count, %revision, "Batch committed");
                revision
            })
    }

    /// Build a batch in a closure and commit it.
    ///
    /// An error returned by the closure aborts the batch.
    pub fn in_batch<F>(&self, build: F) -> Result<Revision>
    where
        F: FnOnce(&mut Batch) -> Result<()>,
    {
        self.ensure_open()?;
        let mut batch = Batch::new();
        build(&mut batch).map_err(Error::aborted)?;
        self.run_batch(batch)
    }

    /// Index a field path. Returns `false` if it was already indexed.
    ///
    /// The definition is durable and the index is rebuilt on open.
    pub fn create_index(&self, field: &str) -> Result<bool> {
        let path = FieldPath::parse(field)?;
        self.ensure_open()?;
        if self.store.has_index(&path) {
            return Ok(false);
        }
        self.commit(|_, _| Ok(StagedCommit::from_changes(vec![Change::DefineIndex(path)])))?;
        info!(target: "vellum::db", field, "Index created");
        Ok(true)
    }

    /// Drop an index. Returns `false` if the path was not indexed.
    pub fn drop_index(&self, field: &str) -> Result<bool> {
        let path = FieldPath::parse(field)?;
        self.ensure_open()?;
        if !self.store.has_index(&path) {
            return Ok(false);
        }
        self.commit(|_, _| Ok(StagedCommit::from_changes(vec![Change::DropIndex(path)])))?;
        info!(target: "vellum::db", field, "Index dropped");
        Ok(true)
    }

    /// Indexed field paths in dotted form
    pub fn indexes(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self
            .store
            .index_paths()
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    fn writer(&self) -> Result<MappedMutexGuard<'_, Writer>> {
        MutexGuard::try_map(self.writer.lock(), Option::as_mut).map_err(|_| Error::Closed {
            name: self.name.clone(),
        })
    }

    /// Run one commit: stage, log, apply.
    fn commit<F>(&self, stage: F) -> Result<Revision>
    where
        F: FnOnce(&DocumentStore, Revision) -> Result<StagedCommit>,
    {
        let mut writer = self.writer()?;
        let revision = Revision::new(writer.wal.last_revision() + 1);

        let staged = match stage(&self.store, revision)
            .and_then(|staged| self.log(&mut writer, &staged.changes, revision).map(|_| staged))
        {
            Ok(staged) => staged,
            Err(e) => {
                self.coordinator.record_abort(&e);
                return Err(e);
            }
        };

        self.store.apply(staged.changes, revision);
        self.coordinator
            .record_commit(revision, staged.written, staged.deleted);
        self.maybe_compact(&mut writer);
        Ok(revision)
    }

    fn log(&self, writer: &mut Writer, changes: &[Change], revision: Revision) -> Result<()> {
        let body = record_body(&encode_changes(changes)?)?;
        let record = WalRecord::new(revision.as_u64(), body);
        writer.wal.append(&record)?;
        Ok(())
    }

    // ========================================================================
    // Compaction
    // ========================================================================

    /// Write a snapshot of the whole database and drop the WAL segments
    /// it covers.
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut writer = self.writer()?;
        self.compact_locked(&mut writer)
    }

    fn maybe_compact(&self, writer: &mut Writer) {
        let threshold = self.config.auto_compact_bytes;
        if threshold == 0 || writer.wal.total_size() < threshold {
            return;
        }
        // The triggering commit is already durable; a failed compaction
        // only leaves the WAL longer than it needs to be.
        if let Err(e) = self.compact_locked(writer) {
            warn!(target: "vellum::db", name = %self.name, error = %e, "Automatic compaction failed");
        }
    }

    fn compact_locked(&self, writer: &mut Writer) -> Result<CompactionStats> {
        let checkpoint = self.store.checkpoint();
        let documents = checkpoint.documents.len();
        let changes: Vec<Change> = checkpoint
            .indexes
            .into_iter()
            .map(Change::DefineIndex)
            .chain(checkpoint.documents.into_iter().map(Change::Put))
            .collect();
        let writeset = encode_changes(&changes)?;

        let snapshot_id = writer.next_snapshot_id;
        let info = write_snapshot(
            &self.paths.snapshot_dir(),
            snapshot_id,
            checkpoint.revision.as_u64(),
            &writeset,
        )?;
        writer.next_snapshot_id += 1;

        let segment = writer.wal.rotate()?;
        let segments_removed = writer.wal.remove_segments_before(segment)?;

        info!(
            target: "vellum::db",
            name = %self.name,
            snapshot_id,
            watermark = %checkpoint.revision,
            documents,
            segments_removed,
            "Compaction complete"
        );

        Ok(CompactionStats {
            snapshot_id,
            watermark: checkpoint.revision,
            documents,
            snapshot_bytes: info.size,
            segments_removed,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Force buffered WAL data to disk
    pub fn flush(&self) -> Result<()> {
        self.writer()?.wal.flush()?;
        Ok(())
    }

    /// WAL write and sync counters
    pub fn wal_counters(&self) -> Result<WalCounters> {
        Ok(self.writer()?.wal.counters())
    }

    /// Flush the WAL and release the database.
    ///
    /// Idempotent. Afterwards every operation on this handle, including
    /// iterating a result set obtained earlier, returns `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut slot = self.writer.lock();
        let Some(mut writer) = slot.take() else {
            return Ok(());
        };
        self.closed.store(true, Ordering::Release);

        let flushed = writer.wal.flush();
        let unlocked = writer.lock_file.unlock();
        drop(writer);
        registry::release(&self.root);
        drop(slot);

        info!(target: "vellum::db", name = %self.name, "Database closed");
        flushed?;
        unlocked?;
        Ok(())
    }

    /// Close this handle and remove every file of the database.
    pub fn delete_database(&self) -> Result<()> {
        self.close()?;
        self.store.clear();
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        info!(target: "vellum::db", name = %self.name, path = %self.root.display(), "Database deleted");
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "vellum::db", name = %self.name, error = %e, "Close on drop failed");
        }
    }
}

/// Database names become directory names, so they must be a single
/// path component.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("database name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_input(format!(
            "'{}' is not a valid database name",
            name
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::invalid_input(format!(
            "database name '{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

fn acquire_lock(path: &Path, name: &str) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;
    file.try_lock_exclusive().map_err(|_| Error::Locked {
        name: name.to_string(),
    })?;
    Ok(file)
}

fn recover_into(paths: &DatabasePaths, store: &DocumentStore) -> Result<RecoveryResult> {
    RecoveryCoordinator::new(paths.clone())
        .recover(
            |snapshot| {
                let watermark = Revision::new(snapshot.watermark());
                let changes = decode_writeset(snapshot.writeset)
                    .map_err(|e| RecoveryError::apply(e.to_string()))?;
                store.apply(changes, watermark);
                Ok(())
            },
            |record, writeset| {
                let changes = decode_writeset(writeset).map_err(|e| {
                    RecoveryError::apply(format!("revision {}: {}", record.revision, e))
                })?;
                store.apply(changes, Revision::new(record.revision));
                Ok(())
            },
        )
        .map_err(recovery_error)
}

fn recovery_error(error: RecoveryError) -> Error {
    match error {
        RecoveryError::Io(e)
        | RecoveryError::Snapshot(SnapshotReadError::Io(e))
        | RecoveryError::WalReader(WalReaderError::Io(e)) => Error::Io(e),
        other => Error::corruption(other.to_string()),
    }
}
