//! Vellum - embedded document database
//!
//! Vellum stores schema-less documents under string ids, commits single
//! writes and multi-document batches atomically and durably, and answers
//! declarative queries: a predicate tree over document fields, a select
//! list of columns, or aggregates over the matching documents.
//!
//! # Quick Start
//!
//! ```ignore
//! use vellum::{Database, DatabaseConfig, Document, Predicate, Query, SelectItem};
//!
//! let db = Database::open("employees", DatabaseConfig::new("/var/lib/app"))?;
//!
//! db.in_batch(|batch| {
//!     for i in 0..10 {
//!         batch.save(
//!             Document::new(i.to_string())
//!                 .with("name", format!("Foo{}", i))
//!                 .with("age", 20 + i)
//!                 .with("hired", i % 2 == 0),
//!         );
//!     }
//!     Ok(())
//! })?;
//!
//! let query = Query::select([SelectItem::id(), SelectItem::all()]).filter(
//!     Predicate::equals("hired", false)
//!         .and(Predicate::between("age", 20, 50))
//!         .and(Predicate::equals("name", "Foo1")),
//! );
//! for row in db.query(&query)? {
//!     println!("{:?}", row?.get(0));
//! }
//! ```
//!
//! # Architecture
//!
//! - `vellum-core`: values, documents, field paths, revisions, errors
//! - `vellum-durability`: write-ahead log, snapshots, recovery
//! - `vellum-storage`: in-memory document map and field indexes
//! - `vellum-engine`: the [`Database`] handle, batches and queries
//!
//! Only the types needed to use a database are re-exported here.

pub use vellum_core::{Document, Error, ErrorKind, FieldPath, Result, Revision, Value, ValueKind};
pub use vellum_durability::{DurabilityMode, RecoveryResult, WalCounters};
pub use vellum_engine::{
    Aggregate, Batch, BatchOp, CommitMetrics, CompactionStats, Database, DatabaseConfig, Plan,
    Predicate, Query, ResultSet, Row, SelectItem, CONFIG_FILE_NAME,
};
