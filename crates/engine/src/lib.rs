//! Database engine for Vellum
//!
//! This crate ties the lower layers together:
//! - Database: open/close, document reads and writes, compaction
//! - Batch: atomic multi-document commits
//! - Query: predicate filtering, projection and aggregates, with index
//!   probes when a field index can answer the leading conjunct
//!
//! The engine is the only component that knows about both the WAL
//! (`vellum-durability`) and the in-memory store (`vellum-storage`): every
//! commit is logged first and applied second.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod coordinator;
pub mod database;
pub mod query;

pub use batch::{Batch, BatchOp};
pub use coordinator::{CommitCoordinator, CommitMetrics};
pub use database::{CompactionStats, Database, DatabaseConfig, CONFIG_FILE_NAME};
pub use query::{Aggregate, Plan, Predicate, Query, ResultSet, Row, SelectItem};
