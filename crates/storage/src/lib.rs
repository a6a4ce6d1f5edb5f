//! In-memory storage layer for Vellum
//!
//! This crate holds the live database state:
//! - DocumentStore: id-ordered document map behind a `parking_lot::RwLock`
//! - FieldIndex: secondary indexes from field value to document ids
//! - DocumentSnapshot: immutable point-in-time read views
//!
//! Durability is not handled here; the engine logs each commit to the WAL
//! before applying it to the store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod snapshot;
pub mod store;

pub use index::{FieldIndex, IndexKey};
pub use snapshot::DocumentSnapshot;
pub use store::{Change, DocumentStore, StoreCheckpoint};
