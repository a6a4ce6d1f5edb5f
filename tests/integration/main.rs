//! Integration Tests
//!
//! Scenario tests through the public `vellum` API, organized by concern:
//! - crud: save/get/delete round trips and idempotence
//! - batches: all-or-nothing batch commits
//! - queries: predicates, projections and aggregates
//! - durability: reopen, crash recovery, locking, lifecycle

#[path = "../common/mod.rs"]
mod common;

mod batches;
mod crud;
mod durability;
mod queries;
