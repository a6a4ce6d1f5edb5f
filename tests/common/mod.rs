//! Shared test utilities for the integration suite.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub use tempfile::TempDir;
pub use vellum::{
    Aggregate, BatchOp, Database, DatabaseConfig, Document, DurabilityMode, Error, Predicate,
    Query, Revision, SelectItem, Value,
};

static TRACING: Once = Once::new();

/// Route engine logs to the test harness; `RUST_LOG=vellum=debug` shows them.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Database in a temporary directory that can be closed and reopened.
pub struct TestDb {
    pub db: Option<Database>,
    pub dir: TempDir,
    pub name: String,
    pub config: DatabaseConfig,
}

impl TestDb {
    /// Fresh database with default (always-fsync) durability
    pub fn new() -> Self {
        Self::with_config(|c| c)
    }

    /// Fresh database with a customized config
    pub fn with_config(customize: impl FnOnce(DatabaseConfig) -> DatabaseConfig) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("temp dir");
        let config = customize(DatabaseConfig::new(dir.path()));
        let db = Database::open("test", config.clone()).expect("open");
        TestDb {
            db: Some(db),
            dir,
            name: "test".to_string(),
            config,
        }
    }

    /// The open handle
    pub fn db(&self) -> &Database {
        self.db.as_ref().expect("database is open")
    }

    /// Drop the handle and open the database again
    pub fn reopen(&mut self) {
        self.db = None;
        self.db = Some(Database::open(&self.name, self.config.clone()).expect("reopen"));
    }

    /// Directory of the database
    pub fn root(&self) -> PathBuf {
        self.dir.path().join(format!("{}.vellum", self.name))
    }

    /// Newest WAL segment file
    pub fn last_segment(&self) -> PathBuf {
        let mut segments: Vec<PathBuf> = std::fs::read_dir(self.root().join("wal"))
            .expect("wal dir")
            .map(|e| e.expect("entry").path())
            .filter(|p| p.extension().map_or(false, |e| e == "seg"))
            .collect();
        segments.sort();
        segments.pop().expect("at least one segment")
    }
}

/// Employee document used by the benchmark scenarios
pub fn employee(i: i64) -> Document {
    Document::new(i.to_string())
        .with("name", format!("Foo{}", i))
        .with("age", 20 + i)
        .with("hired", i % 2 == 0)
}

/// Save `count` employees in one batch
pub fn insert_employees(db: &Database, count: i64) -> Revision {
    db.run_batch((0..count).map(|i| BatchOp::save(employee(i))))
        .expect("batch")
}

/// Ids and full bodies of every document, via a full-scan query
pub fn full_scan(db: &Database) -> Vec<(String, Value)> {
    db.query(&Query::select([SelectItem::id(), SelectItem::all()]))
        .expect("query")
        .map(|row| {
            let mut values = row.expect("row").into_values();
            let body = values.pop().expect("body");
            let id = values.pop().expect("id");
            (id.as_str().expect("string id").to_string(), body)
        })
        .collect()
}

/// Ids returned by a query whose first column is the id
pub fn query_ids(db: &Database, query: &Query) -> Vec<String> {
    db.query(query)
        .expect("query")
        .map(|row| {
            row.expect("row")
                .get(0)
                .and_then(Value::as_str)
                .expect("id column")
                .to_string()
        })
        .collect()
}

/// Single value of a one-row, one-column aggregate query
pub fn aggregate(db: &Database, aggregate: Aggregate, filter: Option<Predicate>) -> Value {
    let mut query = Query::select([aggregate]);
    if let Some(p) = filter {
        query = query.filter(p);
    }
    let rows = db.query(&query).expect("query").all().expect("rows");
    assert_eq!(rows.len(), 1);
    rows[0].get(0).cloned().expect("value")
}
