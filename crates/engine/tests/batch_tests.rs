//! Batch atomicity tests
//!
//! A batch is all-or-nothing in memory (staging failures) and on disk
//! (a torn batch record is discarded by recovery).

use std::fs::OpenOptions;
use std::path::PathBuf;

use tempfile::TempDir;
use vellum_core::{Document, Error, Revision, Value};
use vellum_engine::{BatchOp, Database, DatabaseConfig, Query, SelectItem};

fn config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig::new(dir.path())
}

fn full_scan(db: &Database) -> Vec<(String, Value)> {
    db.query(&Query::select([SelectItem::id(), SelectItem::all()]))
        .unwrap()
        .map(|row| {
            let values = row.unwrap().into_values();
            (values[0].as_str().unwrap().to_string(), values[1].clone())
        })
        .collect()
}

fn last_segment(dir: &TempDir, name: &str) -> PathBuf {
    let wal = dir.path().join(format!("{}.vellum", name)).join("wal");
    let mut segments: Vec<PathBuf> = std::fs::read_dir(wal)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map_or(false, |e| e == "seg"))
        .collect();
    segments.sort();
    segments.pop().unwrap()
}

#[test]
fn failing_operation_aborts_whole_batch() {
    let dir = TempDir::new().unwrap();
    let db = Database::open("atomic", config(&dir)).unwrap();
    db.save(&Document::new("keep").with("v", 1)).unwrap();
    let before = full_scan(&db);
    let revision = db.last_revision().unwrap();

    let err = db
        .run_batch(vec![
            BatchOp::save(Document::new("a").with("v", 1)),
            BatchOp::save(Document::new("keep").with("v", 2)),
            BatchOp::delete("missing"),
            BatchOp::save(Document::new("b").with("v", 1)),
        ])
        .unwrap_err();

    match err {
        Error::Aborted { source, .. } => assert!(source.is_not_found()),
        other => panic!("expected Aborted, got {:?}", other),
    }
    assert_eq!(full_scan(&db), before);
    assert_eq!(db.last_revision().unwrap(), revision);
    assert!(db.get("a").unwrap().is_none());
}

#[test]
fn closure_error_aborts() {
    let dir = TempDir::new().unwrap();
    let db = Database::open("closure", config(&dir)).unwrap();
    let err = db
        .in_batch(|batch| {
            batch.save(Document::new("a"));
            Err(Error::invalid_input("changed my mind"))
        })
        .unwrap_err();
    assert!(err.is_aborted());
    assert_eq!(db.count().unwrap(), 0);
}

#[test]
fn batch_shares_one_revision() {
    let dir = TempDir::new().unwrap();
    let db = Database::open("shared", config(&dir)).unwrap();
    let revision = db
        .in_batch(|batch| {
            batch.save(Document::new("a")).save(Document::new("b"));
            Ok(())
        })
        .unwrap();
    assert_eq!(db.get("a").unwrap().unwrap().revision(), Some(revision));
    assert_eq!(db.get("b").unwrap().unwrap().revision(), Some(revision));

    assert_eq!(db.run_batch(Vec::new()).unwrap(), revision);
}

#[test]
fn later_ops_override_earlier_ones() {
    let dir = TempDir::new().unwrap();
    let db = Database::open("order", config(&dir)).unwrap();
    db.run_batch(vec![
        BatchOp::save(Document::new("a").with("v", 1)),
        BatchOp::save(Document::new("a").with("v", 2)),
        BatchOp::save(Document::new("b")),
        BatchOp::delete("b"),
    ])
    .unwrap();
    assert_eq!(db.get("a").unwrap().unwrap().get("v"), Some(&Value::Int(2)));
    assert!(db.get("b").unwrap().is_none());
}

#[test]
fn resaving_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = Database::open("idem", config(&dir)).unwrap();
    let doc = Document::new("a").with("name", "Foo").with("age", 30);
    db.save(&doc).unwrap();
    let once = full_scan(&db);
    db.save(&doc).unwrap();
    assert_eq!(full_scan(&db), once);
    assert_eq!(db.count().unwrap(), 1);
}

#[test]
fn torn_batch_record_is_discarded() {
    let dir = TempDir::new().unwrap();
    {
        let db = Database::open("torn", config(&dir)).unwrap();
        db.save(&Document::new("before").with("v", 1)).unwrap();
        db.run_batch((0..20).map(|i| BatchOp::save(Document::new(format!("b{}", i)).with("v", i))))
            .unwrap();
    }

    // Crash mid-write: the tail of the batch record never reached disk.
    let segment = last_segment(&dir, "torn");
    let len = std::fs::metadata(&segment).unwrap().len();
    let file = OpenOptions::new().write(true).open(&segment).unwrap();
    file.set_len(len - 7).unwrap();
    drop(file);

    let db = Database::open("torn", config(&dir)).unwrap();
    assert_eq!(db.ids().unwrap(), vec!["before".to_string()]);
    assert_eq!(db.last_revision().unwrap(), Revision::new(1));
    assert!(db.recovery_result().bytes_truncated > 0);

    // The log is usable again after the cut.
    let revision = db.save(&Document::new("after")).unwrap();
    assert_eq!(revision, Revision::new(2));
    drop(db);
    let db = Database::open("torn", config(&dir)).unwrap();
    assert_eq!(db.count().unwrap(), 2);
}
