//! Reopen, recovery, locking and lifecycle

use crate::common::*;

#[test]
fn committed_writes_survive_reopen() {
    let mut t = TestDb::new();
    insert_employees(t.db(), 25);
    t.db().delete("5").unwrap();
    let before = full_scan(t.db());
    let revision = t.db().last_revision().unwrap();

    t.reopen();
    assert_eq!(full_scan(t.db()), before);
    assert_eq!(t.db().last_revision().unwrap(), revision);
}

#[test]
fn survives_without_close() {
    let mut t = TestDb::new();
    insert_employees(t.db(), 5);
    let before = full_scan(t.db());
    // Leak the handle: no close, no flush, as if the process died.
    if let Some(db) = t.db.take() {
        let root = db.path().to_path_buf();
        std::mem::forget(db);
        // The leaked handle still holds the process registry entry and the
        // file lock, so read the files through a copy of the directory.
        let copy = t.dir.path().join("copy.vellum");
        copy_dir(&root, &copy);
        std::fs::remove_file(copy.join(".lock")).ok();
    }
    let copy = Database::open("copy", t.config.clone()).unwrap();
    assert_eq!(full_scan(&copy), before);
}

fn copy_dir(from: &std::path::Path, to: &std::path::Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

#[test]
fn second_open_is_locked() {
    let t = TestDb::new();
    let err = Database::open("test", t.config.clone()).unwrap_err();
    assert!(matches!(err, Error::Locked { .. }));
}

#[test]
fn closed_handle_fails_every_operation() {
    let t = TestDb::new();
    insert_employees(t.db(), 3);
    t.db().close().unwrap();

    let db = t.db();
    assert!(db.get("1").unwrap_err().is_closed());
    assert!(db.save(&employee(9)).unwrap_err().is_closed());
    assert!(db.delete("1").unwrap_err().is_closed());
    assert!(db.count().unwrap_err().is_closed());
    assert!(db
        .query(&Query::select([SelectItem::id()]))
        .unwrap_err()
        .is_closed());
    assert!(db.close().is_ok());
}

#[test]
fn delete_database_removes_all_state() {
    let t = TestDb::new();
    insert_employees(t.db(), 10);
    let root = t.root();
    assert!(root.exists());

    t.db().delete_database().unwrap();
    assert!(!root.exists());

    let fresh = Database::open("test", t.config.clone()).unwrap();
    assert_eq!(fresh.count().unwrap(), 0);
    assert_eq!(fresh.last_revision().unwrap(), Revision::ZERO);
}

#[test]
fn buffered_durability_round_trips_through_close() {
    let mut t = TestDb::with_config(|c| c.with_durability(DurabilityMode::Buffered));
    insert_employees(t.db(), 10);
    t.db().save(&employee(99)).unwrap();
    let before = full_scan(t.db());
    t.db().close().unwrap();
    t.reopen();
    assert_eq!(full_scan(t.db()), before);
}

#[test]
fn auto_compaction_keeps_data() {
    let mut t = TestDb::with_config(|c| {
        c.with_auto_compact_bytes(4 * 1024)
            .with_wal_segment_size(4096)
    });
    for round in 0..20 {
        t.db()
            .run_batch((0..10).map(|i| {
                BatchOp::save(employee(i).with("round", round as i64))
            }))
            .unwrap();
    }
    let before = full_scan(t.db());
    t.reopen();
    assert!(t.db().recovery_result().snapshot_id.is_some());
    assert_eq!(full_scan(t.db()), before);
}

#[test]
fn open_under_a_regular_file_is_io() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("plain-file");
    std::fs::write(&file, b"occupied").unwrap();

    let err = Database::open("test", DatabaseConfig::new(file.clone())).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{:?}", err);
}

#[test]
fn failed_segment_rotation_leaves_no_trace() {
    let mut t = TestDb::with_config(|c| c.with_wal_segment_size(4096).with_auto_compact_bytes(0));
    let blocker = t.root().join("wal").join("wal-000002.seg");
    std::fs::write(&blocker, b"in the way").unwrap();

    let padding = "x".repeat(400);
    let mut failure = None;
    for i in 0..40 {
        let doc = Document::new(format!("doc-{}", i)).with("pad", padding.as_str());
        let count = t.db().count().unwrap();
        let revision = t.db().last_revision().unwrap();
        let scan = full_scan(t.db());
        if let Err(e) = t.db().save(&doc) {
            failure = Some((e, count, revision, scan));
            break;
        }
    }
    let (err, count, revision, scan) = failure.expect("rotation should have been attempted");
    assert!(matches!(err, Error::Io(_)), "{:?}", err);
    assert_eq!(t.db().count().unwrap(), count);
    assert_eq!(t.db().last_revision().unwrap(), revision);
    assert_eq!(full_scan(t.db()), scan);

    std::fs::remove_file(&blocker).unwrap();
    let next = t.db().save(&Document::new("small").with("n", 1)).unwrap();
    assert_eq!(next, revision.next());
    let scan = full_scan(t.db());
    assert_eq!(scan.len(), count + 1);

    t.reopen();
    assert_eq!(t.db().last_revision().unwrap(), next);
    assert_eq!(full_scan(t.db()), scan);
}
