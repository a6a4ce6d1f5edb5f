//! All-or-nothing batches

use crate::common::*;

#[test]
fn forced_failure_mid_batch_restores_pre_batch_state() {
    let t = TestDb::new();
    insert_employees(t.db(), 10);
    let before = full_scan(t.db());
    let revision = t.db().last_revision().unwrap();

    let mut ops: Vec<BatchOp> = (10..20).map(|i| BatchOp::save(employee(i))).collect();
    ops.insert(5, BatchOp::delete("no-such-document"));
    ops.push(BatchOp::delete("0"));

    let err = t.db().run_batch(ops).unwrap_err();
    assert!(err.is_aborted());
    assert_eq!(full_scan(t.db()), before);
    assert_eq!(t.db().last_revision().unwrap(), revision);

    // Nothing of the failed batch reached the log either.
    let mut t = t;
    t.reopen();
    assert_eq!(full_scan(t.db()), before);
}

#[test]
fn batch_of_saves_and_deletes() {
    let t = TestDb::new();
    insert_employees(t.db(), 10);
    t.db()
        .in_batch(|batch| {
            for i in 0..10 {
                batch.delete(i.to_string());
            }
            batch.save(employee(42));
            Ok(())
        })
        .unwrap();
    assert_eq!(t.db().ids().unwrap(), vec!["42".to_string()]);
}

#[test]
fn torn_batch_on_disk_is_all_or_nothing() {
    let mut t = TestDb::new();
    insert_employees(t.db(), 3);
    let before = full_scan(t.db());
    t.db()
        .run_batch((100..150).map(|i| BatchOp::save(employee(i))))
        .unwrap();
    t.db = None;

    // Cut the batch record in half, as a crash during the write would.
    let segment = t.last_segment();
    let len = std::fs::metadata(&segment).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&segment).unwrap();
    file.set_len(len - 200).unwrap();
    drop(file);

    t.reopen();
    assert_eq!(full_scan(t.db()), before);
}
