//! Document round trips

use crate::common::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1e12f64..1e12).prop_map(Value::Float),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Object),
        ]
    })
}

fn document() -> impl Strategy<Value = Document> {
    (
        "[a-zA-Z0-9_-]{1,16}",
        prop::collection::btree_map("[a-z]{1,8}", value(), 0..6),
    )
        .prop_map(|(id, fields): (String, BTreeMap<String, Value>)| {
            Document::with_fields(id, fields)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn save_then_get_round_trips(docs in prop::collection::vec(document(), 1..12)) {
        let mut t = TestDb::new();
        let mut expected = BTreeMap::new();
        for doc in &docs {
            t.db().save(doc).unwrap();
            expected.insert(doc.id().to_string(), doc.clone());
        }
        for (id, doc) in &expected {
            prop_assert_eq!(&t.db().get(id).unwrap().unwrap(), doc);
        }

        t.reopen();
        for (id, doc) in &expected {
            prop_assert_eq!(&t.db().get(id).unwrap().unwrap(), doc);
        }
        prop_assert_eq!(t.db().count().unwrap(), expected.len());
    }
}

#[test]
fn delete_hides_document_from_get_and_scan() {
    let t = TestDb::new();
    insert_employees(t.db(), 5);
    t.db().delete("3").unwrap();

    assert!(t.db().get("3").unwrap().is_none());
    let ids: Vec<String> = full_scan(t.db()).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["0", "1", "2", "4"]);

    assert!(t.db().delete("3").unwrap_err().is_not_found());
}

#[test]
fn resave_replaces_entirely() {
    let t = TestDb::new();
    t.db()
        .save(&Document::new("a").with("x", 1).with("y", 2))
        .unwrap();
    t.db().save(&Document::new("a").with("z", 3)).unwrap();
    let doc = t.db().get("a").unwrap().unwrap();
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.get("z"), Some(&Value::Int(3)));
    assert!(!doc.contains("x"));
}

#[test]
fn resaving_same_content_is_idempotent() {
    let t = TestDb::new();
    insert_employees(t.db(), 10);
    let once = full_scan(t.db());
    insert_employees(t.db(), 10);
    assert_eq!(full_scan(t.db()), once);
}

#[test]
fn invalid_ids_rejected() {
    let t = TestDb::new();
    let err = t.db().save(&Document::new("")).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    let err = t.db().save(&Document::new("x".repeat(2000))).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(t.db().count().unwrap(), 0);
}

#[test]
fn json_bodies_round_trip_through_reopen() {
    let mut t = TestDb::new();
    let body = serde_json::json!({
        "name": "Foo1",
        "age": 21,
        "ratio": 0.75,
        "address": {"city": "Lisbon", "floor": 3},
        "tags": ["x", 1, null]
    });
    t.db()
        .save(&Document::from_json("j1", body.clone()).unwrap())
        .unwrap();
    t.reopen();
    assert_eq!(t.db().get("j1").unwrap().unwrap().to_json(), body);
}
