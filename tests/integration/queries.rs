//! Predicates, projections and aggregates

use crate::common::*;

#[test]
fn foo1_scenario() {
    let t = TestDb::new();
    insert_employees(t.db(), 10);
    let query = Query::select([SelectItem::id(), SelectItem::all()]).filter(
        Predicate::equals("hired", false)
            .and(Predicate::between("age", 20, 50))
            .and(Predicate::equals("name", "Foo1")),
    );
    assert_eq!(query_ids(t.db(), &query), vec!["1"]);
}

#[test]
fn between_and_intersection_over_hundred_documents() {
    let t = TestDb::new();
    t.db()
        .run_batch((0..100i64).map(|i| {
            let age = 18 + (i * 13 + 7) % 43;
            let name = if i == 37 { "Foo0".to_string() } else { format!("Foo{}", i + 100) };
            BatchOp::save(
                Document::new(format!("e{:03}", i))
                    .with("name", name)
                    .with("age", age)
                    .with("hired", i % 2 == 1),
            )
        }))
        .unwrap();

    let ages: Vec<(String, i64)> = (0..100i64)
        .map(|i| (format!("e{:03}", i), 18 + (i * 13 + 7) % 43))
        .collect();
    let expected: Vec<String> = ages
        .iter()
        .filter(|(_, age)| (20..=50).contains(age))
        .map(|(id, _)| id.clone())
        .collect();
    let between = Query::select([SelectItem::id()]).filter(Predicate::between("age", 20, 50));
    assert_eq!(query_ids(t.db(), &between), expected);

    // e037: age 18 + (481 + 7) % 43 = 18 + 15 = 33, hired, named Foo0
    let all_three = Query::select([SelectItem::id()]).filter(
        Predicate::equals("hired", true)
            .and(Predicate::between("age", 20, 50))
            .and(Predicate::equals("name", "Foo0")),
    );
    assert_eq!(query_ids(t.db(), &all_three), vec!["e037"]);
}

#[test]
fn sum_and_count() {
    let t = TestDb::new();
    insert_employees(t.db(), 20);
    let expected: i64 = (0..20).map(|i| 20 + i).sum();
    assert_eq!(aggregate(t.db(), Aggregate::sum("age"), None), Value::Int(expected));
    assert_eq!(aggregate(t.db(), Aggregate::count(), None), Value::Int(20));
    assert_eq!(
        aggregate(
            t.db(),
            Aggregate::sum("age"),
            Some(Predicate::less_than("age", 25))
        ),
        Value::Int(20 + 21 + 22 + 23 + 24)
    );
}

#[test]
fn aggregates_over_empty_set_are_zero() {
    let t = TestDb::new();
    insert_employees(t.db(), 10);
    for i in 0..10 {
        t.db().delete(&i.to_string()).unwrap();
    }
    assert_eq!(aggregate(t.db(), Aggregate::sum("age"), None), Value::Int(0));
    assert_eq!(aggregate(t.db(), Aggregate::count(), None), Value::Int(0));
}

#[test]
fn indexed_queries_agree_with_scans() {
    let t = TestDb::new();
    insert_employees(t.db(), 50);
    let queries = vec![
        Query::select([SelectItem::id()]).filter(Predicate::between("age", 30, 40)),
        Query::select([SelectItem::id()])
            .filter(Predicate::greater_than("age", 60).and(Predicate::equals("hired", true))),
        Query::select([SelectItem::id()]).filter(Predicate::equals("name", "Foo7")),
    ];
    let scanned: Vec<Vec<String>> = queries.iter().map(|q| query_ids(t.db(), q)).collect();

    t.db().create_index("age").unwrap();
    t.db().create_index("name").unwrap();
    for (query, expected) in queries.iter().zip(&scanned) {
        assert!(query.explain(t.db()).unwrap().uses_index());
        assert_eq!(&query_ids(t.db(), query), expected);
    }
}
