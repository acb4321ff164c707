use proptest::prelude::*;
use proptest::test_runner::Config;

use rowscope_engine::matcher::condition_matches;
use rowscope_engine::{
    CellValue, ColumnDef, ColumnType, EngineError, FilterCondition, OperatorKind, PageRequest,
    Schema, Sort,
};
use rowscope_io::{Store, StoreError};

fn schema() -> Schema {
    Schema::new(vec![
        ColumnDef::new("payer", "Payer", ColumnType::Text).indexed(),
        ColumnDef::new("amount", "Amount", ColumnType::Number),
        ColumnDef::new("due", "Due", ColumnType::Date),
    ])
    .unwrap()
}

fn headers() -> Vec<String> {
    vec!["Payer".into(), "Amount".into(), "Due".into()]
}

fn load(rows: &[[&str; 3]]) -> Store {
    let mut store = Store::open_in_memory().unwrap();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect();
    store.replace_all(&schema(), &headers(), &rows).unwrap();
    store
}

fn numbered(n: usize) -> Store {
    let owned: Vec<[String; 3]> = (1..=n)
        .map(|i| [format!("p{i}"), i.to_string(), format!("2024-01-{:02}", i % 28 + 1)])
        .collect();
    let borrowed: Vec<[&str; 3]> = owned
        .iter()
        .map(|r| [r[0].as_str(), r[1].as_str(), r[2].as_str()])
        .collect();
    load(&borrowed)
}

fn amounts(rows: &[rowscope_engine::Row]) -> Vec<f64> {
    rows.iter()
        .filter_map(|r| r.get("amount").and_then(CellValue::as_number))
        .collect()
}

#[test]
fn pages_through_the_result() {
    let store = numbered(120);
    let schema = schema();
    let request = |page| PageRequest::new(vec![], vec![]).page(page, 50);

    let first = store.query_page(&schema, &request(1)).unwrap();
    assert_eq!(first.total, 120);
    assert_eq!(first.rows.len(), 50);
    assert_eq!(amounts(&first.rows)[0], 1.0);

    let third = store.query_page(&schema, &request(3)).unwrap();
    assert_eq!(third.total, 120);
    assert_eq!(amounts(&third.rows), (101..=120).map(f64::from).collect::<Vec<_>>());

    let past_end = store.query_page(&schema, &request(4)).unwrap();
    assert_eq!(past_end.total, 120);
    assert!(past_end.rows.is_empty());
}

#[test]
fn page_rows_follow_projection() {
    let store = numbered(3);
    let page = store
        .query_page(&schema(), &PageRequest::new(vec!["due".into(), "payer".into()], vec![]))
        .unwrap();
    assert_eq!(page.columns, vec!["due", "payer"]);
    let keys: Vec<&String> = page.rows[0].keys().collect();
    assert_eq!(keys, vec!["due", "payer"]);
}

#[test]
fn sort_with_insertion_tiebreak() {
    let store = load(&[
        ["b", "1", ""],
        ["a", "2", ""],
        ["b", "3", ""],
        ["a", "4", ""],
    ]);
    let page = store
        .query_page(
            &schema(),
            &PageRequest::new(vec![], vec![]).sorted(Sort::desc("payer")),
        )
        .unwrap();
    assert_eq!(amounts(&page.rows), vec![1.0, 3.0, 2.0, 4.0]);
}

#[test]
fn bad_requests_are_errors() {
    let store = numbered(3);
    let schema = schema();
    let err = store
        .query_page(&schema, &PageRequest::new(vec![], vec![]).page(0, 50))
        .unwrap_err();
    assert!(matches!(err, StoreError::Engine(EngineError::InvalidPage(0))));

    let err = store
        .query_page(
            &schema,
            &PageRequest::new(vec![], vec![FilterCondition::new("ghost", OperatorKind::Equals, "x")]),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Engine(EngineError::UnknownColumn(_))));
}

#[test]
fn between_and_in_filters() {
    let store = numbered(20);
    let schema = schema();

    let rows = store
        .query_all(
            &schema,
            &[],
            &[FilterCondition::range("amount", OperatorKind::Between, "5", "7")],
        )
        .unwrap();
    assert_eq!(amounts(&rows), vec![5.0, 6.0, 7.0]);

    let rows = store
        .query_all(
            &schema,
            &[],
            &[FilterCondition::new("payer", OperatorKind::In, "p2, p4 ,p9")],
        )
        .unwrap();
    assert_eq!(amounts(&rows), vec![2.0, 4.0, 9.0]);

    let rows = store
        .query_all(
            &schema,
            &[],
            &[FilterCondition::new("amount", OperatorKind::Gt, "abc")],
        )
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn unknown_operator_matches_nothing() {
    let store = numbered(5);
    let rows = store
        .query_all(
            &schema(),
            &[],
            &[FilterCondition::new("payer", OperatorKind::parse("sounds_like"), "p1")],
        )
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn replace_all_discards_previous_load() {
    let mut store = numbered(10);
    let schema = schema();
    store
        .replace_all(&schema, &headers(), &[vec!["solo".into(), "1".into(), "".into()]])
        .unwrap();
    let page = store.query_page(&schema, &PageRequest::new(vec![], vec![])).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0]["payer"], CellValue::from("solo"));
}

/// The SQL path and the in-memory matcher select the same rows, blanks included.
#[test]
fn sql_agrees_with_matcher() {
    let store = load(&[
        ["ACME", "10", "2024-01-05"],
        ["", "", "2024-01-20"],
        ["acme corp", "10,5", "2024-02-01"],
        ["Globex", "-3", "2024-03-01"],
        ["50%_off", "n/a", "2023-12-31"],
        ["Initech", "0", ""],
        ["12abc", "7", "2023-01-01"],
    ]);
    let schema = schema();
    let everything = store.query_all(&schema, &[], &[]).unwrap();

    let conditions = [
        FilterCondition::new("payer", OperatorKind::Equals, "ACME"),
        FilterCondition::new("payer", OperatorKind::NotEquals, "ACME"),
        FilterCondition::new("payer", OperatorKind::Contains, "acme"),
        FilterCondition::new("payer", OperatorKind::Contains, "%_"),
        FilterCondition::new("payer", OperatorKind::NotContains, "acme"),
        FilterCondition::new("payer", OperatorKind::In, "ACME,Globex"),
        FilterCondition::new("payer", OperatorKind::NotIn, "ACME,Globex"),
        FilterCondition::new("payer", OperatorKind::IsNull, ""),
        FilterCondition::new("payer", OperatorKind::IsNotNull, ""),
        FilterCondition::new("amount", OperatorKind::Gt, "0"),
        FilterCondition::new("amount", OperatorKind::Lte, "10"),
        FilterCondition::new("amount", OperatorKind::NotEquals, "10"),
        FilterCondition::range("amount", OperatorKind::Between, "-3", "10"),
        FilterCondition::new("amount", OperatorKind::IsNull, ""),
        FilterCondition::new("amount", OperatorKind::Equals, "10.0"),
        FilterCondition::new("amount", OperatorKind::Equals, "10.5"),
        FilterCondition::new("amount", OperatorKind::Equals, ""),
        FilterCondition::new("amount", OperatorKind::NotEquals, "n/a"),
        // Operators foreign to the column type match nothing on either path.
        FilterCondition::new("payer", OperatorKind::Gt, "-1"),
        FilterCondition::new("due", OperatorKind::Gt, "2000"),
        FilterCondition::new("amount", OperatorKind::Contains, "1"),
        FilterCondition::new("due", OperatorKind::DateAfter, "2024-01-05"),
        FilterCondition::new("due", OperatorKind::DateBefore, "2024-01-31"),
        FilterCondition::range("due", OperatorKind::DateBetween, "2024-01-01", "2024-02-28"),
    ];

    for cond in conditions {
        let from_sql = store.query_all(&schema, &[], std::slice::from_ref(&cond)).unwrap();
        let in_memory: Vec<_> = everything
            .iter()
            .filter(|row| condition_matches(&schema, &cond, row))
            .cloned()
            .collect();
        assert_eq!(from_sql, in_memory, "{cond:?}");
    }
}

proptest! {
    #![proptest_config(Config {
        cases: std::env::var("PROPTEST_CASES").ok().and_then(|s| s.parse().ok()).unwrap_or(64),
        failure_persistence: None,
        ..Config::default()
    })]

    /// Concatenating every page equals the unpaginated export, in order.
    #[test]
    fn pages_concatenate_to_export(
        n in 0usize..60,
        page_size in 1u64..17,
        low in 0i64..40,
        sort_by_payer in any::<bool>(),
    ) {
        let store = numbered(n);
        let schema = schema();
        let conditions = vec![FilterCondition::new("amount", OperatorKind::Gte, low.to_string())];
        let mut request = PageRequest::new(vec![], conditions.clone());
        if sort_by_payer {
            request = request.sorted(Sort::asc("payer"));
        }

        let mut swept = Vec::new();
        let mut page = 1;
        loop {
            let result = store.query_page(&schema, &request.clone().page(page, page_size)).unwrap();
            prop_assert!(result.rows.len() as u64 <= page_size);
            if result.rows.is_empty() {
                prop_assert_eq!(swept.len() as u64, result.total);
                break;
            }
            swept.extend(result.rows);
            page += 1;
        }

        let exported = store.query_all(&schema, &[], &conditions).unwrap();
        if sort_by_payer {
            // Same rows in another order; amounts are unique per row.
            let mut swept_amounts = amounts(&swept);
            let mut exported_amounts = amounts(&exported);
            swept_amounts.sort_by(f64::total_cmp);
            exported_amounts.sort_by(f64::total_cmp);
            prop_assert_eq!(swept.len(), exported.len());
            prop_assert_eq!(swept_amounts, exported_amounts);
        } else {
            prop_assert_eq!(swept, exported);
        }
    }
}
