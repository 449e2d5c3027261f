use chrono::{Duration, NaiveDate};
use event_report::filter::filter;
use event_report::merge::merge;
use event_report::{DateRange, FilterPredicates, Table, Value};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

const TEAMS: [&str; 4] = ["営業", "開発", "人事", "総務"];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn row_strategy() -> impl Strategy<Value = Vec<Value>> {
    (0..TEAMS.len(), proptest::option::of(0i64..60), 0i64..50).prop_map(|(team, day, n)| {
        vec![
            Value::from(TEAMS[team]),
            day.map(|d| Value::Date(base_date() + Duration::days(d)))
                .unwrap_or(Value::Missing),
            Value::Int(n),
        ]
    })
}

fn table_strategy() -> impl Strategy<Value = Table> {
    proptest::collection::vec(row_strategy(), 0..25).prop_map(|rows| {
        Table::with_rows(
            vec!["チーム".into(), "実施日".into(), "参加者数".into()],
            rows,
        )
    })
}

fn venue_table_strategy() -> impl Strategy<Value = Table> {
    proptest::collection::vec((0..TEAMS.len(), 0i64..50, 0usize..3), 0..25).prop_map(|rows| {
        let rows = rows
            .into_iter()
            .map(|(team, n, venue)| {
                vec![
                    Value::from(TEAMS[team]),
                    Value::Int(n),
                    Value::from(["本社", "支社", "オンライン"][venue]),
                ]
            })
            .collect();
        Table::with_rows(vec!["チーム".into(), "参加者数".into(), "会場".into()], rows)
    })
}

/// Rows keyed by column name, so tables with different column order compare.
fn named_rows(t: &Table) -> HashSet<BTreeMap<String, Value>> {
    t.rows()
        .iter()
        .map(|r| t.columns().iter().cloned().zip(r.iter().cloned()).collect())
        .collect()
}

fn predicate_strategy() -> impl Strategy<Value = FilterPredicates> {
    (
        proptest::sample::subsequence(TEAMS.to_vec(), 0..=TEAMS.len()),
        proptest::option::of((0i64..60, 0i64..30)),
    )
        .prop_map(|(teams, range)| {
            let mut p = FilterPredicates::new().with_category("チーム", teams);
            if let Some((start, len)) = range {
                let start = base_date() + Duration::days(start);
                p = p.with_date_range(
                    "実施日",
                    DateRange::new(Some(start), Some(start + Duration::days(len))),
                );
            }
            p
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn filtering_is_idempotent(table in table_strategy(), p in predicate_strategy()) {
        let once = filter(&table, &p).value;
        let twice = filter(&once, &p).value;
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn empty_team_selection_keeps_every_team(table in table_strategy()) {
        let p = FilterPredicates::new().with_category("チーム", Vec::<String>::new());
        prop_assert_eq!(filter(&table, &p).value, table);
    }

    #[test]
    fn merge_order_does_not_change_the_row_set(a in table_strategy(), b in table_strategy()) {
        let (ab, ab_report) = merge(vec![a.clone(), b.clone()]);
        let (ba, ba_report) = merge(vec![b, a]);
        let set = |t: &Table| t.rows().iter().cloned().collect::<HashSet<_>>();
        prop_assert_eq!(set(&ab), set(&ba));
        prop_assert_eq!(ab_report.rows_after, ba_report.rows_after);
        prop_assert_eq!(ab.len(), set(&ab).len());
    }

    #[test]
    fn merge_order_does_not_matter_across_column_sets(
        a in table_strategy(),
        b in venue_table_strategy(),
    ) {
        let (ab, ab_report) = merge(vec![a.clone(), b.clone()]);
        let (ba, ba_report) = merge(vec![b, a]);
        prop_assert_eq!(ab.columns().len(), 4);
        prop_assert_eq!(named_rows(&ab), named_rows(&ba));
        prop_assert_eq!(ab_report.rows_after, ba_report.rows_after);
        prop_assert_eq!(ab.len(), named_rows(&ab).len());
    }
}
