//! Narrowing the canonical dataset to the current view.
use crate::error::InvalidColumnError;
use crate::types::{Advisory, Outcome, Table, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Inclusive date interval; an open end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start.map_or(true, |s| d >= s) && self.end.map_or(true, |e| d <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    pub column: String,
    pub range: DateRange,
}

/// The user's current selections.
///
/// An empty value set for a column means "no filter on that column", not
/// "no rows".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPredicates {
    pub categories: BTreeMap<String, BTreeSet<String>>,
    pub date: Option<DateFilter>,
}

impl FilterPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories
            .insert(column.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_date_range(mut self, column: &str, range: DateRange) -> Self {
        self.date = Some(DateFilter {
            column: column.to_string(),
            range,
        });
        self
    }
}

/// Apply category and date predicates, returning a new table.
///
/// Category cells are compared by their display text. With a date filter
/// active, rows lacking a date are dropped; if the table has no valid dates
/// at all, the date filter is skipped with [`Advisory::NoDateData`].
pub fn filter(table: &Table, predicates: &FilterPredicates) -> Outcome<Table> {
    let mut out = Outcome::new(());
    let mut checks: Vec<(usize, &BTreeSet<String>)> = Vec::new();
    for (column, selected) in &predicates.categories {
        if selected.is_empty() {
            continue;
        }
        match table.column_index(column) {
            Some(idx) => checks.push((idx, selected)),
            None => out.note(Advisory::UnknownFilterColumn {
                column: column.clone(),
            }),
        }
    }

    let mut date_check: Option<(usize, DateRange)> = None;
    if let Some(df) = &predicates.date {
        let idx = table
            .column_index(&df.column)
            .filter(|&i| table.column_values(i).any(|v| v.as_date().is_some()));
        match idx {
            Some(i) => date_check = Some((i, df.range)),
            None => out.note(Advisory::NoDateData {
                column: df.column.clone(),
            }),
        }
    }

    let view = table.filter_rows(|row| {
        checks
            .iter()
            .all(|(idx, selected)| selected.contains(&row[*idx].to_string()))
            && date_check.map_or(true, |(idx, range)| {
                row[idx].as_date().is_some_and(|d| range.contains(d))
            })
    });
    debug!("filter kept {} of {} row(s)", view.len(), table.len());
    out.map(|_| view)
}

/// Distinct non-blank values of `column` as display text, sorted where the
/// values are comparable.
pub fn distinct_values(table: &Table, column: &str) -> Result<Vec<String>, InvalidColumnError> {
    let idx = table.require(column)?;
    let mut seen: HashSet<&Value> = HashSet::new();
    let mut values: Vec<&Value> = table
        .column_values(idx)
        .filter(|v| !v.is_blank() && seen.insert(*v))
        .collect();
    values.sort_by(|a, b| a.sort_cmp(b).unwrap_or(Ordering::Equal));
    Ok(values.into_iter().map(Value::to_string).collect())
}

/// Earliest and latest date in `column`.
pub fn date_bounds(table: &Table, column: &str) -> Option<(NaiveDate, NaiveDate)> {
    let idx = table.column_index(column)?;
    let mut dates = table.column_values(idx).filter_map(Value::as_date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}
