use crate::types::{Table, Value};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub duplicates_removed: usize,
}

/// Concatenate tables over the union of their columns and drop exact
/// duplicate rows, keeping the first occurrence.
///
/// Columns appear in first-seen order; a column a source lacks becomes
/// missing cells for that source's rows. A column holding both integers and
/// floats across sources is widened to floats before comparing rows.
pub fn merge(tables: Vec<Table>) -> (Table, MergeReport) {
    let mut columns: Vec<String> = Vec::new();
    for t in &tables {
        for c in t.columns() {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for t in tables {
        let mapping: Vec<Option<usize>> = columns.iter().map(|c| t.column_index(c)).collect();
        for row in t.into_rows() {
            rows.push(
                mapping
                    .iter()
                    .map(|m| m.map(|i| row[i].clone()).unwrap_or_default())
                    .collect(),
            );
        }
    }

    widen_mixed_numeric(&mut rows, columns.len());

    let rows_before = rows.len();
    let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(rows_before);
    let mut merged = Table::new(columns);
    for row in rows {
        if seen.insert(row.clone()) {
            merged.push_row(row);
        }
    }
    let rows_after = merged.len();
    let report = MergeReport {
        rows_before,
        rows_after,
        duplicates_removed: rows_before - rows_after,
    };
    debug!(
        "merged {} row(s) into {} ({} duplicate(s) removed)",
        rows_before, rows_after, report.duplicates_removed
    );
    (merged, report)
}

fn widen_mixed_numeric(rows: &mut [Vec<Value>], width: usize) {
    for idx in 0..width {
        let has_float = rows.iter().any(|r| matches!(r[idx], Value::Float(_)));
        let has_int = rows.iter().any(|r| matches!(r[idx], Value::Int(_)));
        if has_float && has_int {
            for r in rows.iter_mut() {
                if let Value::Int(i) = r[idx] {
                    r[idx] = Value::Float(i as f64);
                }
            }
        }
    }
}
