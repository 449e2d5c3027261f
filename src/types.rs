use crate::error::InvalidColumnError;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::warn;

/// A single cell.
///
/// Missing values are explicit: every row of a [`Table`] carries one cell per
/// column.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Missing,
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Finite numeric view of the cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Float cell, or missing for non-finite input.
    pub fn float(f: f64) -> Value {
        if f.is_finite() {
            Value::Float(f)
        } else {
            Value::Missing
        }
    }

    pub fn from_option(v: Option<f64>) -> Value {
        v.map(Value::float).unwrap_or(Value::Missing)
    }

    /// Missing, or a string that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Str(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Ordering between comparable cells; `None` across kinds or for missing.
    pub fn sort_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

fn canonical_bits(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Missing, Value::Missing) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Missing => {}
            Value::Int(i) => i.hash(state),
            Value::Float(f) => canonical_bits(*f).hash(state),
            Value::Str(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::float(f)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// Ordered rows over a named column set.
///
/// Every row holds exactly `columns().len()` cells; the constructors pad short
/// rows with [`Value::Missing`] and drop surplus cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of `name`, or an [`InvalidColumnError`] naming it.
    pub fn require(&self, name: &str) -> Result<usize, InvalidColumnError> {
        self.column_index(name)
            .ok_or_else(|| InvalidColumnError::new(name))
    }

    /// Names from `names` this table lacks, in the given order.
    pub fn missing_columns(&self, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .filter(|n| !self.has_column(n))
            .map(|n| n.to_string())
            .collect()
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Missing);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// Replace the column called `name`, appending it when absent.
    ///
    /// `values` is padded or truncated to the row count.
    pub fn set_column(&mut self, name: &str, mut values: Vec<Value>) {
        values.resize(self.rows.len(), Value::Missing);
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// New table holding the rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| keep(r.as_slice()))
                .cloned()
                .collect(),
        }
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut [Value]> + '_ {
        self.rows.iter_mut().map(|r| r.as_mut_slice())
    }
}

/// Non-fatal signal attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    MalformedLines { skipped: usize },
    DateParseFailures {
        column: String,
        newly_missing: usize,
        attempted: usize,
    },
    HighMissingRate {
        column: String,
        missing: usize,
        total: usize,
    },
    ZeroVariance { column: String },
    NoDateData { column: String },
    UnknownFilterColumn { column: String },
    EmptyResult { what: String },
    NotComputable { what: String, reason: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::MalformedLines { skipped } => {
                write!(f, "{} malformed line(s) skipped", skipped)
            }
            Advisory::DateParseFailures {
                column,
                newly_missing,
                attempted,
            } => write!(
                f,
                "{}: {} of {} value(s) could not be parsed as dates",
                column, newly_missing, attempted
            ),
            Advisory::HighMissingRate {
                column,
                missing,
                total,
            } => write!(f, "{}: {} of {} value(s) missing", column, missing, total),
            Advisory::ZeroVariance { column } => {
                write!(f, "{}: zero variance, left unscaled", column)
            }
            Advisory::NoDateData { column } => {
                write!(f, "{}: no valid dates, date filter not applied", column)
            }
            Advisory::UnknownFilterColumn { column } => {
                write!(f, "{}: column not present, filter ignored", column)
            }
            Advisory::EmptyResult { what } => write!(f, "{}: no data", what),
            Advisory::NotComputable { what, reason } => {
                write!(f, "{}: not computable ({})", what, reason)
            }
        }
    }
}

/// A result plus the advisories raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub advisories: Vec<Advisory>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            advisories: Vec::new(),
        }
    }

    /// Record an advisory and log it.
    pub fn note(&mut self, advisory: Advisory) {
        warn!("{}", advisory);
        self.advisories.push(advisory);
    }

    pub fn absorb<U>(&mut self, other: Outcome<U>) -> U {
        self.advisories.extend(other.advisories);
        other.value
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            advisories: self.advisories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rows_are_padded_to_column_count() {
        let t = Table::with_rows(cols(&["a", "b", "c"]), vec![vec![Value::Int(1)]]);
        assert_eq!(t.rows()[0], vec![Value::Int(1), Value::Missing, Value::Missing]);
    }

    #[test]
    fn set_column_appends_then_replaces() {
        let mut t = Table::with_rows(cols(&["a"]), vec![vec![1i64.into()], vec![2i64.into()]]);
        t.set_column("b", vec![Value::from("x")]);
        assert_eq!(t.columns(), &cols(&["a", "b"])[..]);
        assert_eq!(t.get(1, "b"), Some(&Value::Missing));
        t.set_column("a", vec![Value::Int(9), Value::Int(8)]);
        assert_eq!(t.get(1, "a"), Some(&Value::Int(8)));
    }

    #[test]
    fn float_equality_treats_signed_zero_as_equal() {
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn non_finite_float_becomes_missing() {
        assert_eq!(Value::float(f64::INFINITY), Value::Missing);
        assert_eq!(Value::from(f64::NAN), Value::Missing);
    }

    #[test]
    fn require_reports_column_name() {
        let t = Table::new(cols(&["a"]));
        assert_eq!(t.require("zz").unwrap_err().column, "zz");
    }
}
