//! Column typing and derived columns.
//!
//! Each step only touches columns that exist; a table without, say, a date
//! column passes through that step unchanged.
use crate::config::PipelineConfig;
use crate::types::{Advisory, Outcome, Table, Value};
use crate::util::{parse_date_safe, parse_f64_safe, weekday_label};
use tracing::debug;

/// Type the recognised columns and add the derived ones.
///
/// Order: dates, numeric counts, ratio columns, weekday (when only a date is
/// available), then time-slot expansion.
pub fn normalize(table: Table, config: &PipelineConfig) -> Outcome<Table> {
    let mut out = Outcome::new(table);
    parse_dates(&mut out, config);
    coerce_numeric(&mut out, config);
    add_ratios(&mut out.value, config);
    derive_weekday(&mut out.value, config);
    let table = std::mem::take(&mut out.value);
    out.value = expand_slots(table, config);
    debug!(
        "normalized table: {} row(s), {} column(s)",
        out.value.len(),
        out.value.columns().len()
    );
    out
}

fn parse_dates(out: &mut Outcome<Table>, config: &PipelineConfig) {
    let name = &config.columns.date;
    let Some(idx) = out.value.column_index(name) else {
        return;
    };
    let mut attempted = 0usize;
    let mut newly_missing = 0usize;
    for row in out.value.rows_mut() {
        let parsed = match &row[idx] {
            Value::Missing => continue,
            Value::Date(d) => Some(*d),
            Value::Str(s) => parse_date_safe(Some(s.as_str())),
            Value::Int(i) => parse_date_safe(Some(i.to_string().as_str())),
            Value::Float(_) => None,
        };
        attempted += 1;
        row[idx] = match parsed {
            Some(d) => Value::Date(d),
            None => {
                newly_missing += 1;
                Value::Missing
            }
        };
    }
    if attempted > 0
        && newly_missing as f64 / attempted as f64 > config.date_failure_warn_ratio
    {
        out.note(Advisory::DateParseFailures {
            column: name.clone(),
            newly_missing,
            attempted,
        });
    }
}

fn coerce_numeric(out: &mut Outcome<Table>, config: &PipelineConfig) {
    let total = out.value.len();
    for name in config.columns.numeric() {
        let Some(idx) = out.value.column_index(name) else {
            continue;
        };
        let mut missing = 0usize;
        for row in out.value.rows_mut() {
            let v = match &row[idx] {
                Value::Int(i) => Value::Int(*i),
                Value::Float(f) => Value::float(*f),
                Value::Str(s) => Value::from_option(parse_f64_safe(Some(s.as_str()))),
                Value::Missing | Value::Date(_) => Value::Missing,
            };
            if v.is_missing() {
                missing += 1;
            }
            row[idx] = v;
        }
        if total > 0 && missing as f64 / total as f64 > config.numeric_missing_warn_ratio {
            out.note(Advisory::HighMissingRate {
                column: name.to_string(),
                missing,
                total,
            });
        }
    }
}

/// `numerator / denominator * scale`, missing when either side is missing
/// or the denominator is zero.
pub fn ratio(numerator: &Value, denominator: &Value, scale: f64) -> Value {
    match (numerator.as_f64(), denominator.as_f64()) {
        (Some(n), Some(d)) if d != 0.0 => Value::float(n / d * scale),
        _ => Value::Missing,
    }
}

fn add_ratios(table: &mut Table, config: &PipelineConfig) {
    let c = &config.columns;
    let specs = [
        (&c.participation_rate, &c.attendees, &c.applications, 100.0),
        (&c.satisfaction_rate, &c.satisfied, &c.attendees, 100.0),
        (&c.reaction_rate, &c.reactions, &c.attendees, 1.0),
    ];
    for (target, num, den, scale) in specs {
        let (Some(ni), Some(di)) = (table.column_index(num), table.column_index(den)) else {
            continue;
        };
        let values: Vec<Value> = table
            .rows()
            .iter()
            .map(|r| ratio(&r[ni], &r[di], scale))
            .collect();
        table.set_column(target, values);
    }
}

fn derive_weekday(table: &mut Table, config: &PipelineConfig) {
    let c = &config.columns;
    if table.has_column(&c.weekday) {
        return;
    }
    let Some(idx) = table.column_index(&c.date) else {
        return;
    };
    let values: Vec<Value> = table
        .column_values(idx)
        .map(|v| match v.as_date() {
            Some(d) => Value::from(weekday_label(d)),
            None => Value::Missing,
        })
        .collect();
    table.set_column(&c.weekday, values);
}

fn split_slot(value: &Value, separators: &[String]) -> Vec<Value> {
    let Some(s) = value.as_str() else {
        return vec![value.clone()];
    };
    let mut pieces = vec![s];
    for sep in separators.iter().filter(|s| !s.is_empty()) {
        pieces = pieces.into_iter().flat_map(|p| p.split(sep.as_str())).collect();
    }
    let pieces: Vec<Value> = pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Value::from)
        .collect();
    if pieces.is_empty() {
        vec![Value::Missing]
    } else {
        pieces
    }
}

/// One row per time slot.
///
/// Expands the slot column in place when present; otherwise expands the raw
/// slot column into a new slot column, keeping the raw one.
fn expand_slots(table: Table, config: &PipelineConfig) -> Table {
    let c = &config.columns;
    let (source, append) = match (
        table.column_index(&c.time_slot),
        table.column_index(&c.time_slot_raw),
    ) {
        (Some(i), _) => (i, false),
        (None, Some(i)) => (i, true),
        (None, None) => return table,
    };
    let mut columns = table.columns().to_vec();
    if append {
        columns.push(c.time_slot.clone());
    }
    let mut out = Table::new(columns);
    for row in table.into_rows() {
        for piece in split_slot(&row[source], &config.slot_separators) {
            let mut r = row.clone();
            if append {
                r.push(piece);
            } else {
                r[source] = piece;
            }
            out.push_row(r);
        }
    }
    out
}
