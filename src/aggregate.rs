//! Grouped statistics, pivots, resampling, rankings and correlation over the
//! current view.
//!
//! Every function reads its input table and returns a new one; missing
//! columns are reported as [`InvalidColumnError`] and data-quality problems
//! as advisories on the [`Outcome`].
use crate::config::PipelineConfig;
use crate::error::InvalidColumnError;
use crate::types::{Advisory, Outcome, Table, Value};
use crate::util::{mean, median, std_dev, weekday_position, VARIANCE_EPSILON};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Mean,
    Sum,
    Median,
    Max,
    Min,
    Count,
}

impl Stat {
    pub fn name(self) -> &'static str {
        match self {
            Stat::Mean => "mean",
            Stat::Sum => "sum",
            Stat::Median => "median",
            Stat::Max => "max",
            Stat::Min => "min",
            Stat::Count => "count",
        }
    }

    /// Apply to the non-missing values of one group.
    pub fn apply(self, values: &[f64]) -> Value {
        match self {
            Stat::Count => Value::Int(values.len() as i64),
            Stat::Sum => Value::float(values.iter().sum()),
            Stat::Mean => Value::from_option(mean(values)),
            Stat::Median => Value::from_option(median(values.to_vec())),
            Stat::Max => Value::from_option(values.iter().copied().reduce(f64::max)),
            Stat::Min => Value::from_option(values.iter().copied().reduce(f64::min)),
        }
    }

    /// Result column name, e.g. `参加者数_mean`.
    pub fn column_name(self, source: &str) -> String {
        format!("{}_{}", source, self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Compare for this order, missing values last either way.
    fn compare(self, a: &Value, b: &Value) -> Ordering {
        match (a.is_missing(), b.is_missing()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = a.sort_cmp(b).unwrap_or(Ordering::Equal);
                match self {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            }
        }
    }
}

/// One grouped-statistics call.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub target: String,
    pub group_by: Vec<String>,
    pub stats: Vec<Stat>,
    /// z-score cutoff; rows at or beyond it are dropped before grouping.
    pub exclude_outliers: Option<f64>,
    /// Sort groups by the first statistic.
    pub order: Option<SortOrder>,
    pub top_n: Option<usize>,
}

impl AggregationRequest {
    pub fn new(target: &str, group_by: &[&str], stats: &[Stat]) -> Self {
        Self {
            target: target.to_string(),
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            stats: stats.to_vec(),
            exclude_outliers: None,
            order: None,
            top_n: None,
        }
    }

    /// Group means and counts of `value`, best `top_n` first.
    pub fn ranking(group: &str, value: &str, top_n: usize, order: SortOrder) -> Self {
        Self::new(value, &[group], &[Stat::Mean, Stat::Count])
            .sorted(order)
            .top(top_n)
    }

    pub fn excluding_outliers(mut self, z_cutoff: f64) -> Self {
        self.exclude_outliers = Some(z_cutoff);
        self
    }

    /// Switch on outlier exclusion at `outlier_z` when the config asks for it.
    pub fn configured(self, config: &PipelineConfig) -> Self {
        if config.exclude_outliers {
            self.excluding_outliers(config.outlier_z)
        } else {
            self
        }
    }

    pub fn sorted(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn top(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }
}

/// Rows grouped by key in first-encounter order. Rows with a missing key
/// cell are left out.
fn group_rows(table: &Table, keys: &[usize]) -> Vec<(Vec<Value>, Vec<usize>)> {
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    for (i, row) in table.rows().iter().enumerate() {
        let key: Vec<Value> = keys.iter().map(|&k| row[k].clone()).collect();
        if key.iter().any(Value::is_missing) {
            continue;
        }
        match index.get(&key) {
            Some(&g) => groups[g].1.push(i),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![i]));
            }
        }
    }
    groups
}

fn numbers(table: &Table, rows: &[usize], column: usize) -> Vec<f64> {
    rows.iter()
        .filter_map(|&r| table.rows()[r][column].as_f64())
        .collect()
}

/// Grouped statistics, one result column per requested statistic.
pub fn aggregate(
    table: &Table,
    request: &AggregationRequest,
) -> Result<Outcome<Table>, InvalidColumnError> {
    table.require(&request.target)?;
    let key_idx = request
        .group_by
        .iter()
        .map(|g| table.require(g))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Outcome::new(());
    let filtered;
    let source = match request.exclude_outliers {
        Some(z) => {
            filtered = out.absorb(exclude_outliers(table, &request.target, z)?);
            &filtered
        }
        None => table,
    };
    let target = source.require(&request.target)?;

    let stats: &[Stat] = if request.stats.is_empty() {
        &[Stat::Mean]
    } else {
        &request.stats
    };
    let mut columns = request.group_by.clone();
    columns.extend(stats.iter().map(|s| s.column_name(&request.target)));

    let mut rows: Vec<Vec<Value>> = group_rows(source, &key_idx)
        .into_iter()
        .map(|(mut key, members)| {
            let values = numbers(source, &members, target);
            key.extend(stats.iter().map(|s| s.apply(&values)));
            key
        })
        .collect();

    if let Some(order) = request.order {
        let stat_col = request.group_by.len();
        rows.sort_by(|a, b| order.compare(&a[stat_col], &b[stat_col]));
    }
    if let Some(n) = request.top_n {
        rows.truncate(n);
    }
    if rows.is_empty() {
        out.note(Advisory::EmptyResult {
            what: format!("{} by {}", request.target, request.group_by.join(", ")),
        });
    }
    debug!("aggregated {} into {} group(s)", request.target, rows.len());
    Ok(out.map(|_| Table::with_rows(columns, rows)))
}

/// Keep rows whose z-score on `column` is within `cutoff`.
///
/// Uses the sample standard deviation. Rows with a missing value are
/// dropped. With no variance the table comes back unchanged alongside
/// [`Advisory::ZeroVariance`].
pub fn exclude_outliers(
    table: &Table,
    column: &str,
    cutoff: f64,
) -> Result<Outcome<Table>, InvalidColumnError> {
    let idx = table.require(column)?;
    let values: Vec<f64> = table.column_values(idx).filter_map(Value::as_f64).collect();
    let mut out = Outcome::new(());
    let (m, sd) = match (mean(&values), std_dev(&values, 1)) {
        (Some(m), Some(sd)) if sd > VARIANCE_EPSILON => (m, sd),
        _ => {
            out.note(Advisory::ZeroVariance {
                column: column.to_string(),
            });
            return Ok(out.map(|_| table.clone()));
        }
    };
    let kept = table.filter_rows(|r| {
        r[idx]
            .as_f64()
            .is_some_and(|v| ((v - m) / sd).abs() < cutoff)
    });
    debug!(
        "outlier exclusion on {} kept {} of {} row(s)",
        column,
        kept.len(),
        table.len()
    );
    Ok(out.map(|_| kept))
}

/// Distinct non-missing keys, sorted when comparable, else first-seen order.
fn sorted_keys(table: &Table, idx: usize) -> Vec<Value> {
    let mut keys: Vec<Value> = Vec::new();
    for v in table.column_values(idx) {
        if !v.is_missing() && !keys.contains(v) {
            keys.push(v.clone());
        }
    }
    keys.sort_by(|a, b| a.sort_cmp(b).unwrap_or(Ordering::Equal));
    keys
}

struct Pivot {
    row_keys: Vec<Value>,
    col_keys: Vec<Value>,
    cells: Vec<Vec<Value>>,
}

fn pivot(table: &Table, row: usize, col: usize, value: usize, stat: Stat) -> Pivot {
    let row_keys = sorted_keys(table, row);
    let col_keys = sorted_keys(table, col);
    let mut buckets: HashMap<(&Value, &Value), Vec<f64>> = HashMap::new();
    for r in table.rows() {
        if r[row].is_missing() || r[col].is_missing() {
            continue;
        }
        let entry = buckets.entry((&r[row], &r[col])).or_default();
        if let Some(v) = r[value].as_f64() {
            entry.push(v);
        }
    }
    let cells = row_keys
        .iter()
        .map(|rk| {
            col_keys
                .iter()
                .map(|ck| match buckets.get(&(rk, ck)) {
                    Some(values) => stat.apply(values),
                    None => Value::Missing,
                })
                .collect()
        })
        .collect();
    Pivot {
        row_keys,
        col_keys,
        cells,
    }
}

impl Pivot {
    /// Flatten into a table whose first column holds the row keys and whose
    /// remaining headers are the column keys' display text.
    fn into_table(self, row_header: &str) -> Table {
        let mut columns = vec![row_header.to_string()];
        columns.extend(self.col_keys.iter().map(Value::to_string));
        let rows = self
            .row_keys
            .into_iter()
            .zip(self.cells)
            .map(|(key, cells)| {
                let mut r = vec![key];
                r.extend(cells);
                r
            })
            .collect();
        Table::with_rows(columns, rows)
    }

    fn is_empty(&self) -> bool {
        self.row_keys.is_empty() || self.col_keys.is_empty()
    }
}

/// Two-way pivot of `value` by `rows` x `columns`.
pub fn crosstab(
    table: &Table,
    rows: &str,
    columns: &str,
    value: &str,
    stat: Stat,
) -> Result<Outcome<Table>, InvalidColumnError> {
    let (r, c, v) = (table.require(rows)?, table.require(columns)?, table.require(value)?);
    let mut out = Outcome::new(());
    let p = pivot(table, r, c, v, stat);
    if p.is_empty() {
        out.note(Advisory::EmptyResult {
            what: format!("{} x {}", rows, columns),
        });
    }
    Ok(out.map(|_| p.into_table(rows)))
}

/// Time-slot x weekday pivot with weekday columns in Monday..Sunday order.
///
/// Weekdays absent from the data are not emitted; labels that are not
/// weekdays are dropped. With `normalize`, every cell becomes
/// `(cell - grand mean) / grand std-dev` over the whole grid (population
/// std-dev); zero spread leaves the grid as-is with an advisory.
pub fn heatmap(
    table: &Table,
    slot: &str,
    weekday: &str,
    value: &str,
    stat: Stat,
    normalize: bool,
) -> Result<Outcome<Table>, InvalidColumnError> {
    let (r, c, v) = (table.require(slot)?, table.require(weekday)?, table.require(value)?);
    let mut out = Outcome::new(());
    let mut p = pivot(table, r, c, v, stat);

    let mut order: Vec<(usize, usize)> = p
        .col_keys
        .iter()
        .enumerate()
        .filter_map(|(i, k)| weekday_position(&k.to_string()).map(|pos| (pos, i)))
        .collect();
    order.sort_by_key(|&(pos, _)| pos);
    p.col_keys = order.iter().map(|&(_, i)| p.col_keys[i].clone()).collect();
    p.cells = p
        .cells
        .iter()
        .map(|row| order.iter().map(|&(_, i)| row[i].clone()).collect())
        .collect();

    if p.is_empty() {
        out.note(Advisory::EmptyResult {
            what: format!("{} x {}", slot, weekday),
        });
    } else if normalize {
        let values: Vec<f64> = p.cells.iter().flatten().filter_map(Value::as_f64).collect();
        match (mean(&values), std_dev(&values, 0)) {
            (Some(m), Some(sd)) if sd > VARIANCE_EPSILON => {
                for cell in p.cells.iter_mut().flatten() {
                    if let Some(x) = cell.as_f64() {
                        *cell = Value::float((x - m) / sd);
                    }
                }
            }
            _ => out.note(Advisory::ZeroVariance {
                column: value.to_string(),
            }),
        }
    }
    Ok(out.map(|_| p.into_table(slot)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Label of the bucket containing `d`: the day itself, the Sunday ending
    /// its week, or the last day of its month.
    pub fn bucket(self, d: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => d,
            Period::Week => d + Duration::days(6 - d.weekday().num_days_from_monday() as i64),
            Period::Month => month_end(d.year(), d.month()),
        }
    }

    fn next(self, label: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => label + Duration::days(1),
            Period::Week => label + Duration::days(7),
            Period::Month => {
                let (y, m) = if label.month() == 12 {
                    (label.year() + 1, 1)
                } else {
                    (label.year(), label.month() + 1)
                };
                month_end(y, m)
            }
        }
    }
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Column holding the moving average in [`resample`] output.
pub fn moving_average_column(value: &str) -> String {
    format!("{}_moving_avg", value)
}

/// Mean of `value` per period, plus a trailing moving average over `window`
/// periods.
///
/// Periods run contiguously from the first to the last observation; a
/// period with no observations has a missing mean. The moving average uses
/// whatever observations fall in the window, so the first points average
/// over fewer periods. With `group_by`, the series is built per non-blank
/// group value in first-seen order, and the group column leads the output.
pub fn resample(
    table: &Table,
    date: &str,
    value: &str,
    period: Period,
    window: usize,
    group_by: Option<&str>,
) -> Result<Outcome<Table>, InvalidColumnError> {
    let d = table.require(date)?;
    let v = table.require(value)?;
    let g = group_by.map(|name| table.require(name)).transpose()?;
    let window = window.max(1);

    let mut columns = Vec::new();
    if let Some(name) = group_by {
        columns.push(name.to_string());
    }
    columns.extend([date.to_string(), value.to_string(), moving_average_column(value)]);

    let groups: Vec<(Option<Value>, Vec<usize>)> = match g {
        Some(gi) => group_rows(table, &[gi])
            .into_iter()
            .filter(|(key, _)| !key[0].is_blank())
            .map(|(mut key, rows)| (key.pop(), rows))
            .collect(),
        None => vec![(None, (0..table.len()).collect())],
    };

    let mut out = Outcome::new(());
    let mut rows = Vec::new();
    for (key, members) in groups {
        let mut buckets: HashMap<NaiveDate, Vec<f64>> = HashMap::new();
        for &r in &members {
            let row = &table.rows()[r];
            if let (Some(day), Some(x)) = (row[d].as_date(), row[v].as_f64()) {
                buckets.entry(period.bucket(day)).or_default().push(x);
            }
        }
        let (Some(&first), Some(&last)) = (buckets.keys().min(), buckets.keys().max()) else {
            continue;
        };
        let mut labels = vec![first];
        while let Some(&l) = labels.last() {
            if l >= last {
                break;
            }
            labels.push(period.next(l));
        }
        let means: Vec<Option<f64>> = labels
            .iter()
            .map(|l| buckets.get(l).and_then(|xs| mean(xs)))
            .collect();
        for (i, label) in labels.iter().enumerate() {
            let start = (i + 1).saturating_sub(window);
            let in_window: Vec<f64> = means[start..=i].iter().flatten().copied().collect();
            let mut r = Vec::with_capacity(4);
            if let Some(k) = &key {
                r.push(k.clone());
            }
            r.push(Value::Date(*label));
            r.push(Value::from_option(means[i]));
            r.push(Value::from_option(mean(&in_window)));
            rows.push(r);
        }
    }
    if rows.is_empty() {
        out.note(Advisory::EmptyResult {
            what: format!("{} over {}", value, date),
        });
    }
    Ok(out.map(|_| Table::with_rows(columns, rows)))
}

/// Groups ranked by mean of `value`, with counts, cut to `top_n`.
///
/// The sort is stable: groups with equal means keep first-seen order.
pub fn rank(
    table: &Table,
    group: &str,
    value: &str,
    top_n: usize,
    order: SortOrder,
) -> Result<Outcome<Table>, InvalidColumnError> {
    aggregate(table, &AggregationRequest::ranking(group, value, top_n, order))
}

/// The `n` rows with the largest (or smallest) `column`, rows where it is
/// missing left out. Ties keep table order.
pub fn top_rows(
    table: &Table,
    column: &str,
    n: usize,
    order: SortOrder,
) -> Result<Table, InvalidColumnError> {
    let idx = table.require(column)?;
    let mut rows: Vec<Vec<Value>> = table
        .rows()
        .iter()
        .filter(|r| r[idx].as_f64().is_some())
        .cloned()
        .collect();
    rows.sort_by(|a, b| order.compare(&a[idx], &b[idx]));
    rows.truncate(n);
    Ok(Table::with_rows(table.columns().to_vec(), rows))
}

/// Keep only the named columns, in the given order, skipping absent ones.
pub fn select(table: &Table, columns: &[&str]) -> Table {
    let picks: Vec<(usize, &str)> = columns
        .iter()
        .filter_map(|c| table.column_index(c).map(|i| (i, *c)))
        .collect();
    Table::with_rows(
        picks.iter().map(|(_, c)| c.to_string()).collect(),
        table
            .rows()
            .iter()
            .map(|r| picks.iter().map(|&(i, _)| r[i].clone()).collect())
            .collect(),
    )
}

/// Reorder a table whose first column holds weekday labels into
/// Monday..Sunday, dropping rows that are not weekdays.
pub fn reorder_weekdays(table: &Table) -> Table {
    let mut keyed: Vec<(usize, Vec<Value>)> = table
        .rows()
        .iter()
        .filter_map(|r| weekday_position(&r[0].to_string()).map(|p| (p, r.clone())))
        .collect();
    keyed.sort_by_key(|(p, _)| *p);
    Table::with_rows(
        table.columns().to_vec(),
        keyed.into_iter().map(|(_, r)| r).collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correlation {
    Computed { r: f64, n: usize },
    NotComputable { reason: String, n: usize },
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Computed { r, .. } => Some(*r),
            Correlation::NotComputable { .. } => None,
        }
    }
}

/// Pearson correlation over rows where both columns are numeric.
pub fn correlation(
    table: &Table,
    a: &str,
    b: &str,
    min_points: usize,
) -> Result<Correlation, InvalidColumnError> {
    let (ai, bi) = (table.require(a)?, table.require(b)?);
    let pairs: Vec<(f64, f64)> = table
        .rows()
        .iter()
        .filter_map(|r| Some((r[ai].as_f64()?, r[bi].as_f64()?)))
        .collect();
    let n = pairs.len();
    if n < min_points.max(2) {
        return Ok(Correlation::NotComputable {
            reason: format!("only {} paired value(s)", n),
            n,
        });
    }
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx.sqrt() <= VARIANCE_EPSILON || syy.sqrt() <= VARIANCE_EPSILON {
        return Ok(Correlation::NotComputable {
            reason: "zero variance".to_string(),
            n,
        });
    }
    let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
    Ok(Correlation::Computed { r, n })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(cols: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::with_rows(cols.iter().map(|s| s.to_string()).collect(), rows)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn teams() -> Table {
        table(
            &["チーム", "参加者数"],
            vec![
                vec!["A".into(), Value::Int(10)],
                vec!["B".into(), Value::Int(30)],
                vec!["C".into(), Value::Int(20)],
                vec!["A".into(), Value::Int(10)],
                vec![Value::Missing, Value::Int(99)],
            ],
        )
    }

    #[test]
    fn several_statistics_become_separate_columns() {
        let req = AggregationRequest::new("参加者数", &["チーム"], &[Stat::Sum, Stat::Count]);
        let out = aggregate(&teams(), &req).unwrap().value;
        assert_eq!(
            out.columns(),
            &["チーム".to_string(), "参加者数_sum".into(), "参加者数_count".into()][..]
        );
        assert_eq!(out.rows()[0], vec!["A".into(), Value::Float(20.0), Value::Int(2)]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn median_max_min() {
        let t = table(
            &["g", "x"],
            vec![
                vec!["a".into(), Value::Int(1)],
                vec!["a".into(), Value::Int(5)],
                vec!["a".into(), Value::Int(3)],
                vec!["a".into(), Value::Missing],
            ],
        );
        let req = AggregationRequest::new("x", &["g"], &[Stat::Median, Stat::Max, Stat::Min]);
        let out = aggregate(&t, &req).unwrap().value;
        assert_eq!(
            out.rows()[0],
            vec!["a".into(), Value::Float(3.0), Value::Float(5.0), Value::Float(1.0)]
        );
    }

    #[test]
    fn unknown_column_is_rejected() {
        let req = AggregationRequest::new("満足度", &["チーム"], &[Stat::Mean]);
        assert_eq!(
            aggregate(&teams(), &req).unwrap_err(),
            InvalidColumnError::new("満足度")
        );
    }

    #[test]
    fn ranking_descending_top_three() {
        let out = rank(&teams(), "チーム", "参加者数", 3, SortOrder::Descending)
            .unwrap()
            .value;
        let means: Vec<Value> = out.rows().iter().map(|r| r[1].clone()).collect();
        assert_eq!(
            means,
            vec![Value::Float(30.0), Value::Float(20.0), Value::Float(10.0)]
        );
    }

    #[test]
    fn ranking_ties_keep_encounter_order() {
        let t = table(
            &["g", "x"],
            vec![
                vec!["z".into(), Value::Int(5)],
                vec!["y".into(), Value::Int(5)],
                vec!["x".into(), Value::Int(5)],
            ],
        );
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let out = rank(&t, "g", "x", 10, order).unwrap().value;
            let keys: Vec<String> = out.rows().iter().map(|r| r[0].to_string()).collect();
            assert_eq!(keys, vec!["z", "y", "x"]);
        }
    }

    #[test]
    fn constant_column_skips_outlier_exclusion() {
        let t = table(&["x"], vec![vec![Value::Int(7)]; 5]);
        let out = exclude_outliers(&t, "x", PipelineConfig::default().outlier_z).unwrap();
        assert_eq!(out.value, t);
        assert_eq!(out.advisories, vec![Advisory::ZeroVariance { column: "x".into() }]);
    }

    fn with_spike() -> Table {
        let mut rows: Vec<Vec<Value>> = (0..20)
            .map(|i| vec!["A".into(), Value::Int(10 + i % 3)])
            .collect();
        rows.push(vec!["A".into(), Value::Int(1000)]);
        table(&["g", "x"], rows)
    }

    #[test]
    fn outlier_is_dropped() {
        let out = exclude_outliers(&with_spike(), "x", 3.0).unwrap();
        assert_eq!(out.value.len(), 20);
        assert!(out.advisories.is_empty());
    }

    #[test]
    fn aggregate_ignores_outliers_when_asked() {
        let req = AggregationRequest::new("x", &["g"], &[Stat::Max, Stat::Count]);
        let all = aggregate(&with_spike(), &req).unwrap().value;
        assert_eq!(all.rows(), &[vec!["A".into(), Value::Float(1000.0), Value::Int(21)]][..]);

        let trimmed = aggregate(&with_spike(), &req.excluding_outliers(3.0)).unwrap().value;
        assert_eq!(trimmed.rows(), &[vec!["A".into(), Value::Float(12.0), Value::Int(20)]][..]);
    }

    #[test]
    fn configured_request_follows_the_switch() {
        let req = AggregationRequest::ranking("g", "x", 5, SortOrder::Descending);
        let mut config = PipelineConfig::default();
        assert_eq!(req.clone().configured(&config).exclude_outliers, None);
        config.exclude_outliers = true;
        config.outlier_z = 2.5;
        assert_eq!(req.configured(&config).exclude_outliers, Some(2.5));
    }

    #[test]
    fn crosstab_flattens_headers() {
        let t = table(
            &["チーム", "曜日", "参加者数"],
            vec![
                vec!["A".into(), "月".into(), Value::Int(10)],
                vec!["A".into(), "月".into(), Value::Int(20)],
                vec!["B".into(), "火".into(), Value::Int(5)],
            ],
        );
        let out = crosstab(&t, "チーム", "曜日", "参加者数", Stat::Mean).unwrap().value;
        assert_eq!(out.columns(), &["チーム".to_string(), "月".into(), "火".into()][..]);
        assert_eq!(out.rows()[0], vec!["A".into(), Value::Float(15.0), Value::Missing]);
        assert_eq!(out.rows()[1], vec!["B".into(), Value::Missing, Value::Float(5.0)]);
    }

    #[test]
    fn heatmap_orders_weekdays_and_sorts_slots() {
        let t = table(
            &["時間帯スロット", "曜日", "参加者数"],
            vec![
                vec!["14:00".into(), "金".into(), Value::Int(4)],
                vec!["10:00".into(), "月".into(), Value::Int(2)],
                vec!["10:00".into(), "水".into(), Value::Int(6)],
            ],
        );
        let out = heatmap(&t, "時間帯スロット", "曜日", "参加者数", Stat::Sum, false)
            .unwrap()
            .value;
        assert_eq!(
            out.columns(),
            &["時間帯スロット".to_string(), "月".into(), "水".into(), "金".into()][..]
        );
        assert_eq!(out.rows()[0][0], Value::from("10:00"));

        let norm = heatmap(&t, "時間帯スロット", "曜日", "参加者数", Stat::Sum, true)
            .unwrap()
            .value;
        // cells 2, 6, 4: mean 4, population std-dev sqrt(8/3)
        let sd = (8.0f64 / 3.0).sqrt();
        assert_eq!(norm.rows()[0][1], Value::Float(-2.0 / sd));
        assert_eq!(norm.rows()[1][3], Value::Float(0.0));
    }

    #[test]
    fn heatmap_normalization_needs_spread() {
        let t = table(
            &["s", "w", "x"],
            vec![
                vec!["a".into(), "Mon".into(), Value::Int(3)],
                vec!["b".into(), "Tue".into(), Value::Int(3)],
            ],
        );
        let out = heatmap(&t, "s", "w", "x", Stat::Mean, true).unwrap();
        assert_eq!(out.advisories, vec![Advisory::ZeroVariance { column: "x".into() }]);
        assert_eq!(out.value.rows()[0][1], Value::Float(3.0));
    }

    #[test]
    fn weekly_buckets_end_on_sunday() {
        assert_eq!(Period::Week.bucket(date(2024, 5, 1)), date(2024, 5, 5));
        assert_eq!(Period::Week.bucket(date(2024, 5, 5)), date(2024, 5, 5));
        assert_eq!(Period::Month.bucket(date(2024, 2, 10)), date(2024, 2, 29));
        assert_eq!(Period::Month.next(date(2024, 12, 31)), date(2025, 1, 31));
    }

    #[test]
    fn resample_fills_gaps_and_allows_partial_windows() {
        let t = table(
            &["実施日", "参加者数"],
            vec![
                vec![date(2024, 1, 1).into(), Value::Int(10)],
                vec![date(2024, 1, 1).into(), Value::Int(20)],
                vec![date(2024, 1, 3).into(), Value::Int(30)],
            ],
        );
        let out = resample(&t, "実施日", "参加者数", Period::Day, 2, None)
            .unwrap()
            .value;
        assert_eq!(
            out.rows(),
            &[
                vec![date(2024, 1, 1).into(), Value::Float(15.0), Value::Float(15.0)],
                vec![date(2024, 1, 2).into(), Value::Missing, Value::Float(15.0)],
                vec![date(2024, 1, 3).into(), Value::Float(30.0), Value::Float(30.0)],
            ][..]
        );
    }

    #[test]
    fn resample_per_group_skips_blank_groups() {
        let t = table(
            &["チーム", "実施日", "参加者数"],
            vec![
                vec!["A".into(), date(2024, 1, 1).into(), Value::Int(1)],
                vec!["  ".into(), date(2024, 1, 1).into(), Value::Int(2)],
                vec!["B".into(), date(2024, 2, 1).into(), Value::Int(3)],
            ],
        );
        let out = resample(&t, "実施日", "参加者数", Period::Month, 3, Some("チーム"))
            .unwrap()
            .value;
        assert_eq!(out.columns()[0], "チーム");
        let keys: Vec<String> = out.rows().iter().map(|r| r[0].to_string()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn correlation_cases() {
        let t = table(
            &["a", "b", "c"],
            vec![
                vec![Value::Int(1), Value::Int(2), Value::Int(5)],
                vec![Value::Int(2), Value::Int(4), Value::Int(5)],
                vec![Value::Int(3), Value::Int(6), Value::Int(5)],
                vec![Value::Int(4), Value::Missing, Value::Int(5)],
            ],
        );
        match correlation(&t, "a", "b", 3).unwrap() {
            Correlation::Computed { r, n } => {
                assert!((r - 1.0).abs() < 1e-12);
                assert_eq!(n, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            correlation(&t, "a", "c", 3).unwrap(),
            Correlation::NotComputable { .. }
        ));
        assert!(matches!(
            correlation(&t, "a", "b", 4).unwrap(),
            Correlation::NotComputable { n: 3, .. }
        ));
    }

    #[test]
    fn top_rows_drops_missing() {
        let t = table(
            &["x"],
            vec![vec![Value::Int(1)], vec![Value::Missing], vec![Value::Int(3)]],
        );
        let out = top_rows(&t, "x", 5, SortOrder::Descending).unwrap();
        assert_eq!(out.rows(), &[vec![Value::Int(3)], vec![Value::Int(1)]][..]);
    }
}
