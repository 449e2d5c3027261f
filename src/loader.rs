use crate::error::IngestError;
use crate::types::{Advisory, Outcome, Table, Value};
use csv::ReaderBuilder;
use encoding_rs::SHIFT_JIS;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, warn};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Cell spellings read as missing.
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    ShiftJis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub encoding: SourceEncoding,
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub skipped_lines: usize,
}

/// Decode an uploaded CSV into a table.
///
/// UTF-8 (with or without BOM) is tried first, then Shift_JIS/CP932. Lines
/// with more fields than the header are skipped and reported through a
/// [`Advisory::MalformedLines`]; shorter lines are padded with missing cells.
/// Cell types are inferred per column: integer, float, or string.
pub fn ingest(bytes: &[u8]) -> Result<Outcome<(Table, LoadReport)>, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::Empty);
    }
    let (text, encoding) = decode(bytes)?;

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = dedupe_headers(rdr.headers()?.iter());
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::MissingHeader);
    }
    let width = headers.len();

    let mut total_rows = 0usize;
    let mut skipped_lines = 0usize;
    let mut raw: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                total_rows += 1;
                skipped_lines += 1;
                warn!("skipping unreadable line: {}", e);
                continue;
            }
        };
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        total_rows += 1;
        if record.len() > width {
            skipped_lines += 1;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            warn!(
                "skipping line {}: expected {} fields, saw {}",
                line,
                width,
                record.len()
            );
            continue;
        }
        raw.push(record.iter().map(str::to_string).collect());
    }

    let columns = infer_columns(&raw, width);
    let loaded_rows = raw.len();
    let mut rows: Vec<Vec<Value>> = vec![Vec::with_capacity(width); loaded_rows];
    for column in columns {
        for (row, v) in rows.iter_mut().zip(column) {
            row.push(v);
        }
    }
    let table = Table::with_rows(headers, rows);
    debug!(
        "ingested {} row(s) x {} column(s) as {:?}",
        loaded_rows, width, encoding
    );

    let report = LoadReport {
        encoding,
        total_rows,
        loaded_rows,
        skipped_lines,
    };
    let mut outcome = Outcome::new((table, report));
    if skipped_lines > 0 {
        outcome.note(Advisory::MalformedLines {
            skipped: skipped_lines,
        });
    }
    Ok(outcome)
}

fn decode(bytes: &[u8]) -> Result<(Cow<'_, str>, SourceEncoding), IngestError> {
    let body = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    if let Ok(s) = std::str::from_utf8(body) {
        return Ok((Cow::Borrowed(s), SourceEncoding::Utf8));
    }
    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| (text, SourceEncoding::ShiftJis))
        .ok_or(IngestError::Decode)
}

/// Repeated header names get a `.1`, `.2`, ... suffix.
fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .map(|h| {
            let count = seen.entry(h.to_string()).or_insert(0);
            let name = if *count == 0 {
                h.to_string()
            } else {
                format!("{}.{}", h, count)
            };
            *count += 1;
            name
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Text,
}

fn is_na(s: &str) -> bool {
    NA_TOKENS.contains(&s.trim())
}

fn infer_columns(raw: &[Vec<String>], width: usize) -> Vec<Vec<Value>> {
    (0..width)
        .map(|idx| {
            let cells: Vec<Option<&str>> = raw
                .iter()
                .map(|r| r.get(idx).map(String::as_str).filter(|s| !is_na(s)))
                .collect();
            let kind = cells.iter().flatten().fold(CellKind::Int, |kind, s| {
                let s = s.trim();
                match kind {
                    CellKind::Int if s.parse::<i64>().is_ok() => CellKind::Int,
                    CellKind::Int | CellKind::Float if s.parse::<f64>().is_ok() => CellKind::Float,
                    _ => CellKind::Text,
                }
            });
            cells
                .into_iter()
                .map(|cell| match (cell, kind) {
                    (None, _) => Value::Missing,
                    (Some(s), CellKind::Int) => s.trim().parse().map(Value::Int).unwrap_or_default(),
                    (Some(s), CellKind::Float) => s
                        .trim()
                        .parse::<f64>()
                        .map(Value::float)
                        .unwrap_or_default(),
                    (Some(s), CellKind::Text) => Value::Str(s.to_string()),
                })
                .collect()
        })
        .collect()
}
