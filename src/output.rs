use crate::error::OutputError;
use crate::reports::ReportSections;
use crate::types::Table;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style};
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write a table as CSV, prefixed with a UTF-8 BOM so spreadsheet tools
/// pick the right encoding.
pub fn write_csv_to<W: Write>(mut writer: W, table: &Table) -> Result<(), OutputError> {
    writer.write_all(UTF8_BOM)?;
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv(path: impl AsRef<Path>, table: &Table) -> Result<(), OutputError> {
    let file = std::fs::File::create(path)?;
    write_csv_to(std::io::BufWriter::new(file), table)
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), OutputError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write each available report table as `<dir>/<section>.csv` plus the whole
/// report as `<dir>/report.json`. Returns the files written.
pub fn export_report(
    dir: impl AsRef<Path>,
    report: &ReportSections,
) -> Result<Vec<PathBuf>, OutputError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (name, section) in report.tables() {
        if let Some(table) = section.ready() {
            let path = dir.join(format!("{}.csv", name));
            write_csv(&path, table)?;
            written.push(path);
        }
    }
    let path = dir.join("report.json");
    write_json(&path, report)?;
    written.push(path);
    info!("exported {} file(s) to {}", written.len(), dir.display());
    Ok(written)
}

/// Markdown rendering of the first `max_rows` rows.
pub fn render_table(table: &Table, max_rows: usize) -> String {
    if table.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(table.columns().iter().cloned());
    for row in table.rows().iter().take(max_rows) {
        builder.push_record(row.iter().map(|v| v.to_string()));
    }
    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    rendered.to_string()
}

pub fn preview_table(title: &str, note: Option<&str>, table: &Table, max_rows: usize) {
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", render_table(table, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use chrono::NaiveDate;

    fn sample() -> Table {
        Table::with_rows(
            vec!["チーム".into(), "参加率".into(), "実施日".into()],
            vec![
                vec![
                    "営業".into(),
                    Value::Float(80.0),
                    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().into(),
                ],
                vec!["開発".into(), Value::Missing, Value::Missing],
            ],
        )
    }

    #[test]
    fn csv_starts_with_bom_and_is_reproducible() {
        let mut a = Vec::new();
        write_csv_to(&mut a, &sample()).unwrap();
        let mut b = Vec::new();
        write_csv_to(&mut b, &sample()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(UTF8_BOM));
        let text = String::from_utf8(a[3..].to_vec()).unwrap();
        assert_eq!(text, "チーム,参加率,実施日\n営業,80.0,2024-04-01\n開発,,\n");
    }

    #[test]
    fn markdown_preview_is_truncated() {
        let s = render_table(&sample(), 1);
        assert!(s.contains("営業"));
        assert!(!s.contains("開発"));
        assert_eq!(render_table(&Table::new(vec!["x".into()]), 5), "(no rows)");
    }
}
