// Utility helpers for parsing and basic statistics.
//
// This module centralizes the "dirty" cell/number/date handling so the
// pipeline stages can work with typed values.
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日", "%Y%m%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a calendar date from the formats spreadsheet exports commonly use.
///
/// A time-of-day suffix is accepted and discarded.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

pub fn median(mut v: Vec<f64>) -> Option<f64> {
    // We accept `Vec<f64>` by value so the function can sort in-place
    // without cloning at the call site.
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

/// Standard deviation with `ddof` delta degrees of freedom
/// (1 = sample, 0 = population). `None` when `len <= ddof`.
pub fn std_dev(v: &[f64], ddof: usize) -> Option<f64> {
    if v.len() <= ddof {
        return None;
    }
    let m = mean(v)?;
    let ss: f64 = v.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (v.len() - ddof) as f64).sqrt())
}

/// Treats deviations below this as no variance at all.
pub const VARIANCE_EPSILON: f64 = 1e-12;

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimal places plus locale-aware thousands separators
    // (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Used for counts in console messages (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}

/// Canonical weekday labels, Monday first.
pub const WEEKDAY_LABELS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

static WEEKDAY_INDEX: Lazy<HashMap<String, usize>> = Lazy::new(|| {
    const ENGLISH: [(&str, &str); 7] = [
        ("mon", "monday"),
        ("tue", "tuesday"),
        ("wed", "wednesday"),
        ("thu", "thursday"),
        ("fri", "friday"),
        ("sat", "saturday"),
        ("sun", "sunday"),
    ];
    let mut m = HashMap::new();
    for (i, label) in WEEKDAY_LABELS.iter().enumerate() {
        m.insert(label.to_string(), i);
        m.insert(format!("{}曜", label), i);
        m.insert(format!("{}曜日", label), i);
        m.insert(ENGLISH[i].0.to_string(), i);
        m.insert(ENGLISH[i].1.to_string(), i);
    }
    m
});

/// Position of a weekday label in the Monday..Sunday sequence.
///
/// Accepts `月`/`月曜`/`月曜日` and `Mon`/`Monday` (any case).
pub fn weekday_position(label: &str) -> Option<usize> {
    let key = label.trim();
    WEEKDAY_INDEX
        .get(key)
        .or_else(|| WEEKDAY_INDEX.get(&key.to_lowercase()))
        .copied()
}

pub fn weekday_label(date: NaiveDate) -> &'static str {
    WEEKDAY_LABELS[date.weekday().num_days_from_monday() as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_with_separators() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("12人")), None);
        assert_eq!(parse_f64_safe(Some("abc")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn parses_common_date_layouts() {
        let d = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        for s in ["2024-04-05", "2024/4/5", "2024年4月5日", "2024/04/05 13:00"] {
            assert_eq!(parse_date_safe(Some(s)), Some(d), "{}", s);
        }
        assert_eq!(parse_date_safe(Some("来週")), None);
    }

    #[test]
    fn std_dev_respects_ddof() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(std_dev(&v, 0), Some(2.0));
        assert_eq!(std_dev(&[1.0], 1), None);
    }

    #[test]
    fn median_of_even_length() {
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn weekday_labels_in_both_languages() {
        assert_eq!(weekday_position("水曜日"), Some(2));
        assert_eq!(weekday_position("Sunday"), Some(6));
        assert_eq!(weekday_position("FRI"), Some(4));
        assert_eq!(weekday_position("x"), None);
    }

    #[test]
    fn formats_with_thousands_separator() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-0.5, 1), "-0.5");
        assert_eq!(format_int(9855), "9,855");
    }
}
