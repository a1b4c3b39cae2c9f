// Parsing and formatting helpers.
//
// All of the "dirty" cell handling lives here so the cleaner can work with
// typed `Option` values: a cell that cannot be read becomes `None`, never 0.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Placeholder shown wherever a value is unknown.
pub const MISSING: &str = "—";

/// Strip surrounding whitespace, a leading `$` and grouping commas.
fn strip_currency(s: &str) -> String {
    let s = s.trim();
    let (neg, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };
    let s = s.strip_prefix('$').unwrap_or(s).trim();
    let body: String = s.chars().filter(|c| *c != ',').collect();
    if neg {
        format!("-{}", body)
    } else {
        body
    }
}

/// Parse a currency-like cell such as `" $3,069,990 "` into a number.
///
/// - Trims whitespace.
/// - Accepts an optional leading `$` (after an optional minus sign).
/// - Strips thousands separators.
/// - Returns `None` for blanks, text, and non-finite results.
pub fn parse_currency(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let cleaned = strip_currency(s);
    if cleaned.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a count cell. Whole numbers written as `"12.0"` are accepted;
/// fractional, exponent and out-of-range counts are not.
pub fn parse_count(s: Option<&str>) -> Option<i64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(v as i64),
        _ => None,
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M", "%m/%d/%Y %H:%M:%S"];

/// Permissive date parsing. Anything unrecognised is `None`.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Sum that skips missing values; `None` when nothing was present.
pub fn sum_known(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Count sum that skips missing values. A total that overflows is unknown.
pub fn sum_known_counts(values: impl IntoIterator<Item = Option<i64>>) -> Option<i64> {
    let mut total: Option<i64> = None;
    for v in values.into_iter().flatten() {
        total = Some(total.unwrap_or(0).checked_add(v)?);
    }
    total
}

pub fn average(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware grouping of the integer part.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u128 = match int_part.parse() {
        Ok(v) => v,
        // Beyond u128 or non-finite: fall back to the plain rendering.
        Err(_) => return s,
    };
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

/// `"$" + grouped whole dollars`, or the missing placeholder.
pub fn format_currency(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_sign_negative() && v.round() != 0.0 => {
            format!("-${}", format_number(v.abs(), 0))
        }
        Some(v) => format!("${}", format_number(v.abs(), 0)),
        None => MISSING.to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

pub fn format_count(v: Option<i64>) -> String {
    v.map(format_int).unwrap_or_else(|| MISSING.to_string())
}

/// Round to whole cents as an integer.
pub fn to_cents(v: f64) -> i64 {
    (v * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency_padded_dollars() {
        assert_eq!(parse_currency(Some(" $3,069,990 ")), Some(3069990.0));
        assert_eq!(parse_currency(Some("$1,234.56")), Some(1234.56));
        assert_eq!(parse_currency(Some("-$12")), Some(-12.0));
        assert_eq!(parse_currency(Some("42")), Some(42.0));
    }

    #[test]
    fn test_parse_currency_garbage_is_missing() {
        assert_eq!(parse_currency(Some("")), None);
        assert_eq!(parse_currency(Some("  ")), None);
        assert_eq!(parse_currency(Some("N/A")), None);
        assert_eq!(parse_currency(Some("$")), None);
        assert_eq!(parse_currency(Some("$1,2x")), None);
        assert_eq!(parse_currency(None), None);
    }

    #[test]
    fn test_parse_count_distinguishes_zero() {
        assert_eq!(parse_count(Some("0")), Some(0));
        assert_eq!(parse_count(Some("1,204")), Some(1204));
        assert_eq!(parse_count(Some("7.0")), Some(7));
        assert_eq!(parse_count(Some("7.5")), None);
        assert_eq!(parse_count(Some("")), None);
        assert_eq!(parse_count(Some("unknown")), None);
    }

    #[test]
    fn test_huge_counts_never_panic() {
        assert_eq!(parse_count(Some("1e19")), None);
        assert_eq!(parse_count(Some("1E3")), None);
        assert_eq!(parse_count(Some("99999999999999999999.0")), None);
        assert_eq!(sum_known_counts(vec![parse_count(Some("1e19")); 2]), None);
        assert_eq!(sum_known_counts(vec![Some(i64::MAX), Some(1)]), None);
        assert_eq!(sum_known_counts(vec![Some(i64::MAX), None]), Some(i64::MAX));
    }

    #[test]
    fn test_parse_date_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(parse_date_safe(Some("2025-10-01")), Some(d));
        assert_eq!(parse_date_safe(Some("10/1/2025")), Some(d));
        assert_eq!(parse_date_safe(Some(" 2025-10-01 00:00:00 ")), Some(d));
        assert_eq!(parse_date_safe(Some("October 01, 2025")), Some(d));
        assert_eq!(parse_date_safe(Some("soon")), None);
        assert_eq!(parse_date_safe(Some("2025-13-45")), None);
    }

    #[test]
    fn test_sum_known_skips_missing() {
        assert_eq!(sum_known(vec![Some(1.5), None, Some(2.5)]), Some(4.0));
        assert_eq!(sum_known(vec![None, None]), None);
        assert_eq!(sum_known_counts(vec![Some(0), None]), Some(0));
        assert_eq!(sum_known_counts(Vec::new()), None);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Some(3069990.0)), "$3,069,990");
        assert_eq!(format_currency(Some(1234.6)), "$1,235");
        assert_eq!(format_currency(Some(-2500.0)), "-$2,500");
        assert_eq!(format_currency(None), MISSING);
        assert_eq!(format_count(Some(12345)), "12,345");
        assert_eq!(format_count(None), MISSING);
    }

    #[test]
    fn test_format_number_decimals() {
        assert_eq!(format_number(10.0, 1), "10.0");
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-0.001, 1), "0.0");
    }

    #[test]
    fn test_format_currency_beyond_u64() {
        assert_eq!(format_currency(Some(2e19)), "$20,000,000,000,000,000,000");
    }
}
