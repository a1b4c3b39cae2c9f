use crate::error::{DashboardError, Result};
use crate::types::RawTable;
use csv::{ByteRecord, ReaderBuilder};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub blank_rows: usize,
    pub parse_errors: usize,
    pub dropped_columns: usize,
    pub latin1_fields: usize,
}

/// Read a CSV extract into a `RawTable`.
///
/// A missing file or a file without any data rows is fatal for the run.
pub fn load_table(path: &Path, label: &str) -> Result<(RawTable, LoadReport)> {
    if !path.is_file() {
        return Err(DashboardError::MissingSource {
            label: label.to_string(),
            path: path.to_path_buf(),
        });
    }
    let file = std::fs::File::open(path).map_err(|e| DashboardError::io(path, e))?;
    let (table, report) = read_table(file, label, path)?;
    debug!(
        "{}: {} rows, {} columns, {} blank columns dropped, {} non-UTF-8 fields",
        label,
        table.rows.len(),
        table.headers.len(),
        report.dropped_columns,
        report.latin1_fields
    );
    Ok((table, report))
}

/// Same as `load_table` over any reader; `path` is only used in errors.
pub fn read_table<R: Read>(reader: R, label: &str, path: &Path) -> Result<(RawTable, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(reader);
    let mut report = LoadReport::default();
    let mut headers: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut record = ByteRecord::new();

    loop {
        match rdr.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_io_error() => {
                return Err(DashboardError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                report.parse_errors += 1;
                warn!("{}: skipping unreadable record: {}", label, e);
                continue;
            }
        }
        let fields: Vec<String> = record
            .iter()
            .map(|raw| decode_field(raw, &mut report.latin1_fields))
            .collect();

        match headers {
            None => {
                if fields.iter().all(|f| f.trim().is_empty()) {
                    continue;
                }
                headers = Some(fields.iter().map(|h| h.trim().to_string()).collect());
            }
            Some(_) => {
                report.total_rows += 1;
                if fields.iter().all(|f| f.trim().is_empty()) {
                    report.blank_rows += 1;
                    continue;
                }
                rows.push(fields.into_iter().map(strip_thousands).collect());
            }
        }
    }

    let Some(mut headers) = headers else {
        return Err(DashboardError::EmptySource {
            label: label.to_string(),
            path: path.to_path_buf(),
        });
    };
    if rows.is_empty() {
        return Err(DashboardError::EmptySource {
            label: label.to_string(),
            path: path.to_path_buf(),
        });
    }

    // Rows longer than the header get unnamed columns so nothing is lost.
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());
    headers.resize(width, String::new());
    for row in &mut rows {
        row.resize(width, String::new());
    }

    let keep: Vec<bool> = (0..width)
        .map(|col| !headers[col].is_empty() || rows.iter().any(|r| !r[col].trim().is_empty()))
        .collect();
    report.dropped_columns = keep.iter().filter(|k| !**k).count();
    if report.dropped_columns > 0 {
        headers = retain_columns(headers, &keep);
        rows = rows
            .into_iter()
            .map(|row| retain_columns(row, &keep))
            .collect();
    }

    Ok((
        RawTable {
            label: label.to_string(),
            headers,
            rows,
        },
        report,
    ))
}

fn retain_columns(values: Vec<String>, keep: &[bool]) -> Vec<String> {
    values
        .into_iter()
        .zip(keep)
        .filter_map(|(v, k)| k.then_some(v))
        .collect()
}

/// UTF-8 when valid, otherwise each byte as a Latin-1 code point so stray
/// bytes inside descriptions survive instead of failing the load.
fn decode_field(raw: &[u8], latin1_fields: &mut usize) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => {
            *latin1_fields += 1;
            raw.iter().map(|b| *b as char).collect()
        }
    }
}

/// Remove digit-grouping commas from cells that are a single grouped number,
/// optionally dollar-prefixed (`"$3,069,990"`, `"1,204"`). Free text is
/// returned untouched.
pub fn strip_thousands(cell: String) -> String {
    if is_grouped_number(cell.trim()) {
        cell.replace(',', "")
    } else {
        cell
    }
}

fn is_grouped_number(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    let s = s.strip_prefix('$').unwrap_or(s).trim_start();
    let (int_part, frac) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    if let Some(f) = frac {
        if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    let mut groups = int_part.split(',');
    let Some(first) = groups.next() else {
        return false;
    };
    if first.is_empty() || first.len() > 3 || !first.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let mut saw_group = false;
    for g in groups {
        if g.len() != 3 || !g.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        saw_group = true;
    }
    saw_group
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read(bytes: &[u8]) -> Result<(RawTable, LoadReport)> {
        read_table(bytes, "test", Path::new("test.csv"))
    }

    #[test]
    fn test_headers_trimmed_and_thousands_stripped() {
        let csv = b" Concept ,Total Overpayment , Number of Claim Hits\nSkin_graft,\" $3,069,990 \",\"1,204\"\n";
        let (table, _) = read(csv).unwrap();
        assert_eq!(
            table.headers,
            vec!["Concept", "Total Overpayment", "Number of Claim Hits"]
        );
        assert_eq!(table.rows[0][1], " $3069990 ");
        assert_eq!(table.rows[0][2], "1204");
    }

    #[test]
    fn test_trailing_blank_rows_and_column_ignored() {
        let clean = b"Concept,Total Overpayment\nA,$100\nB,$200\n";
        let messy = b"Concept,Total Overpayment,\nA,$100,\nB,$200,\n,,\n , ,\n";
        let (clean_table, _) = read(clean).unwrap();
        let (messy_table, report) = read(messy).unwrap();
        assert_eq!(clean_table, messy_table);
        assert_eq!(report.blank_rows, 2);
        assert_eq!(report.dropped_columns, 1);
    }

    #[test]
    fn test_non_utf8_byte_preserved() {
        let mut csv = b"Concept,Description\nE_M,Codes 99202".to_vec();
        csv.push(0x96);
        csv.extend_from_slice(b"99215\n");
        let (table, report) = read(&csv).unwrap();
        assert_eq!(table.rows[0][1], "Codes 99202\u{96}99215");
        assert_eq!(report.latin1_fields, 1);

        let utf8 = "Concept,Description\nE_M,99202\u{FFFD}99215\n";
        let (table, report) = read(utf8.as_bytes()).unwrap();
        assert_eq!(table.rows[0][1], "99202\u{FFFD}99215");
        assert_eq!(report.latin1_fields, 0);
    }

    #[test]
    fn test_identifier_leading_zeros_kept() {
        let (table, _) = read(b"Concept,Billing NPI\nA,00123456\n").unwrap();
        assert_eq!(table.rows[0][1], "00123456");
    }

    #[test]
    fn test_free_text_commas_untouched() {
        assert_eq!(strip_thousands("Codes 1,234 and more".into()), "Codes 1,234 and more");
        assert_eq!(strip_thousands("1,23".into()), "1,23");
        assert_eq!(strip_thousands("$1,234.50".into()), "$1234.50");
        assert_eq!(strip_thousands("A, B".into()), "A, B");
    }

    #[test]
    fn test_header_only_is_empty_source() {
        let err = read(b"Concept,Total Overpayment\n,\n").unwrap_err();
        assert!(matches!(err, DashboardError::EmptySource { .. }));
        let err = read(b"").unwrap_err();
        assert!(matches!(err, DashboardError::EmptySource { .. }));
    }

    #[test]
    fn test_missing_file_is_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_table(&dir.path().join("nope.csv"), "All Hits").unwrap_err();
        assert!(matches!(err, DashboardError::MissingSource { .. }));
        assert!(err.is_fatal_input());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"Concept,Total Overpayment\nA,\"$1,000\"\n").unwrap();
        drop(f);
        let (table, report) = load_table(&path, "All Hits").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(report.total_rows, 1);
        assert_eq!(table.label, "All Hits");
    }
}
