use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::compatibility::{BankFormat, FileFormat};
use crate::error::{FinError, Result};
use crate::models::RawRow;
use crate::normalizer::normalize_establishment;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bank exports are UTF-8 or Latin-1; anything that is not valid UTF-8 is read as Latin-1.
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim_start_matches('\u{feff}').to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(any(feature = "excel", test))]
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    let date = base + chrono::Duration::days(serial as i64);
    date.format("%Y-%m-%d").to_string()
}

/// Column positions found in a header row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnMap {
    date: usize,
    description: usize,
    amount: usize,
}

impl ColumnMap {
    fn locate(header: &[String], format: &BankFormat) -> Option<Self> {
        let names: Vec<String> = header.iter().map(|h| normalize_establishment(h)).collect();
        let find = |wanted: &str| -> Option<usize> {
            wanted
                .split('|')
                .map(normalize_establishment)
                .filter(|w| !w.is_empty())
                .find_map(|w| names.iter().position(|n| *n == w))
        };
        Some(Self {
            date: find(&format.date_column)?,
            description: find(&format.description_column)?,
            amount: find(&format.amount_column)?,
        })
    }

    /// Mapped cells of a data row; short rows are padded with empty cells.
    /// Returns `None` only for rows that carry no data at all.
    fn extract(&self, fields: &[String]) -> Option<RawRow> {
        if fields.iter().all(|f| f.trim().is_empty()) {
            return None;
        }
        let cell = |i: usize| fields.get(i).map(|f| f.trim().to_string()).unwrap_or_default();
        Some(RawRow {
            date: cell(self.date),
            description: cell(self.description),
            amount: cell(self.amount),
        })
    }
}

/// Rows after the header. A record the reader could not decode still counts as a row
/// (with empty cells) so the importer reports it as invalid.
fn tabular_rows<I>(records: I, format: &BankFormat) -> Result<Vec<RawRow>>
where
    I: IntoIterator<Item = Result<Vec<String>>>,
{
    let mut columns: Option<ColumnMap> = None;
    let mut rows = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let fields = match record {
            Ok(fields) => fields,
            Err(e) if columns.is_some() => {
                log::warn!("unreadable record {}: {e}", index + 1);
                rows.push(RawRow {
                    date: String::new(),
                    description: String::new(),
                    amount: String::new(),
                });
                continue;
            }
            Err(e) => {
                log::debug!("skipping unreadable preamble record {}: {e}", index + 1);
                continue;
            }
        };
        match columns {
            None => columns = ColumnMap::locate(&fields, format),
            Some(map) => rows.extend(map.extract(&fields)),
        }
    }
    if columns.is_none() {
        return Err(FinError::Other(format!(
            "no header row with columns '{}', '{}', '{}'",
            format.date_column, format.description_column, format.amount_column
        )));
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn read_rows(file_path: &Path, format: &BankFormat) -> Result<Vec<RawRow>> {
    match format.file_format {
        FileFormat::Csv => read_csv(file_path, format),
        FileFormat::Xls | FileFormat::Xlsx => read_excel(file_path, format),
        FileFormat::Ofx => read_ofx(file_path),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

const DELIMITERS: &[u8] = b";,\t";

/// Delimiter of the header row: the first split of an early line that yields every
/// configured column. Falls back to counting separators when no line qualifies.
fn detect_delimiter(content: &str, format: &BankFormat) -> u8 {
    for line in content.lines().take(50) {
        for &delim in DELIMITERS {
            let fields: Vec<String> = line
                .split(delim as char)
                .map(|f| f.trim().trim_matches('"').to_string())
                .collect();
            if fields.len() > 1 && ColumnMap::locate(&fields, format).is_some() {
                return delim;
            }
        }
    }
    let sample: String = content.lines().take(10).collect::<Vec<_>>().join("\n");
    let semicolons = sample.matches(';').count();
    let commas = sample.matches(',').count();
    if semicolons >= commas && semicolons > 0 {
        b';'
    } else {
        b','
    }
}

fn read_csv(file_path: &Path, format: &BankFormat) -> Result<Vec<RawRow>> {
    let content = decode(&std::fs::read(file_path)?);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(&content, format))
        .from_reader(content.as_bytes());

    let records = rdr.records().map(|result| {
        result
            .map(|record| record.iter().map(|f| f.to_string()).collect::<Vec<_>>())
            .map_err(FinError::from)
    });
    tabular_rows(records, format)
}

// ---------------------------------------------------------------------------
// XLS / XLSX (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "excel")]
fn read_excel(file_path: &Path, format: &BankFormat) -> Result<Vec<RawRow>> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| FinError::Other(format!("Failed to open spreadsheet: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FinError::Other("spreadsheet has no worksheets".to_string()))?
        .map_err(|e| FinError::Other(format!("Failed to read worksheet: {e}")))?;

    let cell_text = |cell: &Data| -> String {
        match cell {
            Data::String(s) => s.clone(),
            Data::Float(f) => f.to_string(),
            Data::Int(i) => i.to_string(),
            Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
            Data::DateTimeIso(s) => s.clone(),
            Data::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    };

    let mut columns: Option<ColumnMap> = None;
    let mut rows = Vec::new();
    for row in range.rows() {
        let mut fields: Vec<String> = row.iter().map(|c| cell_text(c)).collect();
        match columns {
            None => columns = ColumnMap::locate(&fields, format),
            Some(map) => {
                // Dates stored as plain numbers are Excel serials.
                if let Some(Data::Float(serial)) = row.get(map.date) {
                    fields[map.date] = excel_serial_to_date(*serial);
                }
                rows.extend(map.extract(&fields));
            }
        }
    }
    if columns.is_none() {
        return Err(FinError::Other(format!(
            "no header row with columns '{}', '{}', '{}'",
            format.date_column, format.description_column, format.amount_column
        )));
    }
    Ok(rows)
}

#[cfg(not(feature = "excel"))]
fn read_excel(file_path: &Path, _format: &BankFormat) -> Result<Vec<RawRow>> {
    Err(FinError::UnsupportedFile(format!(
        "{} (built without spreadsheet support)",
        file_path.display()
    )))
}

// ---------------------------------------------------------------------------
// OFX
// ---------------------------------------------------------------------------

fn ofx_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(DTPOSTED|TRNAMT|MEMO|NAME)>\s*([^<\r\n]*)").expect("valid OFX tag regex")
    })
}

/// Extract `<STMTTRN>` blocks; works for both SGML (unclosed tags) and XML OFX.
pub fn parse_ofx(content: &str) -> Vec<RawRow> {
    let upper = content.to_ascii_uppercase();
    let mut rows = Vec::new();
    let mut cursor = 0;
    while let Some(start) = upper[cursor..].find("<STMTTRN>") {
        let body_start = cursor + start + "<STMTTRN>".len();
        let body_end = upper[body_start..]
            .find("</STMTTRN>")
            .or_else(|| upper[body_start..].find("<STMTTRN>"))
            .map(|i| body_start + i)
            .unwrap_or(content.len());
        let block = &content[body_start..body_end];
        cursor = body_end;

        let (mut date, mut amount, mut memo, mut name) = (None, None, None, None);
        for caps in ofx_tag().captures_iter(block) {
            let value = caps[2].trim().to_string();
            match caps[1].to_uppercase().as_str() {
                "DTPOSTED" => date = Some(value),
                "TRNAMT" => amount = Some(value),
                "MEMO" => memo = Some(value),
                _ => name = Some(value),
            }
        }
        let description = memo.filter(|m| !m.is_empty()).or(name).unwrap_or_default();
        if let (Some(date), Some(amount)) = (date, amount) {
            if !description.is_empty() {
                rows.push(RawRow {
                    date,
                    description,
                    amount,
                });
            }
        }
    }
    rows
}

fn read_ofx(file_path: &Path) -> Result<Vec<RawRow>> {
    let content = decode(&std::fs::read(file_path)?);
    Ok(parse_ofx(&content))
}
