use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{FinError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xls,
    Xlsx,
    Ofx,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Ofx => "ofx",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "xls" => Ok(Self::Xls),
            "xlsx" => Ok(Self::Xlsx),
            "ofx" => Ok(Self::Ofx),
            other => Err(FinError::UnsupportedFile(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| FinError::UnsupportedFile(path.display().to_string()))?;
        Self::parse(ext)
    }
}

/// Statement from a checking account or invoice from a credit card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Statement,
    Invoice,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::Invoice => "invoice",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "statement" | "extrato" => Ok(Self::Statement),
            "invoice" | "fatura" => Ok(Self::Invoice),
            other => Err(FinError::invalid("document kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    Ok,
    Tbd,
    Unsupported,
}

impl SupportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Tbd => "tbd",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "tbd" => Ok(Self::Tbd),
            "unsupported" => Ok(Self::Unsupported),
            other => Err(FinError::invalid("status", other)),
        }
    }
}

/// Where a bank's export keeps the date, description and amount.
///
/// Column fields hold header names; `|` separates accepted alternatives.
#[derive(Debug, Clone)]
pub struct BankFormat {
    pub id: i64,
    pub bank: String,
    pub kind: DocumentKind,
    pub file_format: FileFormat,
    pub status: SupportStatus,
    pub date_column: String,
    pub description_column: String,
    pub amount_column: String,
    pub date_format: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBankFormat {
    pub bank: String,
    pub kind: DocumentKind,
    pub file_format: FileFormat,
    pub status: SupportStatus,
    pub date_column: String,
    pub description_column: String,
    pub amount_column: String,
    pub date_format: Option<String>,
    pub notes: Option<String>,
}

const SELECT_FORMAT: &str = "SELECT id, bank, kind, file_format, status, date_column, description_column, \
                             amount_column, date_format, notes FROM bank_formats";

type FormatRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

fn read_row(row: &rusqlite::Row) -> rusqlite::Result<FormatRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn format_from_row(row: FormatRow) -> Result<BankFormat> {
    let (id, bank, kind, file_format, status, date_column, description_column, amount_column, date_format, notes) = row;
    Ok(BankFormat {
        id,
        bank,
        kind: DocumentKind::parse(&kind)?,
        file_format: FileFormat::parse(&file_format)?,
        status: SupportStatus::parse(&status)?,
        date_column,
        description_column,
        amount_column,
        date_format,
        notes,
    })
}

fn bank_key(bank: &str) -> String {
    bank.trim().to_lowercase()
}

pub fn add_format(conn: &Connection, format: &NewBankFormat) -> Result<i64> {
    let bank = bank_key(&format.bank);
    if bank.is_empty() {
        return Err(FinError::invalid("bank", &format.bank));
    }
    let tabular = format.file_format != FileFormat::Ofx;
    if tabular
        && [&format.date_column, &format.description_column, &format.amount_column]
            .iter()
            .any(|c| c.trim().is_empty())
    {
        return Err(FinError::invalid(
            "columns",
            "date, description and amount columns are required for tabular formats",
        ));
    }
    conn.execute(
        "INSERT INTO bank_formats (bank, kind, file_format, status, date_column, description_column, amount_column, date_format, notes) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            bank,
            format.kind.as_str(),
            format.file_format.as_str(),
            format.status.as_str(),
            format.date_column,
            format.description_column,
            format.amount_column,
            format.date_format,
            format.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_formats(conn: &Connection) -> Result<Vec<BankFormat>> {
    let mut stmt = conn.prepare(&format!("{SELECT_FORMAT} ORDER BY bank, kind, file_format"))?;
    let rows = stmt
        .query_map([], read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(format_from_row).collect()
}

pub fn set_status(conn: &Connection, id: i64, status: SupportStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE bank_formats SET status = ?1 WHERE id = ?2",
        rusqlite::params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(FinError::Other(format!("No bank format with ID {id}")));
    }
    Ok(())
}

pub fn delete_format(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM bank_formats WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(FinError::Other(format!("No bank format with ID {id}")));
    }
    Ok(())
}

/// Find the layout for a bank/kind/file format, falling back to the `generic` layout.
///
/// `tbd` layouts are usable but logged; `unsupported` layouts are refused.
pub fn resolve_format(
    conn: &Connection,
    bank: &str,
    kind: DocumentKind,
    file_format: FileFormat,
) -> Result<BankFormat> {
    let sql = format!("{SELECT_FORMAT} WHERE bank = ?1 AND kind = ?2 AND file_format = ?3");
    let lookup = |bank: &str| -> Result<Option<BankFormat>> {
        let row = conn
            .query_row(
                &sql,
                rusqlite::params![bank, kind.as_str(), file_format.as_str()],
                read_row,
            )
            .optional()?;
        row.map(format_from_row).transpose()
    };

    let key = bank_key(bank);
    let found = match lookup(&key)? {
        Some(f) => Some(f),
        None => lookup("generic")?,
    };
    let format = found.ok_or_else(|| FinError::UnknownFormat {
        bank: key.clone(),
        kind: kind.as_str().to_string(),
        file_format: file_format.as_str().to_string(),
    })?;

    match format.status {
        SupportStatus::Unsupported => Err(FinError::UnsupportedFormat(format!(
            "{} {} {}",
            format.bank,
            format.kind.as_str(),
            format.file_format.as_str()
        ))),
        SupportStatus::Tbd => {
            log::warn!(
                "bank format {} {} {} is not verified yet",
                format.bank,
                format.kind.as_str(),
                format.file_format.as_str()
            );
            Ok(format)
        }
        SupportStatus::Ok => Ok(format),
    }
}
