use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::compatibility::{
    add_format, delete_format, list_formats, set_status, DocumentKind, FileFormat, NewBankFormat, SupportStatus,
};
use crate::error::Result;

pub struct FormatArgs {
    pub bank: String,
    pub kind: String,
    pub format: String,
    pub date_column: String,
    pub description_column: String,
    pub amount_column: String,
    pub date_format: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

pub fn list() -> Result<()> {
    let conn = open_db()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Bank", "Kind", "Format", "Status", "Date", "Description", "Amount", "Notes"]);
    for f in list_formats(&conn)? {
        let status = match f.status {
            SupportStatus::Ok => f.status.as_str().green(),
            SupportStatus::Tbd => f.status.as_str().yellow(),
            SupportStatus::Unsupported => f.status.as_str().red(),
        };
        table.add_row(vec![
            Cell::new(f.id),
            Cell::new(f.bank),
            Cell::new(f.kind.as_str()),
            Cell::new(f.file_format.as_str()),
            Cell::new(status),
            Cell::new(f.date_column),
            Cell::new(f.description_column),
            Cell::new(f.amount_column),
            Cell::new(f.notes.unwrap_or_default()),
        ]);
    }
    println!("Bank formats\n{table}");
    Ok(())
}

pub fn add(args: FormatArgs) -> Result<()> {
    let conn = open_db()?;
    let format = NewBankFormat {
        bank: args.bank,
        kind: DocumentKind::parse(&args.kind)?,
        file_format: FileFormat::parse(&args.format)?,
        status: SupportStatus::parse(&args.status)?,
        date_column: args.date_column,
        description_column: args.description_column,
        amount_column: args.amount_column,
        date_format: args.date_format,
        notes: args.notes,
    };
    let id = add_format(&conn, &format)?;
    println!(
        "Added bank format {id}: {} {} {}",
        format.bank.trim().to_lowercase(),
        format.kind.as_str(),
        format.file_format.as_str()
    );
    Ok(())
}

pub fn status(id: i64, status: &str) -> Result<()> {
    let conn = open_db()?;
    let status = SupportStatus::parse(status)?;
    set_status(&conn, id, status)?;
    println!("Bank format {id} is now {}", status.as_str());
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    delete_format(&conn, id)?;
    println!("Deleted bank format {id}");
    Ok(())
}
