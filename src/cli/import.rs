use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::compatibility::{DocumentKind, FileFormat};
use crate::error::Result;
use crate::fmt::money;
use crate::importer::{import_file, ImportRequest};
use crate::settings::{load_settings, resolve_user_email};

pub fn run(
    user: Option<&str>,
    file: &str,
    bank: &str,
    kind: &str,
    format: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let conn = open_db()?;
    let request = ImportRequest {
        path: PathBuf::from(file),
        user_email: resolve_user_email(user)?,
        bank: bank.to_string(),
        kind: DocumentKind::parse(kind)?,
        file_format: format.map(FileFormat::parse).transpose()?,
        dry_run,
    };

    let result = import_file(&conn, &request, &load_settings())?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    if dry_run {
        let mut table = Table::new();
        table.set_header(vec!["Date", "Description", "Amount", "Category", "Source"]);
        for (c, class) in &result.preview {
            let category = if class.is_classified() {
                Cell::new(&class.category)
            } else {
                Cell::new(class.category.as_str().yellow())
            };
            table.add_row(vec![
                Cell::new(c.date),
                Cell::new(&c.description),
                Cell::new(money(c.amount)),
                category,
                Cell::new(class.source),
            ]);
        }
        println!("Preview (nothing written)\n{table}");
    }

    println!(
        "{} parsed, {} {}, {} duplicates, {} invalid",
        result.parsed,
        if dry_run { result.preview.len() } else { result.imported },
        if dry_run { "new" } else { "imported" },
        result.duplicates,
        result.invalid
    );
    for (source, n) in &result.by_source {
        println!("  {source:<16} {n}");
    }
    Ok(())
}
