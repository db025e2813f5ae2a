use comfy_table::{Cell, Table};

use crate::cli::{current_user, open_db};
use crate::error::Result;
use crate::exclusions::{add_exclusion, delete_exclusion, list_exclusions};
use crate::matcher::MatchType;

pub fn add(user: Option<&str>, pattern: &str, match_type: &str, bank: Option<&str>, reason: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let id = add_exclusion(&conn, user.id, pattern, MatchType::parse(match_type)?, bank, reason)?;
    println!("Added exclusion {id}: '{pattern}'");
    Ok(())
}

pub fn list(user: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Match", "Bank", "Reason"]);
    for e in list_exclusions(&conn, user.id)? {
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(e.pattern),
            Cell::new(e.match_type.as_str()),
            Cell::new(e.bank.unwrap_or_else(|| "any".to_string())),
            Cell::new(e.reason.unwrap_or_default()),
        ]);
    }
    println!("Exclusions\n{table}");
    Ok(())
}

pub fn delete(user: Option<&str>, id: i64) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    delete_exclusion(&conn, user.id, id)?;
    println!("Deleted exclusion {id}");
    Ok(())
}
