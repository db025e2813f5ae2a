use crate::cli::current_user;
use crate::db::get_connection;
use crate::error::Result;
use crate::reports::get_ledger_status;
use crate::settings::{db_path, load_settings};

pub fn run(user: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let db_path = db_path();

    println!(
        "User:       {}",
        user.unwrap_or(if settings.default_user.is_empty() { "(not set)" } else { &settings.default_user })
    );
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `finbook init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let users: i64 = conn.query_row("SELECT count(*) FROM users WHERE is_active = 1", [], |r| r.get(0))?;
    let rules: i64 = conn.query_row("SELECT count(*) FROM keyword_rules WHERE is_active = 1", [], |r| r.get(0))?;
    println!();
    println!("Users:         {users}");
    println!("Rules:         {rules}");

    let Ok(user) = current_user(&conn, user) else {
        return Ok(());
    };
    let status = get_ledger_status(&conn, user.id)?;
    println!("Imports:       {}", status.imports);
    println!("Transactions:  {}", status.transactions);
    println!("Ignored:       {}", status.ignored);
    if let (Some(first), Some(last)) = (&status.first_date, &status.last_date) {
        println!("Period:        {first} .. {last}");
    }
    for (source, n) in &status.by_source {
        println!("  {source:<16} {n}");
    }
    Ok(())
}
