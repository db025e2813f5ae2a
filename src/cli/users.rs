use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::settings::{load_settings, save_settings};
use crate::users::{add_user, deactivate_user, list_users, rename_user};

pub fn add(name: &str, email: &str, make_default: bool) -> Result<()> {
    let conn = open_db()?;
    let id = add_user(&conn, name, email)?;
    println!("Added user {id}: {name} <{}>", email.trim().to_lowercase());

    let mut settings = load_settings();
    if make_default || settings.default_user.is_empty() {
        settings.default_user = email.trim().to_lowercase();
        save_settings(&settings)?;
        println!("Default user set to {}", settings.default_user);
    }
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let default_user = load_settings().default_user;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Email", "Status"]);
    for user in list_users(&conn)? {
        let status = if !user.is_active {
            "inactive".dimmed().to_string()
        } else if user.email == default_user {
            "default".green().to_string()
        } else {
            "active".to_string()
        };
        table.add_row(vec![
            Cell::new(user.id),
            Cell::new(user.name),
            Cell::new(user.email),
            Cell::new(status),
        ]);
    }
    println!("Users\n{table}");
    Ok(())
}

pub fn rename(id: i64, name: &str) -> Result<()> {
    let conn = open_db()?;
    rename_user(&conn, id, name)?;
    println!("Renamed user {id} to {}", name.trim());
    Ok(())
}

pub fn deactivate(id: i64) -> Result<()> {
    let conn = open_db()?;
    deactivate_user(&conn, id)?;
    println!("Deactivated user {id}");
    Ok(())
}
