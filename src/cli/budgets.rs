use comfy_table::{Cell, Table};

use crate::budgets::{delete_budget, list_budgets, set_budget};
use crate::cli::{current_user, open_db};
use crate::error::Result;
use crate::fmt::money;

pub fn set(user: Option<&str>, category: &str, amount: f64, month: &str) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let id = set_budget(&conn, user.id, month, category, amount)?;
    println!("Budget {id}: {} {} = {}", month.trim(), category.trim(), money(amount));
    Ok(())
}

pub fn list(user: Option<&str>, month: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Month", "Category", "Amount"]);
    for b in list_budgets(&conn, user.id, month)? {
        table.add_row(vec![
            Cell::new(b.id),
            Cell::new(b.month),
            Cell::new(b.category),
            Cell::new(money(b.amount)),
        ]);
    }
    println!("Budgets\n{table}");
    Ok(())
}

pub fn delete(user: Option<&str>, id: i64) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    delete_budget(&conn, user.id, id)?;
    println!("Deleted budget {id}");
    Ok(())
}
