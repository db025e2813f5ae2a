use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{current_user, open_db};
use crate::error::Result;
use crate::fmt::money;
use crate::models::SpendType;
use crate::reviewer::{apply_review, get_unclassified};

pub fn list(user: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let pending = get_unclassified(&conn, user.id)?;

    if pending.is_empty() {
        println!("{}", "No unclassified transactions to review.".green());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Amount", "Bank", "Installment"]);
    for txn in &pending {
        let amount = if txn.amount < 0.0 {
            money(txn.amount).red().to_string()
        } else {
            money(txn.amount).green().to_string()
        };
        table.add_row(vec![
            Cell::new(txn.id),
            Cell::new(&txn.date),
            Cell::new(&txn.description),
            Cell::new(amount),
            Cell::new(txn.bank.as_deref().unwrap_or("")),
            Cell::new(if txn.parcela_id.is_some() { "yes" } else { "" }),
        ]);
    }
    println!("{} transactions to review\n{table}", pending.len());
    Ok(())
}

pub fn set(user: Option<&str>, id: i64, category: &str, subcategory: Option<&str>, spend_type: &str) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let spend_type = SpendType::parse(spend_type)?;
    let outcome = apply_review(&conn, user.id, id, category, subcategory, spend_type)?;
    println!("Transaction {id} \u{2192} {}", category.trim());
    if outcome.propagated > 0 {
        println!("  also applied to {} other installments", outcome.propagated);
    }
    Ok(())
}
