use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::budgets::budget_report;
use crate::cli::{current_user, open_db};
use crate::error::Result;
use crate::fmt::money;
use crate::reports::get_monthly_summary;

pub fn monthly(user: Option<&str>, month: &str) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let summary = get_monthly_summary(&conn, user.id, month)?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Transactions", "Amount"]);
    table.add_row(vec![Cell::new("SPENDING".red().bold()), Cell::new(""), Cell::new("")]);
    for item in &summary.categories {
        table.add_row(vec![
            Cell::new(format!("  {}", item.category)),
            Cell::new(item.count),
            Cell::new(money(item.total)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total Spending".bold()),
        Cell::new(""),
        Cell::new(money(summary.total_spending)),
    ]);
    table.add_row(vec![Cell::new(""), Cell::new(""), Cell::new("")]);
    table.add_row(vec![
        Cell::new("INCOME".green().bold()),
        Cell::new(""),
        Cell::new(money(summary.total_income)),
    ]);

    let net_label = if summary.net >= 0.0 {
        "NET".green().bold()
    } else {
        "NET".red().bold()
    };
    table.add_row(vec![Cell::new(net_label), Cell::new(""), Cell::new(money(summary.net))]);

    println!("Spending {} ({})\n{table}", summary.month, user.name);
    Ok(())
}

pub fn budget(user: Option<&str>, month: &str) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let report = budget_report(&conn, user.id, month)?;

    if report.lines.is_empty() {
        println!("No budgets set for {}.", report.month);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Budget", "Actual", "Remaining"]);
    for line in &report.lines {
        let remaining = if line.remaining < 0.0 {
            money(line.remaining).red().to_string()
        } else {
            money(line.remaining).green().to_string()
        };
        table.add_row(vec![
            Cell::new(&line.category),
            Cell::new(money(line.budget)),
            Cell::new(money(line.actual)),
            Cell::new(remaining),
        ]);
    }
    if report.unbudgeted > 0.0 {
        table.add_row(vec![
            Cell::new("Unbudgeted".dimmed()),
            Cell::new(""),
            Cell::new(money(report.unbudgeted)),
            Cell::new(""),
        ]);
    }
    println!("Budget {}\n{table}", report.month);
    Ok(())
}
