use rusqlite::Connection;

use crate::error::{FinError, Result};
use crate::reports::{parse_month, spending_by_category};

#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub id: i64,
    pub month: String,
    pub category: String,
    pub amount: f64,
}

pub struct BudgetLine {
    pub category: String,
    pub budget: f64,
    pub actual: f64,
    /// `budget - actual`; negative when overspent.
    pub remaining: f64,
}

pub struct BudgetReport {
    pub month: String,
    pub lines: Vec<BudgetLine>,
    /// Spending in categories that have no budget for the month.
    pub unbudgeted: f64,
}

/// Create or replace the budget for (user, month, category).
pub fn set_budget(conn: &Connection, user_id: i64, month: &str, category: &str, amount: f64) -> Result<i64> {
    let month = parse_month(month)?;
    let category = category.trim();
    if category.is_empty() {
        return Err(FinError::invalid("category", category));
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(FinError::invalid("budget amount", amount.to_string()));
    }
    conn.execute(
        "INSERT INTO budgets (user_id, month, category, amount) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (user_id, month, category) DO UPDATE SET amount = excluded.amount",
        rusqlite::params![user_id, month, category, amount],
    )?;
    let id = conn.query_row(
        "SELECT id FROM budgets WHERE user_id = ?1 AND month = ?2 AND category = ?3",
        rusqlite::params![user_id, month, category],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn list_budgets(conn: &Connection, user_id: i64, month: Option<&str>) -> Result<Vec<Budget>> {
    let month = month.map(parse_month).transpose()?;
    let mut stmt = conn.prepare(
        "SELECT id, month, category, amount FROM budgets \
         WHERE user_id = ?1 AND (?2 IS NULL OR month = ?2) ORDER BY month, category",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, month], |row| {
            Ok(Budget {
                id: row.get(0)?,
                month: row.get(1)?,
                category: row.get(2)?,
                amount: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_budget(conn: &Connection, user_id: i64, id: i64) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM budgets WHERE id = ?1 AND user_id = ?2",
        rusqlite::params![id, user_id],
    )?;
    if changed == 0 {
        return Err(FinError::Other(format!("No budget with ID {id}")));
    }
    Ok(())
}

/// Budget against actual spending for each budgeted category of a month.
pub fn budget_report(conn: &Connection, user_id: i64, month: &str) -> Result<BudgetReport> {
    let month = parse_month(month)?;
    let budgets = list_budgets(conn, user_id, Some(&month))?;
    let spending = spending_by_category(conn, user_id, &month)?;

    let lines = budgets
        .iter()
        .map(|b| {
            let actual = spending
                .iter()
                .find(|s| s.category == b.category)
                .map_or(0.0, |s| s.total);
            BudgetLine {
                category: b.category.clone(),
                budget: b.amount,
                actual,
                remaining: b.amount - actual,
            }
        })
        .collect();
    let unbudgeted = spending
        .iter()
        .filter(|s| !budgets.iter().any(|b| b.category == s.category))
        .map(|s| s.total)
        .sum();

    Ok(BudgetReport {
        month,
        lines,
        unbudgeted,
    })
}
