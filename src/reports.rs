use rusqlite::Connection;

use crate::error::{FinError, Result};
use crate::models::ClassificationSource;

// ---------------------------------------------------------------------------
// Month helper
// ---------------------------------------------------------------------------

/// Validate a `YYYY-MM` month and return it canonicalized.
pub fn parse_month(raw: &str) -> Result<String> {
    let raw = raw.trim();
    chrono::NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m").to_string())
        .map_err(|_| FinError::invalid("month (expected YYYY-MM)", raw))
}

// ---------------------------------------------------------------------------
// Monthly spending
// ---------------------------------------------------------------------------

pub struct CategorySpend {
    pub category: String,
    /// Absolute value of the debits.
    pub total: f64,
    pub count: i64,
}

pub struct MonthlySummary {
    pub month: String,
    pub categories: Vec<CategorySpend>,
    pub total_spending: f64,
    pub total_income: f64,
    pub net: f64,
}

/// Spending per category for a month: non-ignored debits only, largest first.
pub fn spending_by_category(conn: &Connection, user_id: i64, month: &str) -> Result<Vec<CategorySpend>> {
    let mut stmt = conn.prepare(
        "SELECT category, -SUM(amount) AS total, COUNT(*) FROM transactions \
         WHERE user_id = ?1 AND date LIKE ?2 AND is_ignored = 0 AND amount < 0 \
         GROUP BY category ORDER BY total DESC, category",
    )?;
    let rows = stmt.query_map(rusqlite::params![user_id, format!("{month}%")], |row| {
        Ok(CategorySpend {
            category: row.get(0)?,
            total: row.get(1)?,
            count: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn income_total(conn: &Connection, user_id: i64, month: &str) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM transactions \
         WHERE user_id = ?1 AND date LIKE ?2 AND is_ignored = 0 AND amount > 0",
        rusqlite::params![user_id, format!("{month}%")],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn get_monthly_summary(conn: &Connection, user_id: i64, month: &str) -> Result<MonthlySummary> {
    let month = parse_month(month)?;
    let categories = spending_by_category(conn, user_id, &month)?;
    let total_spending: f64 = categories.iter().map(|c| c.total).sum();
    let total_income = income_total(conn, user_id, &month)?;
    Ok(MonthlySummary {
        month,
        categories,
        total_spending,
        total_income,
        net: total_income - total_spending,
    })
}

// ---------------------------------------------------------------------------
// Ledger status
// ---------------------------------------------------------------------------

pub struct LedgerStatus {
    pub transactions: i64,
    pub ignored: i64,
    pub imports: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub by_source: Vec<(ClassificationSource, i64)>,
}

pub fn get_ledger_status(conn: &Connection, user_id: i64) -> Result<LedgerStatus> {
    let (transactions, ignored, first_date, last_date): (i64, i64, Option<String>, Option<String>) =
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_ignored), 0), MIN(date), MAX(date) FROM transactions WHERE user_id = ?1",
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
    let imports: i64 = conn.query_row("SELECT COUNT(*) FROM imports WHERE user_id = ?1", [user_id], |row| {
        row.get(0)
    })?;

    let mut stmt = conn.prepare(
        "SELECT source, COUNT(*) FROM transactions WHERE user_id = ?1 GROUP BY source",
    )?;
    let counts: Vec<(String, i64)> = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut by_source = counts
        .into_iter()
        .map(|(source, n)| Ok((ClassificationSource::parse(&source)?, n)))
        .collect::<Result<Vec<_>>>()?;
    by_source.sort();

    Ok(LedgerStatus {
        transactions,
        ignored,
        imports,
        first_date,
        last_date,
        by_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::users::add_user;

    fn test_db() -> (tempfile::TempDir, Connection, i64) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let user = add_user(&conn, "Ana", "ana@example.com").unwrap();
        (dir, conn, user)
    }

    fn add_txn(conn: &Connection, user: i64, date: &str, amount: f64, category: &str, source: &str, ignored: bool) {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0)).unwrap();
        conn.execute(
            "INSERT INTO transactions (transaction_id, user_id, date, description, establishment, establishment_base, amount, category, spend_type, source, is_ignored) \
             VALUES (?1, ?2, ?3, 'X', 'X', 'X', ?4, ?5, 'flexible', ?6, ?7)",
            rusqlite::params![format!("t{n}"), user, date, amount, category, source, ignored as i32],
        )
        .unwrap();
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-3").unwrap(), "2025-03");
        assert_eq!(parse_month(" 2025-11 ").unwrap(), "2025-11");
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("março").is_err());
    }

    #[test]
    fn test_monthly_summary_skips_ignored_and_other_months() {
        let (_dir, conn, user) = test_db();
        add_txn(&conn, user, "2025-03-02", -100.0, "Alimentação", "keyword", false);
        add_txn(&conn, user, "2025-03-05", -50.0, "Alimentação", "history", false);
        add_txn(&conn, user, "2025-03-06", -30.0, "Transporte", "keyword", false);
        add_txn(&conn, user, "2025-03-07", -900.0, "Pagamento Cartão", "card_payment", true);
        add_txn(&conn, user, "2025-03-08", 5000.0, "Receita", "keyword", false);
        add_txn(&conn, user, "2025-04-01", -70.0, "Alimentação", "keyword", false);

        let summary = get_monthly_summary(&conn, user, "2025-03").unwrap();
        assert_eq!(summary.categories.len(), 2);
        assert_eq!(summary.categories[0].category, "Alimentação");
        assert!((summary.categories[0].total - 150.0).abs() < 1e-9);
        assert_eq!(summary.categories[0].count, 2);
        assert!((summary.total_spending - 180.0).abs() < 1e-9);
        assert!((summary.total_income - 5000.0).abs() < 1e-9);
        assert!((summary.net - 4820.0).abs() < 1e-9);
    }

    #[test]
    fn test_ledger_status() {
        let (_dir, conn, user) = test_db();
        add_txn(&conn, user, "2025-03-02", -10.0, "Alimentação", "keyword", false);
        add_txn(&conn, user, "2025-03-09", -10.0, "Não Classificado", "unclassified", false);
        add_txn(&conn, user, "2025-01-01", -10.0, "Excluído", "exclusion", true);
        let status = get_ledger_status(&conn, user).unwrap();
        assert_eq!(status.transactions, 3);
        assert_eq!(status.ignored, 1);
        assert_eq!(status.first_date.as_deref(), Some("2025-01-01"));
        assert_eq!(status.by_source[0], (ClassificationSource::Exclusion, 1));
    }
}
