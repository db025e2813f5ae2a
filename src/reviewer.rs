use rusqlite::{Connection, OptionalExtension};

use crate::error::{FinError, Result};
use crate::models::{Classification, ClassificationSource, SpendType};

pub struct UnclassifiedTxn {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub bank: Option<String>,
    pub parcela_id: Option<String>,
}

pub struct ReviewOutcome {
    /// Other installments of the same contract that took the same classification.
    pub propagated: usize,
}

pub fn get_unclassified(conn: &Connection, user_id: i64) -> Result<Vec<UnclassifiedTxn>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, description, amount, bank, parcela_id FROM transactions \
         WHERE user_id = ?1 AND source = 'unclassified' ORDER BY date, id",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(UnclassifiedTxn {
                id: row.get(0)?,
                date: row.get(1)?,
                description: row.get(2)?,
                amount: row.get(3)?,
                bank: row.get(4)?,
                parcela_id: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Classify one transaction by hand and carry the result to the rest of its installment contract.
pub fn apply_review(
    conn: &Connection,
    user_id: i64,
    id: i64,
    category: &str,
    subcategory: Option<&str>,
    spend_type: SpendType,
) -> Result<ReviewOutcome> {
    let category = category.trim();
    if category.is_empty() {
        return Err(FinError::invalid("category", category));
    }
    let parcela_id: Option<Option<String>> = conn
        .query_row(
            "SELECT parcela_id FROM transactions WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(parcela_id) = parcela_id else {
        return Err(FinError::Other(format!("No transaction with ID {id}")));
    };

    let class = Classification {
        category: category.to_string(),
        subcategory: subcategory.map(|s| s.to_string()),
        ignored: spend_type == SpendType::Ignored,
        spend_type,
        source: ClassificationSource::Manual,
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE transactions SET category = ?1, subcategory = ?2, spend_type = ?3, source = ?4, is_ignored = ?5 WHERE id = ?6",
        rusqlite::params![
            class.category,
            class.subcategory,
            class.spend_type.as_str(),
            class.source.as_str(),
            class.ignored as i32,
            id,
        ],
    )?;
    let propagated = match &parcela_id {
        Some(parcela_id) => tx.execute(
            "UPDATE transactions SET category = ?1, subcategory = ?2, spend_type = ?3, source = ?4, is_ignored = ?5 \
             WHERE user_id = ?6 AND parcela_id = ?7 AND source = 'unclassified' AND id != ?8",
            rusqlite::params![
                class.category,
                class.subcategory,
                class.spend_type.as_str(),
                ClassificationSource::Installment.as_str(),
                class.ignored as i32,
                user_id,
                parcela_id,
                id,
            ],
        )?,
        None => 0,
    };
    tx.commit()?;

    if propagated > 0 {
        log::info!("classification of transaction {id} carried to {propagated} installments");
    }
    Ok(ReviewOutcome { propagated })
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

    fn add_txn(conn: &Connection, user: i64, txn_id: &str, parcela: Option<&str>, source: &str) -> i64 {
        conn.execute(
            "INSERT INTO transactions (transaction_id, user_id, date, description, establishment, establishment_base, amount, parcela_id, category, spend_type, source) \
             VALUES (?1, ?2, '2025-01-15', 'LOJA 01/03', 'LOJA 01 03', 'LOJA', -50.0, ?3, 'Não Classificado', 'flexible', ?4)",
            rusqlite::params![txn_id, user, parcela, source],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn source_of(conn: &Connection, id: i64) -> (String, String) {
        conn.query_row(
            "SELECT category, source FROM transactions WHERE id = ?1",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap()
    }

    #[test]
    fn test_get_unclassified() {
        let (_dir, conn, user) = test_db();
        add_txn(&conn, user, "a", None, "unclassified");
        add_txn(&conn, user, "b", None, "keyword");
        let pending = get_unclassified(&conn, user).unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].amount < 0.0);
    }

    #[test]
    fn test_apply_review_propagates_to_contract() {
        let (_dir, conn, user) = test_db();
        let first = add_txn(&conn, user, "a", Some("p1"), "unclassified");
        let second = add_txn(&conn, user, "b", Some("p1"), "unclassified");
        let classified = add_txn(&conn, user, "c", Some("p1"), "keyword");
        let other = add_txn(&conn, user, "d", Some("p2"), "unclassified");

        let outcome = apply_review(&conn, user, first, "Casa", None, SpendType::Flexible).unwrap();
        assert_eq!(outcome.propagated, 1);
        assert_eq!(source_of(&conn, first), ("Casa".to_string(), "manual".to_string()));
        assert_eq!(source_of(&conn, second), ("Casa".to_string(), "installment".to_string()));
        assert_eq!(source_of(&conn, classified).1, "keyword");
        assert_eq!(source_of(&conn, other).1, "unclassified");
    }

    #[test]
    fn test_ignored_spend_type_marks_entry_ignored() {
        let (_dir, conn, user) = test_db();
        let id = add_txn(&conn, user, "a", None, "unclassified");
        apply_review(&conn, user, id, "Transferência", None, SpendType::Ignored).unwrap();
        let ignored: i64 = conn
            .query_row("SELECT is_ignored FROM transactions WHERE id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(ignored, 1);
    }

    #[test]
    fn test_apply_review_checks_owner() {
        let (_dir, conn, user) = test_db();
        let other = add_user(&conn, "Bia", "bia@example.com").unwrap();
        let id = add_txn(&conn, user, "a", None, "unclassified");
        assert!(apply_review(&conn, other, id, "Casa", None, SpendType::Flexible).is_err());
    }
}
