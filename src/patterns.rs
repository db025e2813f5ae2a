use std::collections::{BTreeMap, HashMap};

use rusqlite::Connection;

use crate::error::Result;
use crate::models::SpendType;

#[derive(Debug, Clone, PartialEq)]
pub struct LearnedPattern {
    /// Establishment base (normalized merchant without installment marker).
    pub pattern: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub spend_type: SpendType,
    pub occurrences: i64,
    pub confidence: f64,
}

pub struct LearnResult {
    pub groups: usize,
    pub patterns: usize,
}

type Label = (String, Option<String>, String);

/// Rebuild a user's learned patterns from the classified part of the ledger.
///
/// Entries are grouped by establishment base. A group becomes a pattern when it has at
/// least `min_occurrences` entries and its most common label covers at least
/// `min_confidence` of them.
pub fn learn_patterns(
    conn: &Connection,
    user_id: i64,
    min_occurrences: i64,
    min_confidence: f64,
) -> Result<LearnResult> {
    let mut stmt = conn.prepare(
        "SELECT establishment_base, category, subcategory, spend_type FROM transactions \
         WHERE user_id = ?1 AND source != 'unclassified' AND is_ignored = 0 AND establishment_base != ''",
    )?;
    let rows: Vec<(String, String, Option<String>, String)> = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut groups: BTreeMap<String, HashMap<Label, i64>> = BTreeMap::new();
    for (base, category, subcategory, spend_type) in rows {
        *groups
            .entry(base)
            .or_default()
            .entry((category, subcategory, spend_type))
            .or_default() += 1;
    }

    let mut learned = Vec::new();
    for (base, labels) in &groups {
        let total: i64 = labels.values().sum();
        if total < min_occurrences {
            continue;
        }
        // Highest count wins; ties resolve to the smallest label so results are stable.
        let Some((label, count)) = labels
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        else {
            continue;
        };
        let confidence = *count as f64 / total as f64;
        if confidence < min_confidence {
            continue;
        }
        learned.push(LearnedPattern {
            pattern: base.clone(),
            category: label.0.clone(),
            subcategory: label.1.clone(),
            spend_type: SpendType::parse(&label.2)?,
            occurrences: total,
            confidence,
        });
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM learned_patterns WHERE user_id = ?1", [user_id])?;
    for p in &learned {
        tx.execute(
            "INSERT INTO learned_patterns (user_id, pattern, category, subcategory, spend_type, occurrences, confidence) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                user_id,
                p.pattern,
                p.category,
                p.subcategory,
                p.spend_type.as_str(),
                p.occurrences,
                p.confidence,
            ],
        )?;
    }
    tx.commit()?;

    log::info!(
        "learned {} patterns from {} merchants for user {user_id}",
        learned.len(),
        groups.len()
    );
    Ok(LearnResult {
        groups: groups.len(),
        patterns: learned.len(),
    })
}

pub fn list_patterns(conn: &Connection, user_id: i64) -> Result<Vec<LearnedPattern>> {
    let mut stmt = conn.prepare(
        "SELECT pattern, category, subcategory, spend_type, occurrences, confidence \
         FROM learned_patterns WHERE user_id = ?1 ORDER BY occurrences DESC, pattern",
    )?;
    let rows: Vec<(String, String, Option<String>, String, i64, f64)> = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(pattern, category, subcategory, spend_type, occurrences, confidence)| {
            Ok(LearnedPattern {
                pattern,
                category,
                subcategory,
                spend_type: SpendType::parse(&spend_type)?,
                occurrences,
                confidence,
            })
        })
        .collect()
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

    fn add_entry(conn: &Connection, user: i64, n: usize, base: &str, category: &str, source: &str, ignored: bool) {
        conn.execute(
            "INSERT INTO transactions (transaction_id, user_id, date, description, establishment, establishment_base, amount, category, spend_type, source, is_ignored) \
             VALUES (?1, ?2, '2025-01-10', ?3, ?3, ?3, -10.0, ?4, 'flexible', ?5, ?6)",
            rusqlite::params![format!("{base}-{n}-{category}"), user, base, category, source, ignored as i32],
        )
        .unwrap();
    }

    #[test]
    fn test_learns_dominant_label() {
        let (_dir, conn, user) = test_db();
        for n in 0..4 {
            add_entry(&conn, user, n, "PADARIA BOM PAO", "Alimentação", "manual", false);
        }
        add_entry(&conn, user, 9, "PADARIA BOM PAO", "Lazer", "manual", false);

        let result = learn_patterns(&conn, user, 2, 0.8).unwrap();
        assert_eq!(result.patterns, 1);
        let patterns = list_patterns(&conn, user).unwrap();
        assert_eq!(patterns[0].pattern, "PADARIA BOM PAO");
        assert_eq!(patterns[0].category, "Alimentação");
        assert_eq!(patterns[0].occurrences, 5);
        assert!((patterns[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_thresholds_filter_groups() {
        let (_dir, conn, user) = test_db();
        add_entry(&conn, user, 0, "LOJA RARA", "Compras", "manual", false);
        add_entry(&conn, user, 0, "LOJA MISTA", "Compras", "manual", false);
        add_entry(&conn, user, 1, "LOJA MISTA", "Casa", "manual", false);
        let result = learn_patterns(&conn, user, 2, 0.8).unwrap();
        assert_eq!(result.groups, 2);
        assert_eq!(result.patterns, 0);
    }

    #[test]
    fn test_ignores_unclassified_and_ignored_entries() {
        let (_dir, conn, user) = test_db();
        add_entry(&conn, user, 0, "MERCADO", "Não Classificado", "unclassified", false);
        add_entry(&conn, user, 1, "MERCADO", "Não Classificado", "unclassified", false);
        add_entry(&conn, user, 0, "ESTORNO", "Excluído", "exclusion", true);
        add_entry(&conn, user, 1, "ESTORNO", "Excluído", "exclusion", true);
        let result = learn_patterns(&conn, user, 2, 0.5).unwrap();
        assert_eq!(result.groups, 0);
        assert!(list_patterns(&conn, user).unwrap().is_empty());
    }

    #[test]
    fn test_relearning_replaces_patterns() {
        let (_dir, conn, user) = test_db();
        add_entry(&conn, user, 0, "POSTO SHELL", "Transporte", "keyword", false);
        add_entry(&conn, user, 1, "POSTO SHELL", "Transporte", "keyword", false);
        learn_patterns(&conn, user, 2, 0.8).unwrap();
        learn_patterns(&conn, user, 3, 0.8).unwrap();
        assert!(list_patterns(&conn, user).unwrap().is_empty());
    }
}
