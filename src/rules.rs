use std::collections::HashMap;

use rusqlite::Connection;

use crate::error::{FinError, Result};
use crate::matcher::{MatchType, Matcher};
use crate::models::SpendType;

/// Which sign of amount a keyword rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Debit,
    Credit,
    Any,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Any => "any",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            "any" => Ok(Self::Any),
            other => Err(FinError::invalid("direction", other)),
        }
    }

    pub fn accepts(&self, amount: f64) -> bool {
        match self {
            Self::Debit => amount < 0.0,
            Self::Credit => amount > 0.0,
            Self::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub id: i64,
    /// `None` for global rules shared by every user.
    pub user_id: Option<i64>,
    pub pattern: String,
    pub match_type: MatchType,
    pub direction: Direction,
    pub category: String,
    pub subcategory: Option<String>,
    pub spend_type: SpendType,
    pub priority: i64,
    pub hit_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewRule {
    pub user_id: Option<i64>,
    pub pattern: String,
    pub match_type: MatchType,
    pub direction: Direction,
    pub category: String,
    pub subcategory: Option<String>,
    pub spend_type: SpendType,
    pub priority: i64,
}

/// Partial update; `None` keeps the current value.
/// `subcategory: Some(None)` clears the subcategory.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub pattern: Option<String>,
    pub match_type: Option<MatchType>,
    pub direction: Option<Direction>,
    pub category: Option<String>,
    pub subcategory: Option<Option<String>>,
    pub spend_type: Option<SpendType>,
    pub priority: Option<i64>,
}

pub fn add_rule(conn: &Connection, rule: &NewRule) -> Result<i64> {
    Matcher::compile(&rule.pattern, rule.match_type)?;
    if rule.category.trim().is_empty() {
        return Err(FinError::invalid("category", &rule.category));
    }
    conn.execute(
        "INSERT INTO keyword_rules (user_id, pattern, match_type, direction, category, subcategory, spend_type, priority) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            rule.user_id,
            rule.pattern,
            rule.match_type.as_str(),
            rule.direction.as_str(),
            rule.category.trim(),
            rule.subcategory,
            rule.spend_type.as_str(),
            rule.priority,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

type RuleRow = (
    i64,
    Option<i64>,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
);

fn rule_from_row(row: RuleRow) -> Result<KeywordRule> {
    let (id, user_id, pattern, match_type, direction, category, subcategory, spend_type, priority, hit_count) = row;
    Ok(KeywordRule {
        id,
        user_id,
        pattern,
        match_type: MatchType::parse(&match_type)?,
        direction: Direction::parse(&direction)?,
        category,
        subcategory,
        spend_type: SpendType::parse(&spend_type)?,
        priority,
        hit_count,
    })
}

/// Active rules visible to a user (global ones plus the user's own), highest priority first.
pub fn list_rules(conn: &Connection, user_id: Option<i64>) -> Result<Vec<KeywordRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, pattern, match_type, direction, category, subcategory, spend_type, priority, hit_count \
         FROM keyword_rules \
         WHERE is_active = 1 AND (user_id IS NULL OR user_id = ?1) \
         ORDER BY priority DESC, id ASC",
    )?;
    let rows: Vec<RuleRow> = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(rule_from_row).collect()
}

pub fn update_rule(conn: &Connection, id: i64, update: &RuleUpdate) -> Result<()> {
    let current = get_rule(conn, id)?;
    let pattern = update.pattern.clone().unwrap_or(current.pattern);
    let match_type = update.match_type.unwrap_or(current.match_type);
    Matcher::compile(&pattern, match_type)?;
    conn.execute(
        "UPDATE keyword_rules SET pattern = ?1, match_type = ?2, direction = ?3, category = ?4, \
         subcategory = ?5, spend_type = ?6, priority = ?7 WHERE id = ?8",
        rusqlite::params![
            pattern,
            match_type.as_str(),
            update.direction.unwrap_or(current.direction).as_str(),
            update.category.clone().unwrap_or(current.category),
            update.subcategory.clone().unwrap_or(current.subcategory),
            update.spend_type.unwrap_or(current.spend_type).as_str(),
            update.priority.unwrap_or(current.priority),
            id,
        ],
    )?;
    Ok(())
}

fn get_rule(conn: &Connection, id: i64) -> Result<KeywordRule> {
    let row: RuleRow = conn
        .query_row(
            "SELECT id, user_id, pattern, match_type, direction, category, subcategory, spend_type, priority, hit_count \
             FROM keyword_rules WHERE id = ?1 AND is_active = 1",
            [id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            },
        )
        .map_err(|_| FinError::Other(format!("No active rule with ID {id}")))?;
    rule_from_row(row)
}

pub fn delete_rule(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE keyword_rules SET is_active = 0 WHERE id = ?1 AND is_active = 1",
        [id],
    )?;
    if changed == 0 {
        return Err(FinError::Other(format!("No active rule with ID {id}")));
    }
    Ok(())
}

pub fn record_hits(conn: &Connection, hits: &HashMap<i64, i64>) -> Result<()> {
    let mut stmt = conn.prepare_cached("UPDATE keyword_rules SET hit_count = hit_count + ?1 WHERE id = ?2")?;
    for (id, count) in hits {
        stmt.execute(rusqlite::params![count, id])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::users::add_user;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        conn.execute("DELETE FROM keyword_rules", []).unwrap();
        (dir, conn)
    }

    fn rule(user_id: Option<i64>, pattern: &str, priority: i64) -> NewRule {
        NewRule {
            user_id,
            pattern: pattern.to_string(),
            match_type: MatchType::Contains,
            direction: Direction::Any,
            category: "Lazer".to_string(),
            subcategory: None,
            spend_type: SpendType::Flexible,
            priority,
        }
    }

    #[test]
    fn test_list_orders_by_priority_and_scopes_users() {
        let (_dir, conn) = test_db();
        let ana = add_user(&conn, "Ana", "ana@example.com").unwrap();
        let bia = add_user(&conn, "Bia", "bia@example.com").unwrap();
        add_rule(&conn, &rule(None, "CINEMA", 0)).unwrap();
        add_rule(&conn, &rule(Some(ana), "TEATRO", 10)).unwrap();
        add_rule(&conn, &rule(Some(bia), "SHOW", 20)).unwrap();

        let visible = list_rules(&conn, Some(ana)).unwrap();
        let patterns: Vec<&str> = visible.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["TEATRO", "CINEMA"]);

        let global = list_rules(&conn, None).unwrap();
        assert_eq!(global.len(), 1);
    }

    #[test]
    fn test_update_rule_keeps_unset_fields() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, &rule(None, "CINEMA", 3)).unwrap();
        update_rule(
            &conn,
            id,
            &RuleUpdate {
                category: Some("Cultura".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let r = &list_rules(&conn, None).unwrap()[0];
        assert_eq!(r.category, "Cultura");
        assert_eq!(r.pattern, "CINEMA");
        assert_eq!(r.priority, 3);
    }

    #[test]
    fn test_update_rule_sets_and_clears_subcategory() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, &rule(None, "CINEMA", 0)).unwrap();
        let subcategory_of = |conn: &Connection| -> Option<String> {
            list_rules(conn, None)
                .unwrap()
                .into_iter()
                .find(|r| r.id == id)
                .unwrap()
                .subcategory
        };

        let set = RuleUpdate {
            subcategory: Some(Some("Filmes".to_string())),
            ..Default::default()
        };
        update_rule(&conn, id, &set).unwrap();
        assert_eq!(subcategory_of(&conn).as_deref(), Some("Filmes"));

        update_rule(&conn, id, &RuleUpdate::default()).unwrap();
        assert_eq!(subcategory_of(&conn).as_deref(), Some("Filmes"));

        let clear = RuleUpdate {
            subcategory: Some(None),
            ..Default::default()
        };
        update_rule(&conn, id, &clear).unwrap();
        assert_eq!(subcategory_of(&conn), None);
    }

    #[test]
    fn test_delete_rule() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, &rule(None, "CINEMA", 0)).unwrap();
        delete_rule(&conn, id).unwrap();
        assert!(list_rules(&conn, None).unwrap().is_empty());
        assert!(delete_rule(&conn, id).is_err());
        assert!(update_rule(&conn, id, &RuleUpdate::default()).is_err());
    }

    #[test]
    fn test_record_hits() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, &rule(None, "CINEMA", 0)).unwrap();
        record_hits(&conn, &HashMap::from([(id, 3)])).unwrap();
        record_hits(&conn, &HashMap::from([(id, 2)])).unwrap();
        assert_eq!(list_rules(&conn, None).unwrap()[0].hit_count, 5);
    }

    #[test]
    fn test_direction_accepts() {
        assert!(Direction::Debit.accepts(-1.0));
        assert!(!Direction::Debit.accepts(1.0));
        assert!(Direction::Credit.accepts(1.0));
        assert!(Direction::Any.accepts(0.0));
    }
}
