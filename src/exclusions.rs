use rusqlite::Connection;

use crate::error::{FinError, Result};
use crate::matcher::{MatchType, Matcher};

#[derive(Debug, Clone)]
pub struct Exclusion {
    pub id: i64,
    pub user_id: i64,
    pub pattern: String,
    pub match_type: MatchType,
    /// Restrict the exclusion to one bank; `None` applies to every bank.
    pub bank: Option<String>,
    pub reason: Option<String>,
}

pub fn add_exclusion(
    conn: &Connection,
    user_id: i64,
    pattern: &str,
    match_type: MatchType,
    bank: Option<&str>,
    reason: Option<&str>,
) -> Result<i64> {
    // Reject patterns that could never match before they reach the cascade.
    Matcher::compile(pattern, match_type)?;
    conn.execute(
        "INSERT INTO exclusions (user_id, pattern, match_type, bank, reason) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![user_id, pattern, match_type.as_str(), bank, reason],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_exclusions(conn: &Connection, user_id: i64) -> Result<Vec<Exclusion>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, pattern, match_type, bank, reason FROM exclusions \
         WHERE user_id = ?1 AND is_active = 1 ORDER BY id",
    )?;
    let rows: Vec<(i64, i64, String, String, Option<String>, Option<String>)> = stmt
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
        .map(|(id, user_id, pattern, match_type, bank, reason)| {
            Ok(Exclusion {
                id,
                user_id,
                pattern,
                match_type: MatchType::parse(&match_type)?,
                bank,
                reason,
            })
        })
        .collect()
}

pub fn delete_exclusion(conn: &Connection, user_id: i64, id: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE exclusions SET is_active = 0 WHERE id = ?1 AND user_id = ?2 AND is_active = 1",
        rusqlite::params![id, user_id],
    )?;
    if changed == 0 {
        return Err(FinError::Other(format!("No active exclusion with ID {id}")));
    }
    Ok(())
}
