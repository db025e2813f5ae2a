use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::Result;

pub struct Dedup<T> {
    pub fresh: Vec<T>,
    pub duplicates: Vec<T>,
}

/// Split a batch into rows not yet in the ledger and rows already known.
///
/// A row is a duplicate when its ID is persisted or appeared earlier in the same batch.
/// Order within each half is preserved.
pub fn partition<T, F>(batch: Vec<T>, existing: &HashSet<String>, id_of: F) -> Dedup<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut fresh = Vec::new();
    let mut duplicates = Vec::new();
    for item in batch {
        let id = id_of(&item);
        if existing.contains(id) || !seen.insert(id.to_string()) {
            duplicates.push(item);
        } else {
            fresh.push(item);
        }
    }
    Dedup { fresh, duplicates }
}

/// Every transaction ID already persisted for the user.
pub fn existing_ids(conn: &Connection, user_id: i64) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT transaction_id FROM transactions WHERE user_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(ids)
}
