use rusqlite::{Connection, OptionalExtension};

use crate::error::{FinError, Result};
use crate::models::User;

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
    })
}

pub fn add_user(conn: &Connection, name: &str, email: &str) -> Result<i64> {
    let name = name.trim();
    let email = email.trim().to_lowercase();
    if name.is_empty() {
        return Err(FinError::invalid("name", name));
    }
    if !email.contains('@') {
        return Err(FinError::invalid("email", email));
    }
    let exists: bool = conn
        .prepare("SELECT 1 FROM users WHERE email = ?1")?
        .exists([&email])?;
    if exists {
        return Err(FinError::Other(format!("A user with email {email} already exists")));
    }
    conn.execute(
        "INSERT INTO users (name, email) VALUES (?1, ?2)",
        rusqlite::params![name, email],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, name, email, is_active FROM users ORDER BY id")?;
    let rows = stmt
        .query_map([], row_to_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, name, email, is_active FROM users WHERE id = ?1",
            [id],
            row_to_user,
        )
        .optional()?)
}

/// Look up an active user by email; inactive users cannot own new data.
pub fn find_active_user(conn: &Connection, email: &str) -> Result<User> {
    let email = email.trim().to_lowercase();
    conn.query_row(
        "SELECT id, name, email, is_active FROM users WHERE email = ?1 AND is_active = 1",
        [&email],
        row_to_user,
    )
    .optional()?
    .ok_or(FinError::UnknownUser(email))
}

pub fn rename_user(conn: &Connection, id: i64, new_name: &str) -> Result<()> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(FinError::invalid("name", new_name));
    }
    let changed = conn.execute(
        "UPDATE users SET name = ?1 WHERE id = ?2",
        rusqlite::params![new_name, id],
    )?;
    if changed == 0 {
        return Err(FinError::UnknownUser(id.to_string()));
    }
    Ok(())
}

/// Soft delete: the user's ledger stays intact.
pub fn deactivate_user(conn: &Connection, id: i64) -> Result<()> {
    match get_user(conn, id)? {
        None => Err(FinError::UnknownUser(id.to_string())),
        Some(user) if !user.is_active => {
            Err(FinError::Other(format!("User {id} is already inactive")))
        }
        Some(_) => {
            conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [id])?;
            Ok(())
        }
    }
}
