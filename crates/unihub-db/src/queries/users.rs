use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::Database;
use crate::models::UserRow;

impl Database {
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_id(conn, id))
    }
}

const USER_COLUMNS: &str = "id, username, email, password, bio, created_at";

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        bio: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_user(conn: &Connection, username: &str, email: &str, password_hash: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
        (username, email, password_hash),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    conn.query_row(&sql, [username], map_user).optional()
}

pub fn user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], map_user).optional()
}

pub fn user_exists(conn: &Connection, id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}
