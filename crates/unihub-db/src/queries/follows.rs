use anyhow::Result;
use rusqlite::{Connection, params_from_iter};

use super::placeholders;

pub fn insert_follow(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
        [follower_id, followed_id],
    )?;
    Ok(())
}

pub fn delete_follow(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<usize> {
    let changed = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        [follower_id, followed_id],
    )?;
    Ok(changed)
}

pub fn is_following(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
        [follower_id, followed_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Ids of every user `user_id` follows.
pub fn followed_ids(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT followed_id FROM follows WHERE follower_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// (id, username) of users following `user_id`, most recent first.
pub fn followers_of(conn: &Connection, user_id: i64) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username FROM follows f
         JOIN users u ON u.id = f.follower_id
         WHERE f.followed_id = ?1
         ORDER BY f.created_at DESC, u.id DESC",
    )?;
    let rows = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// (id, username) of users `user_id` follows, most recent first.
pub fn following_of(conn: &Connection, user_id: i64) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username FROM follows f
         JOIN users u ON u.id = f.followed_id
         WHERE f.follower_id = ?1
         ORDER BY f.created_at DESC, u.id DESC",
    )?;
    let rows = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Score every user outside `exclude_ids` by how many accounts in
/// `followed_ids` follow them. Only positive scores are returned,
/// highest first, then by user id descending.
pub fn mutual_follow_scores(
    conn: &Connection,
    followed_ids: &[i64],
    exclude_ids: &[i64],
) -> Result<Vec<(i64, i64)>> {
    if followed_ids.is_empty() {
        return Ok(vec![]);
    }

    let exclude_clause = if exclude_ids.is_empty() {
        String::new()
    } else {
        format!(
            "AND followed_id NOT IN ({})",
            placeholders(followed_ids.len() + 1, exclude_ids.len())
        )
    };

    let sql = format!(
        "SELECT followed_id, COUNT(DISTINCT follower_id) AS mutual_follows
         FROM follows
         WHERE follower_id IN ({}) {}
         GROUP BY followed_id
         HAVING mutual_follows > 0
         ORDER BY mutual_follows DESC, followed_id DESC",
        placeholders(1, followed_ids.len()),
        exclude_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let scored = stmt
        .query_map(
            params_from_iter(followed_ids.iter().chain(exclude_ids.iter())),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?
        .collect::<std::result::Result<Vec<(i64, i64)>, _>>()?;
    Ok(scored)
}
