use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::models::PostRow;

pub fn insert_post(conn: &Connection, community_id: i64, author_id: i64, content: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO posts (community_id, author_id, content) VALUES (?1, ?2, ?3)",
        rusqlite::params![community_id, author_id, content],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        community_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn post_by_id(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    conn.query_row(
        "SELECT id, community_id, author_id, content, created_at FROM posts WHERE id = ?1",
        [id],
        map_post,
    )
    .optional()
}

/// A community's feed, newest first.
pub fn posts_for_community(conn: &Connection, community_id: i64, limit: usize) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, community_id, author_id, content, created_at FROM posts
         WHERE community_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![community_id, limit as i64], map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
