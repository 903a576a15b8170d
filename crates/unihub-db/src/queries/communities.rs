use anyhow::Result;
use rusqlite::Connection;

use unihub_types::models::Privacy;

use super::{OptionalExt, enum_column};
use crate::models::CommunityRow;

pub fn insert_community(
    conn: &Connection,
    name: &str,
    description: &str,
    privacy: Privacy,
    owner_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO communities (name, description, privacy, owner_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![name, description, privacy.as_str(), owner_id],
    )?;
    Ok(conn.last_insert_rowid())
}

const COMMUNITY_COLUMNS: &str = "id, name, description, privacy, owner_id, created_at";

fn map_community(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommunityRow> {
    Ok(CommunityRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        privacy: enum_column(row, 3)?,
        owner_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn community_by_id(conn: &Connection, id: i64) -> Result<Option<CommunityRow>> {
    let sql = format!("SELECT {} FROM communities WHERE id = ?1", COMMUNITY_COLUMNS);
    conn.query_row(&sql, [id], map_community).optional()
}

/// Every community, alphabetically.
pub fn all_communities(conn: &Connection) -> Result<Vec<CommunityRow>> {
    let sql = format!("SELECT {} FROM communities ORDER BY name, id", COMMUNITY_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_community)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Communities the user holds a membership in, alphabetically.
pub fn communities_for_user(conn: &Connection, user_id: i64) -> Result<Vec<CommunityRow>> {
    let sql = format!(
        "SELECT {} FROM communities
         WHERE id IN (SELECT community_id FROM memberships WHERE user_id = ?1)
         ORDER BY name, id",
        COMMUNITY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], map_community)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn name_taken(conn: &Connection, name: &str) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM communities WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub fn set_owner(conn: &Connection, community_id: i64, owner_id: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE communities SET owner_id = ?1 WHERE id = ?2",
        [owner_id, community_id],
    )?;
    Ok(changed)
}

pub fn owned_community_ids(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM communities WHERE owner_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}
