use anyhow::Result;
use rusqlite::Connection;

use unihub_types::models::Role;

use super::{OptionalExt, enum_column};
use crate::models::{JoinRequestRow, MembershipRow};

// -- Memberships --

pub fn insert_membership(conn: &Connection, user_id: i64, community_id: i64, role: Role) -> Result<()> {
    conn.execute(
        "INSERT INTO memberships (user_id, community_id, role) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, community_id, role.as_str()],
    )?;
    Ok(())
}

pub fn membership(conn: &Connection, user_id: i64, community_id: i64) -> Result<Option<MembershipRow>> {
    conn.query_row(
        "SELECT user_id, community_id, role, joined_at FROM memberships
         WHERE user_id = ?1 AND community_id = ?2",
        [user_id, community_id],
        |row| {
            Ok(MembershipRow {
                user_id: row.get(0)?,
                community_id: row.get(1)?,
                role: enum_column(row, 2)?,
                joined_at: row.get(3)?,
            })
        },
    )
    .optional()
}

pub fn set_role(conn: &Connection, user_id: i64, community_id: i64, role: Role) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE memberships SET role = ?1 WHERE user_id = ?2 AND community_id = ?3",
        rusqlite::params![role.as_str(), user_id, community_id],
    )?;
    Ok(changed)
}

pub fn delete_membership(conn: &Connection, user_id: i64, community_id: i64) -> Result<usize> {
    let changed = conn.execute(
        "DELETE FROM memberships WHERE user_id = ?1 AND community_id = ?2",
        [user_id, community_id],
    )?;
    Ok(changed)
}

pub fn community_ids_for_user(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT community_id FROM memberships WHERE user_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Members with their usernames, leaders first, then by join time.
pub fn members_of(conn: &Connection, community_id: i64) -> Result<Vec<(MembershipRow, String)>> {
    let mut stmt = conn.prepare(
        "SELECT m.user_id, m.community_id, m.role, m.joined_at, u.username
         FROM memberships m
         JOIN users u ON u.id = m.user_id
         WHERE m.community_id = ?1
         ORDER BY CASE m.role
                    WHEN 'leader' THEN 0
                    WHEN 'event_manager' THEN 1
                    WHEN 'moderator' THEN 2
                    ELSE 3
                  END,
                  m.joined_at, m.user_id",
    )?;

    let rows = stmt
        .query_map([community_id], |row| {
            Ok((
                MembershipRow {
                    user_id: row.get(0)?,
                    community_id: row.get(1)?,
                    role: enum_column(row, 2)?,
                    joined_at: row.get(3)?,
                },
                row.get(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Join requests --

pub fn insert_join_request(conn: &Connection, user_id: i64, community_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO join_requests (user_id, community_id) VALUES (?1, ?2)",
        [user_id, community_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn join_request_by_id(conn: &Connection, id: i64) -> Result<Option<JoinRequestRow>> {
    conn.query_row(
        "SELECT id, user_id, community_id, created_at FROM join_requests WHERE id = ?1",
        [id],
        |row| {
            Ok(JoinRequestRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                community_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
}

pub fn pending_request_id(conn: &Connection, user_id: i64, community_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM join_requests WHERE user_id = ?1 AND community_id = ?2",
        [user_id, community_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn delete_join_request(conn: &Connection, id: i64) -> Result<usize> {
    let changed = conn.execute("DELETE FROM join_requests WHERE id = ?1", [id])?;
    Ok(changed)
}

/// Pending requests for a community, oldest first.
pub fn requests_for_community(conn: &Connection, community_id: i64) -> Result<Vec<JoinRequestRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, community_id, created_at FROM join_requests
         WHERE community_id = ?1
         ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map([community_id], |row| {
            Ok(JoinRequestRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                community_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
