use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::models::PinnedPostRow;

const PIN_COLUMNS: &str = "id, post_id, community_id, pin_order, pinned_by, pinned_at";

fn map_pin(row: &rusqlite::Row<'_>) -> rusqlite::Result<PinnedPostRow> {
    Ok(PinnedPostRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        community_id: row.get(2)?,
        pin_order: row.get(3)?,
        pinned_by: row.get(4)?,
        pinned_at: row.get(5)?,
    })
}

/// Pinned posts of a community in display order.
pub fn pins_for_community(conn: &Connection, community_id: i64) -> Result<Vec<PinnedPostRow>> {
    let sql = format!(
        "SELECT {} FROM pinned_posts WHERE community_id = ?1 ORDER BY pin_order, id",
        PIN_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([community_id], map_pin)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn pin_by_post(conn: &Connection, post_id: i64) -> Result<Option<PinnedPostRow>> {
    let sql = format!("SELECT {} FROM pinned_posts WHERE post_id = ?1", PIN_COLUMNS);
    conn.query_row(&sql, [post_id], map_pin).optional()
}

pub fn pin_count(conn: &Connection, community_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pinned_posts WHERE community_id = ?1",
        [community_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Next free slot: one past the highest order, or 0 for an empty set.
pub fn next_pin_order(conn: &Connection, community_id: i64) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(pin_order) FROM pinned_posts WHERE community_id = ?1",
        [community_id],
        |row| row.get(0),
    )?;
    Ok(max.map_or(0, |m| m + 1))
}

pub fn insert_pin(
    conn: &Connection,
    post_id: i64,
    community_id: i64,
    order: i64,
    pinned_by: i64,
) -> Result<PinnedPostRow> {
    conn.execute(
        "INSERT INTO pinned_posts (post_id, community_id, pin_order, pinned_by) VALUES (?1, ?2, ?3, ?4)",
        [post_id, community_id, order, pinned_by],
    )?;
    let sql = format!("SELECT {} FROM pinned_posts WHERE id = ?1", PIN_COLUMNS);
    let row = conn.query_row(&sql, [conn.last_insert_rowid()], map_pin)?;
    Ok(row)
}

pub fn delete_pin(conn: &Connection, pin_id: i64) -> Result<usize> {
    let changed = conn.execute("DELETE FROM pinned_posts WHERE id = ?1", [pin_id])?;
    Ok(changed)
}

/// Close the gap left at `removed_order`: every pin above it moves down one.
pub fn shift_pins_down(conn: &Connection, community_id: i64, removed_order: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE pinned_posts SET pin_order = pin_order - 1
         WHERE community_id = ?1 AND pin_order > ?2",
        [community_id, removed_order],
    )?;
    Ok(changed)
}

pub fn set_pin_order(conn: &Connection, pin_id: i64, order: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE pinned_posts SET pin_order = ?1 WHERE id = ?2",
        [order, pin_id],
    )?;
    Ok(changed)
}
