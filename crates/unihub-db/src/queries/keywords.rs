use anyhow::Result;
use rusqlite::{Connection, params_from_iter};

use super::placeholders;

/// Insert the keyword if it is new; returns its id either way.
pub fn upsert_keyword(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO keywords (name) VALUES (?1)", [name])?;
    let id = conn.query_row("SELECT id FROM keywords WHERE name = ?1", [name], |row| {
        row.get(0)
    })?;
    Ok(id)
}

/// Replace a community's keyword set.
pub fn set_community_keywords(conn: &Connection, community_id: i64, names: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM community_keywords WHERE community_id = ?1",
        [community_id],
    )?;
    for name in names {
        let keyword_id = upsert_keyword(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO community_keywords (community_id, keyword_id) VALUES (?1, ?2)",
            [community_id, keyword_id],
        )?;
    }
    Ok(())
}

pub fn keywords_for_community(conn: &Connection, community_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT k.name FROM keywords k
         JOIN community_keywords ck ON ck.keyword_id = k.id
         WHERE ck.community_id = ?1
         ORDER BY k.name",
    )?;
    let names = stmt
        .query_map([community_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Distinct keyword ids attached to any of the given communities.
pub fn keyword_ids_for_communities(conn: &Connection, community_ids: &[i64]) -> Result<Vec<i64>> {
    if community_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT DISTINCT keyword_id FROM community_keywords WHERE community_id IN ({})",
        placeholders(1, community_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(community_ids), |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Score every community outside `exclude_ids` by how many of `keyword_ids`
/// it carries. Only positive scores are returned, highest first, with
/// newer (higher id) communities winning ties.
pub fn score_communities_by_keywords(
    conn: &Connection,
    keyword_ids: &[i64],
    exclude_ids: &[i64],
    limit: usize,
) -> Result<Vec<(i64, i64)>> {
    if keyword_ids.is_empty() || limit == 0 {
        return Ok(vec![]);
    }

    let exclude_clause = if exclude_ids.is_empty() {
        String::new()
    } else {
        format!(
            "AND community_id NOT IN ({})",
            placeholders(keyword_ids.len() + 1, exclude_ids.len())
        )
    };
    let limit_idx = keyword_ids.len() + exclude_ids.len() + 1;

    let sql = format!(
        "SELECT community_id, COUNT(DISTINCT keyword_id) AS match_score
         FROM community_keywords
         WHERE keyword_id IN ({}) {}
         GROUP BY community_id
         HAVING match_score > 0
         ORDER BY match_score DESC, community_id DESC
         LIMIT ?{}",
        placeholders(1, keyword_ids.len()),
        exclude_clause,
        limit_idx
    );

    let limit = limit as i64;
    let params = keyword_ids
        .iter()
        .chain(exclude_ids.iter())
        .chain(std::iter::once(&limit));

    let mut stmt = conn.prepare(&sql)?;
    let scored = stmt
        .query_map(params_from_iter(params), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<(i64, i64)>, _>>()?;
    Ok(scored)
}
