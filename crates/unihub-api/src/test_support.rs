//! Fixture builders shared by the operation tests.

use unihub_db::Database;
use unihub_db::queries::{communities, follows, keywords, memberships, posts, users};
use unihub_types::models::{Privacy, Role};

pub fn db() -> Database {
    Database::open_in_memory().unwrap()
}

pub fn user(db: &Database, username: &str) -> i64 {
    db.with_conn(|conn| users::insert_user(conn, username, &format!("{}@uni.ac.uk", username), "hash"))
        .unwrap()
}

/// Community owned by `owner`, who is also enrolled as its Leader.
pub fn community(db: &Database, name: &str, owner: i64, privacy: Privacy, tags: &[&str]) -> i64 {
    db.with_conn(|conn| {
        let id = communities::insert_community(conn, name, "", privacy, Some(owner))?;
        memberships::insert_membership(conn, owner, id, Role::Leader)?;
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        keywords::set_community_keywords(conn, id, &tags)?;
        Ok(id)
    })
    .unwrap()
}

pub fn enroll(db: &Database, user_id: i64, community_id: i64, role: Role) {
    db.with_conn(|conn| memberships::insert_membership(conn, user_id, community_id, role))
        .unwrap();
}

pub fn follow(db: &Database, follower: i64, followed: i64) {
    db.with_conn(|conn| follows::insert_follow(conn, follower, followed))
        .unwrap();
}

pub fn post(db: &Database, community_id: i64, author: i64) -> i64 {
    db.with_conn(|conn| posts::insert_post(conn, community_id, author, "hello"))
        .unwrap()
}

pub fn role_of(db: &Database, user_id: i64, community_id: i64) -> Option<Role> {
    db.with_conn(|conn| memberships::membership(conn, user_id, community_id))
        .unwrap()
        .map(|m| m.role)
}
