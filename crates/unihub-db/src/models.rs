//! Database row types: these map directly to SQLite rows.
//! Distinct from unihub-types models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use unihub_types::models::{
    Community, JoinRequest, Membership, PinnedPost, Post, Privacy, Role, User,
};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub created_at: String,
}

pub struct CommunityRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub privacy: Privacy,
    pub owner_id: Option<i64>,
    pub created_at: String,
}

pub struct MembershipRow {
    pub user_id: i64,
    pub community_id: i64,
    pub role: Role,
    pub joined_at: String,
}

pub struct JoinRequestRow {
    pub id: i64,
    pub user_id: i64,
    pub community_id: i64,
    pub created_at: String,
}

pub struct PostRow {
    pub id: i64,
    pub community_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: String,
}

pub struct PinnedPostRow {
    pub id: i64,
    pub post_id: i64,
    pub community_id: i64,
    pub pin_order: i64,
    pub pinned_by: i64,
    pub pinned_at: String,
}

impl UserRow {
    pub fn into_model(self) -> User {
        User {
            created_at: parse_timestamp(&self.created_at),
            id: self.id,
            username: self.username,
            email: self.email,
            bio: self.bio,
        }
    }
}

impl CommunityRow {
    pub fn into_model(self, keywords: Vec<String>) -> Community {
        Community {
            created_at: parse_timestamp(&self.created_at),
            id: self.id,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            privacy: self.privacy,
            keywords,
        }
    }
}

impl MembershipRow {
    pub fn into_model(self) -> Membership {
        Membership {
            joined_at: parse_timestamp(&self.joined_at),
            user_id: self.user_id,
            community_id: self.community_id,
            role: self.role,
        }
    }
}

impl JoinRequestRow {
    pub fn into_model(self) -> JoinRequest {
        JoinRequest {
            created_at: parse_timestamp(&self.created_at),
            id: self.id,
            user_id: self.user_id,
            community_id: self.community_id,
        }
    }
}

impl PostRow {
    pub fn into_model(self) -> Post {
        Post {
            created_at: parse_timestamp(&self.created_at),
            id: self.id,
            community_id: self.community_id,
            author_id: self.author_id,
            content: self.content,
        }
    }
}

impl PinnedPostRow {
    pub fn into_model(self) -> PinnedPost {
        PinnedPost {
            pinned_at: parse_timestamp(&self.pinned_at),
            id: self.id,
            post_id: self.post_id,
            community_id: self.community_id,
            order: self.pin_order,
            pinned_by: self.pinned_by,
        }
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC; a corrupt value falls back to the epoch.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_datetime() {
        let ts = parse_timestamp("2024-03-01 12:30:45");
        assert_eq!(ts.to_rfc3339(), "2024-03-01T12:30:45+00:00");
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
