use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id of the seeded, ownerless news-feed community.
pub const GLOBAL_COMMUNITY_ID: i64 = 1;

/// Maximum number of posts a community may have pinned at once.
pub const MAX_PINNED_POSTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    Public,
    Private,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl FromStr for Privacy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// `None` for the global community, which nobody owns.
    pub owner_id: Option<i64>,
    pub privacy: Privacy,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Role a member holds inside a community.
///
/// Creating a community or receiving it by transfer makes you `Leader`;
/// everyone who joins starts out as `Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Leader,
    EventManager,
    Moderator,
    Member,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Leader, Role::EventManager, Role::Moderator, Role::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::EventManager => "event_manager",
            Self::Moderator => "moderator",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Returned when a stored or submitted string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: i64,
    pub community_id: i64,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: i64,
    pub user_id: i64,
    pub community_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub community_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A post pinned to the top of its community feed.
///
/// `order` is dense and 0-based within a community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedPost {
    pub id: i64,
    pub post_id: i64,
    pub community_id: i64,
    pub order: i64,
    pub pinned_by: i64,
    pub pinned_at: DateTime<Utc>,
}
