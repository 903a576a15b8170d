//! Authorization policy for community mutations.
//!
//! Every mutating operation calls [`authorize`] with the action it is about
//! to perform, inside the same transaction as the write.

use rusqlite::Connection;
use tracing::warn;

use unihub_db::models::CommunityRow;
use unihub_db::queries::{communities, memberships};
use unihub_types::models::Privacy;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Pin, unpin, or reorder pinned posts.
    ManagePins,
    /// Change member roles, approve or reject join requests.
    ManageMembers,
    /// Edit community metadata such as keywords.
    EditCommunity,
    TransferOwnership,
    /// Publish a post in the community feed.
    Post,
    /// Read the community feed. Private feeds are for members only.
    ViewFeed,
}

/// Check that `actor_id` may perform `action` on the community.
///
/// Returns the community row so callers don't fetch it twice. Missing
/// communities are `NotFound`, everything else that fails is `Forbidden`.
pub fn authorize(
    conn: &Connection,
    community_id: i64,
    actor_id: i64,
    action: Action,
) -> ApiResult<CommunityRow> {
    let community = communities::community_by_id(conn, community_id)?
        .ok_or(ApiError::NotFound("community"))?;

    let allowed = match action {
        Action::ManagePins
        | Action::ManageMembers
        | Action::EditCommunity
        | Action::TransferOwnership => community.owner_id == Some(actor_id),
        // Anyone may post to the ownerless global feed
        Action::Post => {
            community.owner_id.is_none()
                || memberships::membership(conn, actor_id, community_id)?.is_some()
        }
        Action::ViewFeed => {
            community.privacy == Privacy::Public
                || memberships::membership(conn, actor_id, community_id)?.is_some()
        }
    };

    if !allowed {
        warn!(
            "User {} denied {:?} on community {}",
            actor_id, action, community_id
        );
        return Err(ApiError::Forbidden);
    }

    Ok(community)
}
