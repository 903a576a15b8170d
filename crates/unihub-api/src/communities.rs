use std::collections::BTreeSet;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use tracing::info;

use unihub_db::Database;
use unihub_db::models::CommunityRow;
use unihub_db::queries::{communities, keywords, memberships, users};
use unihub_types::api::{
    Claims, CreateCommunityRequest, JoinResponse, MemberResponse, SetKeywordsRequest,
    TransferOwnershipRequest, UpdateRoleRequest,
};
use unihub_types::models::{Community, JoinRequest, Membership, Privacy, Role};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::policy::{Action, authorize};

/// Community with its keyword names, or `None` if it doesn't exist.
pub fn load_community(conn: &Connection, community_id: i64) -> anyhow::Result<Option<Community>> {
    let Some(row) = communities::community_by_id(conn, community_id)? else {
        return Ok(None);
    };
    let tags = keywords::keywords_for_community(conn, community_id)?;
    Ok(Some(row.into_model(tags)))
}

/// Trim, lowercase, and dedupe keyword names, dropping blanks.
fn normalize_keywords(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn get_community(db: &Database, community_id: i64) -> ApiResult<Community> {
    db.with_conn(|conn| load_community(conn, community_id))?
        .ok_or(ApiError::NotFound("community"))
}

fn with_keywords(conn: &Connection, rows: Vec<CommunityRow>) -> anyhow::Result<Vec<Community>> {
    rows.into_iter()
        .map(|row| -> anyhow::Result<Community> {
            let tags = keywords::keywords_for_community(conn, row.id)?;
            Ok(row.into_model(tags))
        })
        .collect()
}

/// Every community, alphabetically, for the discovery page.
pub fn list_communities(db: &Database) -> ApiResult<Vec<Community>> {
    let all = db.with_conn(|conn| {
        let rows = communities::all_communities(conn)?;
        with_keywords(conn, rows)
    })?;
    Ok(all)
}

/// Communities `user_id` is a member of, alphabetically.
pub fn list_user_communities(db: &Database, user_id: i64) -> ApiResult<Vec<Community>> {
    db.with_conn(|conn| {
        if !users::user_exists(conn, user_id)? {
            return Ok(None);
        }
        let rows = communities::communities_for_user(conn, user_id)?;
        Ok(Some(with_keywords(conn, rows)?))
    })?
    .ok_or(ApiError::NotFound("user"))
}

pub fn create_community(
    db: &Database,
    actor_id: i64,
    name: &str,
    description: &str,
    privacy: Privacy,
    tags: &[String],
) -> ApiResult<Community> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("community name is required"));
    }
    let tags = normalize_keywords(tags);

    let community = db.with_tx(|tx| {
        if communities::name_taken(tx, name)? {
            return Err(ApiError::conflict("a community with that name already exists"));
        }

        let id = communities::insert_community(tx, name, description, privacy, Some(actor_id))?;
        memberships::insert_membership(tx, actor_id, id, Role::Leader)?;
        keywords::set_community_keywords(tx, id, &tags)?;

        load_community(tx, id)?.ok_or(ApiError::NotFound("community"))
    })?;

    info!("User {} created community {} ({})", actor_id, community.name, community.id);
    Ok(community)
}

pub fn set_keywords(db: &Database, community_id: i64, actor_id: i64, tags: &[String]) -> ApiResult<Community> {
    let tags = normalize_keywords(tags);

    db.with_tx(|tx| {
        authorize(tx, community_id, actor_id, Action::EditCommunity)?;
        keywords::set_community_keywords(tx, community_id, &tags)?;
        load_community(tx, community_id)?.ok_or(ApiError::NotFound("community"))
    })
}

/// Join a public community directly, or file a request for a private one.
pub fn join_community(db: &Database, community_id: i64, actor_id: i64) -> ApiResult<JoinResponse> {
    db.with_tx(|tx| {
        let community = communities::community_by_id(tx, community_id)?
            .ok_or(ApiError::NotFound("community"))?;

        if memberships::membership(tx, actor_id, community_id)?.is_some() {
            return Err(ApiError::conflict("you are already a member of this community"));
        }

        match community.privacy {
            Privacy::Public => {
                memberships::insert_membership(tx, actor_id, community_id, Role::Member)?;
                info!("User {} joined community {}", actor_id, community_id);
                Ok(JoinResponse::Joined { role: Role::Member })
            }
            Privacy::Private => {
                if memberships::pending_request_id(tx, actor_id, community_id)?.is_some() {
                    return Err(ApiError::conflict("a join request is already pending"));
                }
                let request_id = memberships::insert_join_request(tx, actor_id, community_id)?;
                info!("User {} requested to join community {}", actor_id, community_id);
                Ok(JoinResponse::Requested { request_id })
            }
        }
    })
}

pub fn leave_community(db: &Database, community_id: i64, actor_id: i64) -> ApiResult<()> {
    db.with_tx(|tx| {
        let community = communities::community_by_id(tx, community_id)?
            .ok_or(ApiError::NotFound("community"))?;

        if community.owner_id == Some(actor_id) {
            return Err(ApiError::conflict(
                "the owner must transfer ownership before leaving",
            ));
        }

        if memberships::delete_membership(tx, actor_id, community_id)? == 0 {
            return Err(ApiError::NotFound("membership"));
        }

        info!("User {} left community {}", actor_id, community_id);
        Ok(())
    })
}

/// Accept a pending join request. The membership is created and the
/// request removed in one transaction.
pub fn approve_join_request(db: &Database, request_id: i64, actor_id: i64) -> ApiResult<Membership> {
    db.with_tx(|tx| {
        let request = memberships::join_request_by_id(tx, request_id)?
            .ok_or(ApiError::NotFound("join request"))?;
        authorize(tx, request.community_id, actor_id, Action::ManageMembers)?;

        if memberships::membership(tx, request.user_id, request.community_id)?.is_some() {
            return Err(ApiError::conflict("user is already a member of this community"));
        }

        memberships::insert_membership(tx, request.user_id, request.community_id, Role::Member)?;
        memberships::delete_join_request(tx, request.id)?;

        let membership = memberships::membership(tx, request.user_id, request.community_id)?
            .ok_or(ApiError::NotFound("membership"))?;

        info!(
            "User {} approved join request {} for user {} in community {}",
            actor_id, request.id, request.user_id, request.community_id
        );
        Ok(membership.into_model())
    })
}

pub fn reject_join_request(db: &Database, request_id: i64, actor_id: i64) -> ApiResult<()> {
    db.with_tx(|tx| {
        let request = memberships::join_request_by_id(tx, request_id)?
            .ok_or(ApiError::NotFound("join request"))?;
        authorize(tx, request.community_id, actor_id, Action::ManageMembers)?;

        memberships::delete_join_request(tx, request.id)?;
        info!("User {} rejected join request {}", actor_id, request.id);
        Ok(())
    })
}

/// Withdraw your own pending join request.
pub fn cancel_join_request(db: &Database, request_id: i64, actor_id: i64) -> ApiResult<()> {
    db.with_tx(|tx| {
        let request = memberships::join_request_by_id(tx, request_id)?
            .ok_or(ApiError::NotFound("join request"))?;
        if request.user_id != actor_id {
            return Err(ApiError::Forbidden);
        }

        memberships::delete_join_request(tx, request.id)?;
        info!("User {} withdrew join request {}", actor_id, request.id);
        Ok(())
    })
}

/// Pending join requests, visible to the owner only.
pub fn list_join_requests(db: &Database, community_id: i64, actor_id: i64) -> ApiResult<Vec<JoinRequest>> {
    db.with_tx(|tx| {
        authorize(tx, community_id, actor_id, Action::ManageMembers)?;
        Ok(memberships::requests_for_community(tx, community_id)?
            .into_iter()
            .map(|r| r.into_model())
            .collect())
    })
}

pub fn list_members(db: &Database, community_id: i64) -> ApiResult<Vec<MemberResponse>> {
    db.with_conn(|conn| {
        if communities::community_by_id(conn, community_id)?.is_none() {
            return Ok(None);
        }
        let members: Vec<MemberResponse> = memberships::members_of(conn, community_id)?
            .into_iter()
            .map(|(row, username)| {
                let m = row.into_model();
                MemberResponse {
                    user_id: m.user_id,
                    username,
                    role: m.role,
                    joined_at: m.joined_at,
                }
            })
            .collect();
        Ok(Some(members))
    })?
    .ok_or(ApiError::NotFound("community"))
}

/// Hand the community to another member.
///
/// The owner field, the old owner's demotion to `Member`, and the new
/// owner's promotion to `Leader` commit together or not at all.
pub fn transfer_ownership(db: &Database, community_id: i64, new_owner_id: i64, actor_id: i64) -> ApiResult<()> {
    db.with_tx(|tx| {
        authorize(tx, community_id, actor_id, Action::TransferOwnership)?;

        if new_owner_id == actor_id {
            return Err(ApiError::conflict("you already own this community"));
        }
        if !users::user_exists(tx, new_owner_id)? {
            return Err(ApiError::NotFound("user"));
        }
        if memberships::membership(tx, new_owner_id, community_id)?.is_none() {
            return Err(ApiError::conflict("the new owner must be a member of the community"));
        }

        communities::set_owner(tx, community_id, new_owner_id)?;
        memberships::set_role(tx, actor_id, community_id, Role::Member)?;
        memberships::set_role(tx, new_owner_id, community_id, Role::Leader)?;

        info!(
            "Community {} ownership transferred from user {} to user {}",
            community_id, actor_id, new_owner_id
        );
        Ok(())
    })
}

/// Set a member's role. `new_role` is the wire name, e.g. `"event_manager"`.
///
/// `Leader` belongs to the owner alone and only moves through
/// [`transfer_ownership`], so it can neither be granted here nor taken away
/// from the owner.
pub fn update_role(
    db: &Database,
    community_id: i64,
    target_user_id: i64,
    new_role: &str,
    actor_id: i64,
) -> ApiResult<()> {
    db.with_tx(|tx| {
        let community = authorize(tx, community_id, actor_id, Action::ManageMembers)?;

        if memberships::membership(tx, target_user_id, community_id)?.is_none() {
            return Err(ApiError::NotFound("membership"));
        }
        if community.owner_id == Some(target_user_id) {
            return Err(ApiError::conflict("the owner's role changes only through ownership transfer"));
        }

        let role: Role = new_role
            .parse()
            .map_err(|_| ApiError::conflict(format!("invalid role '{}'", new_role)))?;
        if role == Role::Leader {
            return Err(ApiError::conflict("leadership is granted by transferring ownership"));
        }

        memberships::set_role(tx, target_user_id, community_id, role)?;
        info!(
            "User {} set role of user {} in community {} to {}",
            actor_id, target_user_id, community_id, role
        );
        Ok(())
    })
}

// -- Handlers --

pub async fn index(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Community>>> {
    let all = blocking(&state, list_communities).await?;
    Ok(Json(all))
}

pub async fn show(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Community>> {
    let community = blocking(&state, move |db| get_community(db, community_id)).await?;
    Ok(Json(community))
}

pub async fn user_communities(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Community>>> {
    let joined = blocking(&state, move |db| list_user_communities(db, user_id)).await?;
    Ok(Json(joined))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateCommunityRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let community = blocking(&state, move |db| {
        create_community(db, claims.sub, &req.name, &req.description, req.privacy, &req.keywords)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(community)))
}

pub async fn put_keywords(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SetKeywordsRequest>, JsonRejection>,
) -> ApiResult<Json<Community>> {
    let Json(req) = payload?;
    let community = blocking(&state, move |db| set_keywords(db, community_id, claims.sub, &req.keywords)).await?;
    Ok(Json(community))
}

pub async fn join(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<JoinResponse>> {
    let resp = blocking(&state, move |db| join_community(db, community_id, claims.sub)).await?;
    Ok(Json(resp))
}

pub async fn leave(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| leave_community(db, community_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn members(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let members = blocking(&state, move |db| list_members(db, community_id)).await?;
    Ok(Json(members))
}

pub async fn requests(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<JoinRequest>>> {
    let pending = blocking(&state, move |db| list_join_requests(db, community_id, claims.sub)).await?;
    Ok(Json(pending))
}

pub async fn approve_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Membership>> {
    let membership = blocking(&state, move |db| approve_join_request(db, request_id, claims.sub)).await?;
    Ok(Json(membership))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| reject_join_request(db, request_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| cancel_join_request(db, request_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn transfer(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<TransferOwnershipRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    blocking(&state, move |db| transfer_ownership(db, community_id, req.new_owner_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_role(
    State(state): State<AppState>,
    Path((community_id, user_id)): Path<(i64, i64)>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    blocking(&state, move |db| update_role(db, community_id, user_id, &req.role, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
