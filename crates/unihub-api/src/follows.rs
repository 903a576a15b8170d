use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use unihub_db::Database;
use unihub_db::queries::{follows, users};
use unihub_types::api::{Claims, FollowStatus, UserSummary};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};

pub fn follow_user(db: &Database, actor_id: i64, target_id: i64) -> ApiResult<()> {
    if actor_id == target_id {
        return Err(ApiError::validation("you cannot follow yourself"));
    }

    db.with_tx(|tx| {
        if !users::user_exists(tx, target_id)? {
            return Err(ApiError::NotFound("user"));
        }
        if follows::is_following(tx, actor_id, target_id)? {
            return Err(ApiError::conflict("you are already following this user"));
        }
        follows::insert_follow(tx, actor_id, target_id)?;
        info!("User {} followed user {}", actor_id, target_id);
        Ok(())
    })
}

pub fn unfollow_user(db: &Database, actor_id: i64, target_id: i64) -> ApiResult<()> {
    db.with_tx(|tx| {
        if !users::user_exists(tx, target_id)? {
            return Err(ApiError::NotFound("user"));
        }
        if follows::delete_follow(tx, actor_id, target_id)? == 0 {
            return Err(ApiError::NotFound("follow"));
        }
        info!("User {} unfollowed user {}", actor_id, target_id);
        Ok(())
    })
}

fn summaries(rows: Vec<(i64, String)>) -> Vec<UserSummary> {
    rows.into_iter()
        .map(|(id, username)| UserSummary { id, username })
        .collect()
}

pub fn list_followers(db: &Database, user_id: i64) -> ApiResult<Vec<UserSummary>> {
    db.with_conn(|conn| {
        if !users::user_exists(conn, user_id)? {
            return Ok(None);
        }
        Ok(Some(summaries(follows::followers_of(conn, user_id)?)))
    })?
    .ok_or(ApiError::NotFound("user"))
}

pub fn list_following(db: &Database, user_id: i64) -> ApiResult<Vec<UserSummary>> {
    db.with_conn(|conn| {
        if !users::user_exists(conn, user_id)? {
            return Ok(None);
        }
        Ok(Some(summaries(follows::following_of(conn, user_id)?)))
    })?
    .ok_or(ApiError::NotFound("user"))
}

/// Whether `actor_id` follows `target_id`. Viewing yourself counts as following.
pub fn check_following(db: &Database, actor_id: i64, target_id: i64) -> ApiResult<bool> {
    if actor_id == target_id {
        return Ok(true);
    }

    db.with_conn(|conn| {
        if !users::user_exists(conn, target_id)? {
            return Ok(None);
        }
        Ok(Some(follows::is_following(conn, actor_id, target_id)?))
    })?
    .ok_or(ApiError::NotFound("user"))
}

// -- Handlers --

pub async fn follow(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| follow_user(db, claims.sub, user_id)).await?;
    Ok(StatusCode::CREATED)
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| unfollow_user(db, claims.sub, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(blocking(&state, move |db| list_followers(db, user_id)).await?))
}

pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(blocking(&state, move |db| list_following(db, user_id)).await?))
}

pub async fn check(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<FollowStatus>> {
    let is_following = blocking(&state, move |db| check_following(db, claims.sub, user_id)).await?;
    Ok(Json(FollowStatus { is_following }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn follow_and_unfollow() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        follow_user(&db, alice, bob).unwrap();
        assert!(check_following(&db, alice, bob).unwrap());
        assert!(!check_following(&db, bob, alice).unwrap());

        let followers: Vec<_> = list_followers(&db, bob).unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(followers, vec![alice]);
        let following: Vec<_> = list_following(&db, alice).unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(following, vec![bob]);

        unfollow_user(&db, alice, bob).unwrap();
        assert!(!check_following(&db, alice, bob).unwrap());
        assert!(matches!(unfollow_user(&db, alice, bob), Err(ApiError::NotFound("follow"))));
    }

    #[test]
    fn follow_rejections() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        follow_user(&db, alice, bob).unwrap();

        assert!(matches!(follow_user(&db, alice, alice), Err(ApiError::Validation(_))));
        assert!(matches!(follow_user(&db, alice, bob), Err(ApiError::Conflict(_))));
        assert!(matches!(follow_user(&db, alice, 999), Err(ApiError::NotFound("user"))));
        assert!(matches!(list_followers(&db, 999), Err(ApiError::NotFound("user"))));
    }

    #[test]
    fn viewing_self_counts_as_following() {
        let db = db();
        let alice = user(&db, "alice");
        assert!(check_following(&db, alice, alice).unwrap());
    }
}
