use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use unihub_db::Database;
use unihub_db::queries::posts;
use unihub_types::api::{Claims, CreatePostRequest, FeedQuery};
use unihub_types::models::Post;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::policy::{Action, authorize};

/// Upper bound on post length, in characters.
const MAX_POST_LEN: usize = 5000;

pub const MAX_FEED_LIMIT: usize = 100;

pub fn create_post(db: &Database, community_id: i64, actor_id: i64, content: &str) -> ApiResult<Post> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("post content is required"));
    }
    if content.chars().count() > MAX_POST_LEN {
        return Err(ApiError::validation(format!(
            "post content is limited to {} characters",
            MAX_POST_LEN
        )));
    }

    db.with_tx(|tx| {
        authorize(tx, community_id, actor_id, Action::Post)?;

        let id = posts::insert_post(tx, community_id, actor_id, content)?;
        let post = posts::post_by_id(tx, id)?.ok_or(ApiError::NotFound("post"))?;

        info!("User {} posted {} in community {}", actor_id, id, community_id);
        Ok(post.into_model())
    })
}

/// Newest posts of a community. Private feeds are visible to members only.
pub fn list_posts(db: &Database, community_id: i64, actor_id: i64, limit: usize) -> ApiResult<Vec<Post>> {
    let limit = limit.min(MAX_FEED_LIMIT);
    db.with_tx(|tx| {
        authorize(tx, community_id, actor_id, Action::ViewFeed)?;
        Ok(posts::posts_for_community(tx, community_id, limit)?
            .into_iter()
            .map(|row| row.into_model())
            .collect())
    })
}

pub async fn create(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let post = blocking(&state, move |db| create_post(db, community_id, claims.sub, &req.content)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn feed(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    let feed = blocking(&state, move |db| list_posts(db, community_id, claims.sub, query.limit)).await?;
    Ok(Json(feed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use unihub_types::models::{GLOBAL_COMMUNITY_ID, Privacy};

    #[test]
    fn members_post_outsiders_do_not() {
        let db = db();
        let owner = user(&db, "owner");
        let outsider = user(&db, "outsider");
        let c = community(&db, "Chess", owner, Privacy::Public, &[]);

        let post = create_post(&db, c, owner, "  first!  ").unwrap();
        assert_eq!(post.content, "first!");
        assert_eq!(post.community_id, c);

        assert!(matches!(create_post(&db, c, outsider, "hi"), Err(ApiError::Forbidden)));
        assert!(create_post(&db, GLOBAL_COMMUNITY_ID, outsider, "hi all").is_ok());
    }

    #[test]
    fn feed_is_newest_first_and_private_to_members() {
        let db = db();
        let owner = user(&db, "owner");
        let outsider = user(&db, "outsider");
        let c = community(&db, "Secret", owner, Privacy::Private, &[]);

        let first = create_post(&db, c, owner, "first").unwrap();
        let second = create_post(&db, c, owner, "second").unwrap();

        let ids: Vec<i64> = list_posts(&db, c, owner, 10).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(list_posts(&db, c, owner, 1).unwrap().len(), 1);

        assert!(matches!(list_posts(&db, c, outsider, 10), Err(ApiError::Forbidden)));
        assert!(matches!(list_posts(&db, 999, owner, 10), Err(ApiError::NotFound("community"))));
    }

    #[test]
    fn empty_post_is_rejected() {
        let db = db();
        let owner = user(&db, "owner");
        let c = community(&db, "Chess", owner, Privacy::Public, &[]);
        assert!(matches!(create_post(&db, c, owner, "   "), Err(ApiError::Validation(_))));
    }
}
