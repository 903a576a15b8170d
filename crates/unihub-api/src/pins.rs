//! Pinned posts.
//!
//! Each community may pin up to [`MAX_PINNED_POSTS`] posts. Their `order`
//! values always form the dense sequence `0..n`; every mutation below runs
//! inside an immediate transaction so two concurrent pin or unpin calls on
//! the same community cannot interleave their read of the current orders
//! with the write.

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use unihub_db::Database;
use unihub_db::queries::{communities, pins, posts};
use unihub_types::api::{Claims, PinPostRequest, ReorderPinsRequest};
use unihub_types::models::{MAX_PINNED_POSTS, PinnedPost};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::policy::{Action, authorize};

pub fn pin_post(db: &Database, community_id: i64, post_id: i64, actor_id: i64) -> ApiResult<PinnedPost> {
    db.with_tx(|tx| {
        authorize(tx, community_id, actor_id, Action::ManagePins)?;

        let post = posts::post_by_id(tx, post_id)?
            .filter(|p| p.community_id == community_id)
            .ok_or(ApiError::NotFound("post"))?;

        if pins::pin_by_post(tx, post.id)?.is_some() {
            return Err(ApiError::conflict("post is already pinned"));
        }
        if pins::pin_count(tx, community_id)? >= MAX_PINNED_POSTS {
            return Err(ApiError::conflict(format!(
                "a community can pin at most {} posts",
                MAX_PINNED_POSTS
            )));
        }

        let order = pins::next_pin_order(tx, community_id)?;
        let pin = pins::insert_pin(tx, post.id, community_id, order, actor_id)?;

        info!(
            "User {} pinned post {} in community {} at order {}",
            actor_id, post.id, community_id, order
        );
        Ok(pin.into_model())
    })
}

pub fn unpin_post(db: &Database, post_id: i64, actor_id: i64) -> ApiResult<()> {
    db.with_tx(|tx| {
        let pin = pins::pin_by_post(tx, post_id)?.ok_or(ApiError::NotFound("pinned post"))?;
        authorize(tx, pin.community_id, actor_id, Action::ManagePins)?;

        pins::delete_pin(tx, pin.id)?;
        let shifted = pins::shift_pins_down(tx, pin.community_id, pin.pin_order)?;

        info!(
            "User {} unpinned post {} from community {} ({} pins shifted)",
            actor_id, post_id, pin.community_id, shifted
        );
        Ok(())
    })
}

/// Rewrite pin orders to follow `ordered_ids` (pinned-post ids).
///
/// The ids must be exactly the community's current pins, each once.
pub fn reorder_pins(
    db: &Database,
    community_id: i64,
    actor_id: i64,
    ordered_ids: &[i64],
) -> ApiResult<Vec<PinnedPost>> {
    db.with_tx(|tx| {
        authorize(tx, community_id, actor_id, Action::ManagePins)?;

        let current: HashSet<i64> = pins::pins_for_community(tx, community_id)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let supplied: HashSet<i64> = ordered_ids.iter().copied().collect();

        if ordered_ids.len() != current.len() || supplied != current {
            return Err(ApiError::conflict(
                "ordered ids must match the community's pinned posts exactly",
            ));
        }

        for (order, pin_id) in ordered_ids.iter().enumerate() {
            pins::set_pin_order(tx, *pin_id, order as i64)?;
        }

        info!("User {} reordered pins in community {}: {:?}", actor_id, community_id, ordered_ids);

        Ok(pins::pins_for_community(tx, community_id)?
            .into_iter()
            .map(|p| p.into_model())
            .collect())
    })
}

pub fn list_pins(db: &Database, community_id: i64) -> ApiResult<Vec<PinnedPost>> {
    db.with_conn(|conn| {
        if communities::community_by_id(conn, community_id)?.is_none() {
            return Ok(None);
        }
        let pinned: Vec<PinnedPost> = pins::pins_for_community(conn, community_id)?
            .into_iter()
            .map(|p| p.into_model())
            .collect();
        Ok(Some(pinned))
    })?
    .ok_or(ApiError::NotFound("community"))
}

// -- Handlers --

pub async fn get_pins(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PinnedPost>>> {
    let pinned = blocking(&state, move |db| list_pins(db, community_id)).await?;
    Ok(Json(pinned))
}

pub async fn pin(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<PinPostRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let pinned = blocking(&state, move |db| pin_post(db, community_id, req.post_id, claims.sub)).await?;
    Ok((StatusCode::CREATED, Json(pinned)))
}

pub async fn unpin(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |db| unpin_post(db, post_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder(
    State(state): State<AppState>,
    Path(community_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<ReorderPinsRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<PinnedPost>>> {
    let Json(req) = payload?;
    let pinned = blocking(&state, move |db| {
        reorder_pins(db, community_id, claims.sub, &req.ordered_ids)
    })
    .await?;
    Ok(Json(pinned))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::test_support::*;
    use unihub_types::models::{Privacy, Role};

    struct Fixture {
        db: Database,
        owner: i64,
        member: i64,
        community: i64,
        posts: Vec<i64>,
    }

    fn fixture() -> Fixture {
        let db = db();
        let owner = user(&db, "owner");
        let member = user(&db, "member");
        let community = community(&db, "Chess", owner, Privacy::Public, &[]);
        enroll(&db, member, community, Role::Moderator);
        let posts = (0..4).map(|_| post(&db, community, member)).collect();
        Fixture { db, owner, member, community, posts }
    }

    /// (post_id, order) pairs in display order.
    fn layout(f: &Fixture) -> Vec<(i64, i64)> {
        list_pins(&f.db, f.community)
            .unwrap()
            .into_iter()
            .map(|p| (p.post_id, p.order))
            .collect()
    }

    #[test]
    fn pins_get_sequential_orders() {
        let f = fixture();
        for (i, &p) in f.posts[..3].iter().enumerate() {
            let pin = pin_post(&f.db, f.community, p, f.owner).unwrap();
            assert_eq!(pin.order, i as i64);
            assert_eq!(pin.pinned_by, f.owner);
        }
        assert_eq!(layout(&f), vec![(f.posts[0], 0), (f.posts[1], 1), (f.posts[2], 2)]);
    }

    #[test]
    fn fourth_pin_conflicts() {
        let f = fixture();
        for &p in &f.posts[..3] {
            pin_post(&f.db, f.community, p, f.owner).unwrap();
        }
        let err = pin_post(&f.db, f.community, f.posts[3], f.owner).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(layout(&f).len(), 3);
    }

    #[test]
    fn pin_rejections() {
        let f = fixture();
        pin_post(&f.db, f.community, f.posts[0], f.owner).unwrap();

        assert!(matches!(
            pin_post(&f.db, f.community, f.posts[0], f.owner),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            pin_post(&f.db, f.community, f.posts[1], f.member),
            Err(ApiError::Forbidden)
        ));

        let elsewhere = community(&f.db, "Go", f.owner, Privacy::Public, &[]);
        let foreign = post(&f.db, elsewhere, f.owner);
        assert!(matches!(
            pin_post(&f.db, f.community, foreign, f.owner),
            Err(ApiError::NotFound("post"))
        ));
        assert!(matches!(
            pin_post(&f.db, f.community, 999, f.owner),
            Err(ApiError::NotFound("post"))
        ));
    }

    #[test]
    fn unpin_closes_the_gap() {
        let f = fixture();
        let (p1, p2, p3) = (f.posts[0], f.posts[1], f.posts[2]);
        for p in [p1, p2, p3] {
            pin_post(&f.db, f.community, p, f.owner).unwrap();
        }

        unpin_post(&f.db, p2, f.owner).unwrap();
        assert_eq!(layout(&f), vec![(p1, 0), (p3, 1)]);

        // The freed slot is reused at the end
        let pin = pin_post(&f.db, f.community, f.posts[3], f.owner).unwrap();
        assert_eq!(pin.order, 2);

        unpin_post(&f.db, p1, f.owner).unwrap();
        assert_eq!(layout(&f), vec![(p3, 0), (f.posts[3], 1)]);
    }

    #[test]
    fn unpin_rejections() {
        let f = fixture();
        pin_post(&f.db, f.community, f.posts[0], f.owner).unwrap();

        assert!(matches!(
            unpin_post(&f.db, f.posts[1], f.owner),
            Err(ApiError::NotFound("pinned post"))
        ));
        assert!(matches!(
            unpin_post(&f.db, f.posts[0], f.member),
            Err(ApiError::Forbidden)
        ));
        assert_eq!(layout(&f), vec![(f.posts[0], 0)]);
    }

    #[test]
    fn reorder_assigns_index_orders() {
        let f = fixture();
        let pins: Vec<PinnedPost> = f.posts[..3]
            .iter()
            .map(|&p| pin_post(&f.db, f.community, p, f.owner).unwrap())
            .collect();

        let ordered = vec![pins[2].id, pins[0].id, pins[1].id];
        let result = reorder_pins(&f.db, f.community, f.owner, &ordered).unwrap();

        let got: Vec<(i64, i64)> = result.iter().map(|p| (p.id, p.order)).collect();
        assert_eq!(got, vec![(pins[2].id, 0), (pins[0].id, 1), (pins[1].id, 2)]);
    }

    #[test]
    fn reorder_mismatch_changes_nothing() {
        let f = fixture();
        let pins: Vec<PinnedPost> = f.posts[..3]
            .iter()
            .map(|&p| pin_post(&f.db, f.community, p, f.owner).unwrap())
            .collect();
        let before = layout(&f);

        for bad in [
            vec![pins[0].id, pins[1].id],
            vec![pins[0].id, pins[1].id, pins[2].id, 999],
            vec![pins[0].id, pins[0].id, pins[1].id],
            vec![pins[0].id, pins[1].id, 999],
        ] {
            let err = reorder_pins(&f.db, f.community, f.owner, &bad).unwrap_err();
            assert!(matches!(err, ApiError::Conflict(_)), "{:?}", bad);
        }
        assert_eq!(layout(&f), before);

        let reversed = vec![pins[2].id, pins[1].id, pins[0].id];
        assert!(matches!(
            reorder_pins(&f.db, f.community, f.member, &reversed),
            Err(ApiError::Forbidden)
        ));
        assert_eq!(layout(&f), before);
    }

    #[test]
    fn concurrent_pins_keep_orders_dense() {
        let Fixture { db, owner, community, .. } = fixture();
        let candidates: Vec<i64> = (0..8).map(|_| post(&db, community, owner)).collect();
        let db = Arc::new(db);

        let handles: Vec<_> = candidates
            .iter()
            .map(|&p| {
                let db = Arc::clone(&db);
                thread::spawn(move || pin_post(&db, community, p, owner))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let pinned: Vec<i64> = results.iter().filter_map(|r| r.as_ref().ok()).map(|p| p.post_id).collect();
        assert_eq!(pinned.len(), MAX_PINNED_POSTS);
        for r in &results {
            if let Err(e) = r {
                assert!(matches!(e, ApiError::Conflict(_)), "{:?}", e);
            }
        }
        let orders: Vec<i64> = list_pins(&db, community).unwrap().iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        // Unpin two while others race to take the freed slots
        let unpins = pinned[..2].iter().map(|&p| {
            let db = Arc::clone(&db);
            thread::spawn(move || unpin_post(&db, p, owner).map(|_| ()))
        });
        let repins = candidates
            .iter()
            .filter(|p| !pinned.contains(p))
            .map(|&p| {
                let db = Arc::clone(&db);
                thread::spawn(move || pin_post(&db, community, p, owner).map(|_| ()))
            });
        let handles: Vec<_> = unpins.chain(repins).collect();
        for h in handles {
            let _ = h.join().unwrap();
        }

        let orders: Vec<i64> = list_pins(&db, community).unwrap().iter().map(|p| p.order).collect();
        assert!(!orders.is_empty() && orders.len() <= MAX_PINNED_POSTS);
        assert_eq!(orders, (0..orders.len() as i64).collect::<Vec<_>>());
    }

    #[test]
    fn global_community_pins_are_forbidden() {
        let f = fixture();
        let global_post = post(&f.db, unihub_types::models::GLOBAL_COMMUNITY_ID, f.member);
        assert!(matches!(
            pin_post(&f.db, unihub_types::models::GLOBAL_COMMUNITY_ID, global_post, f.owner),
            Err(ApiError::Forbidden)
        ));
    }
}
