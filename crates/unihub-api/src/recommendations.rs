//! Community and user recommendations.
//!
//! Communities are matched on keywords shared with the communities a user
//! already belongs to. Users are matched on mutual follows: accounts
//! followed by the people you follow.

use std::collections::BTreeSet;

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use unihub_db::Database;
use unihub_db::queries::{communities, follows, keywords, memberships, users};
use unihub_types::api::{Claims, RecommendationQuery, UserSummary};
use unihub_types::models::Community;

use crate::auth::AppState;
use crate::blocking;
use crate::communities::load_community;
use crate::error::ApiResult;

pub const DEFAULT_LIMIT: usize = 5;

/// Upper bound accepted from clients.
pub const MAX_LIMIT: usize = 50;

/// How user candidates with equal mutual-follow scores are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Higher user id first. Stable across calls.
    #[default]
    UserId,
    /// Random order drawn from the caller's RNG.
    Shuffle,
}

/// Rank communities the user might want to join.
///
/// Returns community ids ordered by match score (shared keyword count),
/// newest community first on ties. Communities the user owns or already
/// belongs to are never included.
pub fn recommend_communities(db: &Database, user_id: i64, limit: usize) -> ApiResult<Vec<i64>> {
    let ids = db.with_conn(|conn| {
        let joined = memberships::community_ids_for_user(conn, user_id)?;
        if joined.is_empty() {
            debug!("User {} has joined no communities; nothing to match on", user_id);
            return Ok(vec![]);
        }

        let keyword_ids = keywords::keyword_ids_for_communities(conn, &joined)?;
        if keyword_ids.is_empty() {
            debug!("Communities joined by user {} carry no keywords", user_id);
            return Ok(vec![]);
        }

        let exclude: BTreeSet<i64> = joined
            .into_iter()
            .chain(communities::owned_community_ids(conn, user_id)?)
            .collect();
        let exclude: Vec<i64> = exclude.into_iter().collect();

        let scored = keywords::score_communities_by_keywords(conn, &keyword_ids, &exclude, limit)?;
        debug!(
            "Community recommendations for user {}: {} keywords, {} excluded, scored {:?}",
            user_id,
            keyword_ids.len(),
            exclude.len(),
            scored
        );

        Ok(scored.into_iter().map(|(id, _score)| id).collect())
    })?;

    Ok(ids)
}

/// Rank users the given user might want to follow.
///
/// A candidate's score is the number of accounts the user follows that also
/// follow the candidate. The user and anyone they already follow are
/// excluded; zero scores are dropped.
pub fn recommend_users<R: Rng + ?Sized>(
    db: &Database,
    user_id: i64,
    limit: usize,
    tie_break: TieBreak,
    rng: &mut R,
) -> ApiResult<Vec<i64>> {
    let mut scored = db.with_conn(|conn| {
        let followed = follows::followed_ids(conn, user_id)?;
        if followed.is_empty() {
            debug!("User {} follows no one; no mutuals to recommend", user_id);
            return Ok(vec![]);
        }

        let mut exclude = followed.clone();
        exclude.push(user_id);

        let scored = follows::mutual_follow_scores(conn, &followed, &exclude)?;
        debug!(
            "User recommendations for user {}: follows {:?}, scored {:?}",
            user_id, followed, scored
        );
        Ok(scored)
    })?;

    // Rows arrive sorted by score then id, which is the UserId order.
    if tie_break == TieBreak::Shuffle {
        scored.shuffle(rng);
        scored.sort_by(|a, b| b.1.cmp(&a.1));
    }

    scored.truncate(limit);
    Ok(scored.into_iter().map(|(id, _score)| id).collect())
}

pub async fn get_community_recommendations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<Vec<Community>>> {
    let limit = query.limit.min(MAX_LIMIT);

    let recommended = blocking(&state, move |db| {
        let ids = recommend_communities(db, claims.sub, limit)?;
        db.with_conn(|conn| {
            ids.iter()
                .map(|&id| load_community(conn, id))
                .collect::<anyhow::Result<Vec<_>>>()
        })
        .map_err(Into::into)
    })
    .await?;

    Ok(Json(recommended.into_iter().flatten().collect()))
}

pub async fn get_user_recommendations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let limit = query.limit.min(MAX_LIMIT);
    let tie_break = state.tie_break;

    let recommended = blocking(&state, move |db| {
        let ids = recommend_users(db, claims.sub, limit, tie_break, &mut rand::rng())?;
        let summaries = db.with_conn(|conn| {
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(user) = users::user_by_id(conn, id)? {
                    out.push(UserSummary { id: user.id, username: user.username });
                }
            }
            Ok(out)
        })?;
        Ok(summaries)
    })
    .await?;

    Ok(Json(recommended))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use unihub_types::models::{Privacy, Role};

    #[test]
    fn no_joined_communities_means_no_recommendations() {
        let db = db();
        let owner = user(&db, "owner");
        let loner = user(&db, "loner");
        community(&db, "Chess", owner, Privacy::Public, &["games", "strategy"]);

        assert!(recommend_communities(&db, loner, DEFAULT_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn joined_communities_without_keywords_give_nothing() {
        let db = db();
        let owner = user(&db, "owner");
        let alice = user(&db, "alice");
        let bare = community(&db, "Bare", owner, Privacy::Public, &[]);
        community(&db, "Chess", owner, Privacy::Public, &["games"]);
        enroll(&db, alice, bare, Role::Member);

        assert!(recommend_communities(&db, alice, DEFAULT_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn communities_ranked_by_shared_keywords_then_newest() {
        let db = db();
        let owner = user(&db, "owner");
        let alice = user(&db, "alice");

        let chess = community(&db, "Chess", owner, Privacy::Public, &["games", "strategy", "board"]);
        enroll(&db, alice, chess, Role::Member);

        let go = community(&db, "Go", owner, Privacy::Public, &["games", "strategy"]);
        let poker = community(&db, "Poker", owner, Privacy::Public, &["games"]);
        let bridge = community(&db, "Bridge", owner, Privacy::Private, &["board", "strategy"]);
        community(&db, "Rowing", owner, Privacy::Public, &["sport"]);

        let ids = recommend_communities(&db, alice, DEFAULT_LIMIT).unwrap();
        // Go and Bridge both score 2; Bridge is newer.
        assert_eq!(ids, vec![bridge, go, poker]);
    }

    #[test]
    fn owned_and_joined_communities_are_excluded() {
        let db = db();
        let owner = user(&db, "owner");
        let alice = user(&db, "alice");

        let chess = community(&db, "Chess", owner, Privacy::Public, &["games"]);
        enroll(&db, alice, chess, Role::Member);
        // Alice owns this one but left it, so only ownership ties her to it.
        let mine = community(&db, "Alice's Games", alice, Privacy::Public, &["games"]);
        db.with_conn(|conn| memberships::delete_membership(conn, alice, mine)).unwrap();
        let other = community(&db, "Poker", owner, Privacy::Public, &["games"]);

        let ids = recommend_communities(&db, alice, DEFAULT_LIMIT).unwrap();
        assert_eq!(ids, vec![other]);
        assert!(!ids.contains(&chess));
        assert!(!ids.contains(&mine));
    }

    #[test]
    fn community_recommendations_respect_limit() {
        let db = db();
        let owner = user(&db, "owner");
        let alice = user(&db, "alice");
        let chess = community(&db, "Chess", owner, Privacy::Public, &["games"]);
        enroll(&db, alice, chess, Role::Member);

        let mut created = vec![];
        for i in 0..7 {
            created.push(community(&db, &format!("Club {}", i), owner, Privacy::Public, &["games"]));
        }

        let ids = recommend_communities(&db, alice, DEFAULT_LIMIT).unwrap();
        assert_eq!(ids.len(), DEFAULT_LIMIT);
        // All tie on score, so newest first.
        created.reverse();
        assert_eq!(ids, created[..DEFAULT_LIMIT].to_vec());
    }

    #[test]
    fn no_follows_means_no_user_recommendations() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        follow(&db, bob, alice);

        let ids = recommend_users(&db, alice, DEFAULT_LIMIT, TieBreak::UserId, &mut rand::rng()).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn users_ranked_by_mutual_follows() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        let dave = user(&db, "dave");
        let erin = user(&db, "erin");
        let frank = user(&db, "frank");

        follow(&db, alice, bob);
        follow(&db, alice, carol);
        // dave is followed by bob and carol, erin only by carol
        follow(&db, bob, dave);
        follow(&db, carol, dave);
        follow(&db, carol, erin);
        // bob follows carol, who alice already follows
        follow(&db, bob, carol);
        // bob follows alice back; she must not be recommended to herself
        follow(&db, bob, alice);
        // frank follows dave but alice does not follow frank
        follow(&db, frank, dave);

        let ids = recommend_users(&db, alice, DEFAULT_LIMIT, TieBreak::UserId, &mut rand::rng()).unwrap();
        assert_eq!(ids, vec![dave, erin]);
        assert!(!ids.contains(&alice));
        assert!(!ids.contains(&bob));
        assert!(!ids.contains(&carol));
        assert!(!ids.contains(&frank));
    }

    #[test]
    fn shuffled_ties_keep_score_order() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        follow(&db, alice, bob);
        follow(&db, alice, carol);

        let top = user(&db, "top");
        follow(&db, bob, top);
        follow(&db, carol, top);

        let mut tied = vec![];
        for i in 0..6 {
            let u = user(&db, &format!("tied{}", i));
            follow(&db, bob, u);
            tied.push(u);
        }

        let mut rng = StdRng::seed_from_u64(7);
        let ids = recommend_users(&db, alice, 10, TieBreak::Shuffle, &mut rng).unwrap();
        assert_eq!(ids[0], top);
        let mut rest = ids[1..].to_vec();
        rest.sort();
        assert_eq!(rest, tied);

        let limited = recommend_users(&db, alice, 3, TieBreak::Shuffle, &mut rng).unwrap();
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0], top);
    }

    #[test]
    fn deterministic_ties_prefer_higher_ids() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        follow(&db, alice, bob);
        let x = user(&db, "x");
        let y = user(&db, "y");
        follow(&db, bob, x);
        follow(&db, bob, y);

        let ids = recommend_users(&db, alice, DEFAULT_LIMIT, TieBreak::UserId, &mut rand::rng()).unwrap();
        assert_eq!(ids, vec![y, x]);
    }
}
