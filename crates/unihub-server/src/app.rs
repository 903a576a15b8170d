use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use unihub_api::auth::{self, AppState};
use unihub_api::middleware::require_auth;
use unihub_api::{communities, follows, pins, posts, recommendations, users};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        // Recommendations
        .route("/recommendations/communities", get(recommendations::get_community_recommendations))
        .route("/recommendations/users", get(recommendations::get_user_recommendations))
        // Communities & membership
        .route("/communities", get(communities::index).post(communities::create))
        .route("/communities/{community_id}", get(communities::show))
        .route("/communities/{community_id}/keywords", put(communities::put_keywords))
        .route("/communities/{community_id}/join", post(communities::join))
        .route("/communities/{community_id}/leave", post(communities::leave))
        .route("/communities/{community_id}/members", get(communities::members))
        .route("/communities/{community_id}/members/{user_id}/role", put(communities::put_role))
        .route("/communities/{community_id}/requests", get(communities::requests))
        .route("/communities/{community_id}/transfer", post(communities::transfer))
        .route("/requests/{request_id}", delete(communities::cancel_request))
        .route("/requests/{request_id}/approve", post(communities::approve_request))
        .route("/requests/{request_id}/reject", post(communities::reject_request))
        // Posts & pins
        .route("/communities/{community_id}/posts", get(posts::feed).post(posts::create))
        .route("/communities/{community_id}/pins", get(pins::get_pins).post(pins::pin))
        .route("/communities/{community_id}/pins/order", put(pins::reorder))
        .route("/posts/{post_id}/pin", delete(pins::unpin))
        // Follows
        .route("/follows/{user_id}", post(follows::follow).delete(follows::unfollow))
        .route("/follows/{user_id}/check", get(follows::check))
        .route("/users/{user_id}", get(users::profile))
        .route("/users/{user_id}/communities", get(communities::user_communities))
        .route("/users/{user_id}/followers", get(follows::followers))
        .route("/users/{user_id}/following", get(follows::following))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
