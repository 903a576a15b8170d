use axum::{
    Extension, Json,
    extract::{Path, State},
};

use unihub_db::Database;
use unihub_types::api::Claims;
use unihub_types::models::User;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};

pub fn get_profile(db: &Database, user_id: i64) -> ApiResult<User> {
    db.get_user_by_id(user_id)?
        .map(|row| row.into_model())
        .ok_or(ApiError::NotFound("user"))
}

pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<User>> {
    Ok(Json(blocking(&state, move |db| get_profile(db, user_id)).await?))
}
